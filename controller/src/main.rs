mod executors;
mod handlers;
mod state;
mod ticker;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use common::commands::{FaultCommands, Submitter};
use common::constraints::ConstraintSet;
use common::directory::NodeDirectory;
use common::parser::{ClusterMonitor, CmdParser, RestParser};
use common::{ClusterConfig, ConnectionPool, Controller, HostMode, RemoteExecutor, StateTree};

use crate::executors::{HttpExecutor, SshExecutor};
use crate::state::AppState;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn ssh_pool(config: &ClusterConfig, role: &str, size: usize) -> Arc<ConnectionPool> {
    let executors: Vec<Box<dyn RemoteExecutor>> = (0..size)
        .map(|_| Box::new(SshExecutor::new(config.ssh.clone())) as Box<dyn RemoteExecutor>)
        .collect();
    Arc::new(ConnectionPool::new(role, executors, &config.pool))
}

fn monitor(config: &Arc<ClusterConfig>, directory: Arc<NodeDirectory>) -> Box<dyn ClusterMonitor> {
    match config.mode {
        HostMode::Text => {
            let pool = ssh_pool(config, "monitoring", config.pool.monitoring);
            Box::new(CmdParser::new(config, pool, directory))
        }
        HostMode::Json => {
            let executors: Vec<Box<dyn RemoteExecutor>> = (0..config.pool.monitoring)
                .map(|_| Box::new(HttpExecutor::new(HTTP_TIMEOUT)) as Box<dyn RemoteExecutor>)
                .collect();
            let pool = Arc::new(ConnectionPool::new("monitoring", executors, &config.pool));
            Box::new(RestParser::new(config.clone(), pool, directory))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("controller=debug,common=info,axum=info,tower_http=info")
        .init();

    let config = Arc::new(ClusterConfig::from_env().context("cargando configuración")?);
    info!(
        "modo {:?}, {} nodos, fallos {}",
        config.mode,
        config.nodes.len(),
        if config.faults.enabled { "activos" } else { "desactivados" }
    );

    let directory = Arc::new(NodeDirectory::new(&config.nodes));
    let tree = Arc::new(Mutex::new(StateTree::new(&config, directory.clone())));

    let faulting = ssh_pool(&config, "faulting", config.pool.faulting);
    let submission = ssh_pool(&config, "submission", config.pool.submission);

    let controller = Controller::new(
        config.clone(),
        tree,
        monitor(&config, directory),
        FaultCommands::new(&config, faulting.clone()),
        ConstraintSet::defaults(),
    );

    let state = AppState::new(
        config.clone(),
        controller,
        FaultCommands::new(&config, faulting),
        Submitter::new(submission),
    );

    // router HTTP
    let app = handlers::build_router(state.clone());

    // tick del controlador en segundo plano
    let tick_state = state.clone();
    tokio::spawn(async move {
        ticker::run_tick_loop(tick_state).await;
    });

    let listener = TcpListener::bind(&config.http_listen)
        .await
        .with_context(|| format!("no se pudo abrir {}", config.http_listen))?;
    info!("controller escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
