use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use common::ClusterError;

use crate::state::{lock, AppState};

/// Loop principal del controlador: un tick cada `tick_interval_secs`.
///
/// El tick bloquea (ssh / http síncronos), así que corre en `spawn_blocking`.
/// Un tick fallido se loguea y el loop sigue.
pub async fn run_tick_loop(state: AppState) {
    let interval = Duration::from_secs(state.config.tick_interval_secs.max(1));
    loop {
        sleep(interval).await;

        let controller = state.controller.clone();
        let handle = tokio::task::spawn_blocking(move || lock(&controller).tick());

        match handle.await {
            Ok(Ok(report)) => {
                info!(
                    "tick ok: {} nodos, {} apps, {} attempts, {} containers, {} fallos",
                    report.nodes_refreshed,
                    report.apps_seen,
                    report.attempts_seen,
                    report.containers_seen,
                    report.faults.len()
                );
                *lock(&state.last_report) = Some(report);
            }
            Ok(Err(ClusterError::NoReconfiguration)) => {
                warn!("tick abortado: ningún nodo RUNNING");
            }
            Ok(Err(e)) => {
                warn!("error en el tick: {}", e);
            }
            Err(e) => {
                warn!("panic o join error en el tick: {:?}", e);
            }
        }
    }
}
