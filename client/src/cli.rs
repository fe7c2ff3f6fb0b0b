use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::api::{CommandResponse, ErrorResponse, SubmitRequest, SubmitResponse};
use common::ids::{self, IdLevel};
use common::snapshot::{AppView, NodeView};
use common::TickReport;
use reqwest::{Client, Response, StatusCode};
use std::env;

/// - En Docker: CONTROLLER_URL=http://controller:8080
/// - Local: default http://localhost:8080
fn controller_base_url() -> String {
    env::var("CONTROLLER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para consultar el espejo del cluster y mandar comandos")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lista los nodos con su carga
    Nodes,
    /// Lista las aplicaciones del espejo
    Apps,
    /// Detalle de una aplicación (attempts y containers)
    Status {
        #[arg(value_name = "APP_ID")]
        id: String,
    },
    /// Envía una aplicación, p. ej. `submit "hadoop jar wc.jar in out"`
    Submit {
        #[arg(value_name = "COMANDO")]
        command: String,
    },
    /// Mata una aplicación
    Kill {
        #[arg(value_name = "APP_ID")]
        id: String,
    },
    /// Comando manual sobre un nodo
    Node {
        #[arg(value_parser = ["start", "stop", "start-network", "stop-network"])]
        action: String,
        #[arg(value_name = "NODO")]
        name: String,
    },
    /// Convierte un id de YARN a otro nivel (local, no habla con el controller)
    Convert {
        #[arg(value_name = "ID")]
        id: String,
        /// application | attempt | container
        #[arg(value_name = "NIVEL")]
        level: IdLevel,
    },
    /// Último reporte de tick
    Report,
}

async fn error_of(resp: Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorResponse>().await {
        Ok(e) => format!("{} ({})", e.error, status),
        Err(_) => status.to_string(),
    }
}

fn print_node(n: &NodeView) {
    let usage = n
        .usage
        .map(|u| format!("{:.0}%", u * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let fault = n.fault.map(|f| format!("{f:?}")).unwrap_or_default();
    println!(
        "  {:<12} {:<10} mem {}/{} MB  cpu {}/{}  carga {:<5} containers {:<3} {}",
        n.name,
        n.state.to_string(),
        n.mem_used.unwrap_or(0),
        n.mem_capacity.unwrap_or(0),
        n.cpu_used.unwrap_or(0),
        n.cpu_capacity.unwrap_or(0),
        usage,
        n.containers,
        fault
    );
}

fn print_app(app: &AppView) {
    println!("Aplicación:");
    println!("  id: {}", app.app_id);
    println!("  nombre: {}", app.name);
    println!("  usuario / cola: {} / {}", app.user, app.queue);
    println!("  estado: {} ({})", app.state, app.final_status);
    println!("  progreso: {:.1}%", app.progress);
    if let Some(host) = &app.am_host {
        println!("  AM en: {host}");
    }
    for att in &app.attempts {
        println!("  attempt {} [{}]", att.attempt_id, att.state);
        for c in &att.containers {
            println!(
                "    {} {:<9} host {} mem {} MB",
                c.container_id,
                c.state.to_string(),
                c.host.as_deref().unwrap_or("-"),
                c.memory_mb
            );
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    // se resuelve antes de tocar la red
    if let Commands::Convert { id, level } = &cli.command {
        println!("{}", ids::convert(id, *level)?);
        return Ok(());
    }

    let client = Client::new();
    let base_url = controller_base_url();

    match cli.command {
        Commands::Nodes => {
            let url = format!("{}/api/v1/nodes", base_url);
            let nodes: Vec<NodeView> = client.get(&url).send().await?.json().await?;
            println!("Nodos:");
            for n in &nodes {
                print_node(n);
            }
        }
        Commands::Apps => {
            let url = format!("{}/api/v1/apps", base_url);
            let apps: Vec<AppView> = client.get(&url).send().await?.json().await?;
            if apps.is_empty() {
                println!("No hay aplicaciones en el espejo.");
            }
            for app in &apps {
                println!(
                    "  {:<32} {:<12} {:<10} {:>5.1}%  {}",
                    app.app_id, app.state, app.final_status, app.progress, app.name
                );
            }
        }
        Commands::Status { id } => {
            let url = format!("{}/api/v1/apps/{id}", base_url);
            let resp = client.get(&url).send().await?;

            if resp.status().is_success() {
                let app: AppView = resp.json().await?;
                print_app(&app);
            } else {
                println!("No se encontró la aplicación {id}");
            }
        }
        Commands::Submit { command } => {
            let url = format!("{}/api/v1/apps", base_url);
            let resp = client.post(&url).json(&SubmitRequest { command }).send().await?;
            if !resp.status().is_success() {
                bail!("submit falló: {}", error_of(resp).await);
            }
            let out: SubmitResponse = resp.json().await?;
            match (out.app_id, out.raw_output) {
                (Some(id), _) => println!("Aplicación enviada: {id}"),
                (None, Some(raw)) => {
                    println!("No se encontró un id en la salida:");
                    println!("{raw}");
                }
                (None, None) => println!("Submit sin salida"),
            }
        }
        Commands::Kill { id } => {
            let url = format!("{}/api/v1/apps/{id}/kill", base_url);
            let resp = client.post(&url).send().await?;
            if !resp.status().is_success() {
                bail!("kill falló: {}", error_of(resp).await);
            }
            let out: CommandResponse = resp.json().await?;
            if out.ok {
                println!("Aplicación {} terminada", out.target);
            } else {
                println!("El kill de {} no se confirmó", out.target);
            }
        }
        Commands::Node { action, name } => {
            let url = format!("{}/api/v1/nodes/{name}/{action}", base_url);
            let resp = client.post(&url).send().await?;
            if !resp.status().is_success() {
                bail!("{action} en {name} falló: {}", error_of(resp).await);
            }
            let out: CommandResponse = resp.json().await?;
            println!(
                "{} {}: {}",
                out.action,
                out.target,
                if out.ok { "ok" } else { "sin confirmar" }
            );
        }
        Commands::Report => {
            let url = format!("{}/api/v1/report", base_url);
            let resp = client.get(&url).send().await?;
            if resp.status() == StatusCode::NO_CONTENT {
                println!("Todavía no hay ningún tick completo.");
                return Ok(());
            }
            let report: TickReport = resp.json().await?;
            println!("Tick de {}:", report.started_at);
            println!("  nodos refrescados: {}", report.nodes_refreshed);
            println!(
                "  apps / attempts / containers: {} / {} / {}",
                report.apps_seen, report.attempts_seen, report.containers_seen
            );
            println!(
                "  restricciones: {}",
                if report.constraints.valid { "ok" } else { "violadas" }
            );
            for v in &report.constraints.violations {
                println!("    {}: {}", v.entity, v.constraint);
            }
            for f in &report.faults {
                println!(
                    "  {:?} {:?} en {} (aplicado: {})",
                    f.action, f.kind, f.node, f.applied
                );
            }
        }
        Commands::Convert { .. } => unreachable!("resuelto arriba"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsea_convert() {
        let cli = Cli::try_parse_from(["client", "convert", "container_1_0001_01_000001", "attempt"]).unwrap();
        match cli.command {
            Commands::Convert { id, level } => {
                assert_eq!(level, IdLevel::Attempt);
                assert_eq!(ids::convert(&id, level).unwrap(), "appattempt_1_0001_000001");
            }
            _ => panic!("subcomando inesperado"),
        }
    }

    #[test]
    fn accion_de_nodo_invalida() {
        assert!(Cli::try_parse_from(["client", "node", "reboot", "compute-1"]).is_err());
        assert!(Cli::try_parse_from(["client", "node", "stop-network", "compute-1"]).is_ok());
    }
}
