//! Comandos que modifican el cluster: fallos de nodo, kill y submit.
//!
//! Acá sólo se arma el comando y se interpreta la salida; el éxito se deduce
//! del texto que devuelve el script remoto.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{info, warn};

use crate::config::{ClusterConfig, CommandTemplates};
use crate::error::ClusterResult;
use crate::pool::ConnectionPool;

fn app_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"application_\d+_\d+").expect("regex de app id inválida"))
}

pub struct FaultCommands {
    pool: Arc<ConnectionPool>,
    templates: CommandTemplates,
}

impl FaultCommands {
    pub fn new(config: &ClusterConfig, pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            templates: config.commands.clone(),
        }
    }

    fn exec(&self, template: &str, vars: &[(&str, &str)]) -> ClusterResult<String> {
        let command = CommandTemplates::render(template, vars);
        info!("[fault] {}", command);
        self.pool.run(&command)
    }

    pub fn start_node(&self, node: &str) -> ClusterResult<bool> {
        let out = self.exec(&self.templates.start_node, &[("node", node)])?.to_lowercase();
        Ok((out.contains("running") || out.contains("started")) && !out.contains("error"))
    }

    pub fn stop_node(&self, node: &str) -> ClusterResult<bool> {
        let out = self.exec(&self.templates.stop_node, &[("node", node)])?.to_lowercase();
        Ok(out.contains("stopped") || out.contains("exited"))
    }

    pub fn start_node_network(&self, node: &str) -> ClusterResult<bool> {
        let out = self
            .exec(&self.templates.start_node_network, &[("node", node)])?
            .to_lowercase();
        Ok(out.contains("connected") && !out.contains("disconnected"))
    }

    pub fn stop_node_network(&self, node: &str) -> ClusterResult<bool> {
        let out = self
            .exec(&self.templates.stop_node_network, &[("node", node)])?
            .to_lowercase();
        Ok(out.contains("disconnected"))
    }

    pub fn kill_application(&self, app_id: &str) -> ClusterResult<bool> {
        let out = self.exec(&self.templates.kill_application, &[("app", app_id)])?;
        let ok = out.contains(app_id)
            && (out.contains("Killed application")
                || out.contains("Killing application")
                || out.contains("has already finished"));
        if !ok {
            warn!("[fault] kill de {} sin confirmar: {}", app_id, out.trim());
        }
        Ok(ok)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(String),
    /// No apareció ningún id en la salida; se devuelve tal cual.
    Ambiguous(String),
}

/// Envía aplicaciones usando el pool de submission.
pub struct Submitter {
    pool: Arc<ConnectionPool>,
}

impl Submitter {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn submit_application(&self, command: &str) -> ClusterResult<SubmitOutcome> {
        info!("[submit] {}", command);
        let out = self.pool.run(command)?;
        Ok(match app_id_pattern().find(&out) {
            Some(m) => {
                info!("[submit] aplicación {}", m.as_str());
                SubmitOutcome::Submitted(m.as_str().to_string())
            }
            None => SubmitOutcome::Ambiguous(out),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{pool_of, ScriptedExecutor};

    fn commands(exec: ScriptedExecutor) -> (FaultCommands, Arc<ScriptedExecutor>) {
        let exec = Arc::new(exec);
        (FaultCommands::new(&ClusterConfig::default(), pool_of(&exec)), exec)
    }

    #[test]
    fn stop_y_start_de_nodo() {
        let (cmds, exec) = commands(
            ScriptedExecutor::new()
                .on("hadoop-benchmark/node.sh stop compute-1", "compute-1 stopped")
                .on("hadoop-benchmark/node.sh start compute-1", "Container compute-1 Started")
                .on("hadoop-benchmark/node.sh start compute-2", "Error: compute-2 running already"),
        );
        assert!(cmds.stop_node("compute-1").unwrap());
        assert!(cmds.start_node("compute-1").unwrap());
        assert!(!cmds.start_node("compute-2").unwrap());
        assert_eq!(exec.calls()[0], "hadoop-benchmark/node.sh stop compute-1");
    }

    #[test]
    fn red_del_nodo() {
        let (cmds, _) = commands(
            ScriptedExecutor::new()
                .on("hadoop-benchmark/node.sh net-down compute-1", "compute-1 disconnected")
                .on("hadoop-benchmark/node.sh net-up compute-1", "compute-1 connected"),
        );
        assert!(cmds.stop_node_network("compute-1").unwrap());
        assert!(cmds.start_node_network("compute-1").unwrap());
        // "disconnected" contiene "connected": no cuenta como subida
        let (cmds, _) = commands(
            ScriptedExecutor::new().on("hadoop-benchmark/node.sh net-up", "still disconnected"),
        );
        assert!(!cmds.start_node_network("compute-1").unwrap());
    }

    #[test]
    fn kill_de_aplicacion() {
        let app = "application_1515488762656_0001";
        let (cmds, _) = commands(ScriptedExecutor::new().on(
            "yarn application -kill application_1515488762656_0001",
            "Killing application application_1515488762656_0001\n",
        ));
        assert!(cmds.kill_application(app).unwrap());
        assert!(!cmds.kill_application("application_1515488762656_0002").unwrap());
    }

    #[test]
    fn error_de_transporte_no_es_false() {
        let (cmds, _) = commands(ScriptedExecutor::new().fail_on("hadoop-benchmark"));
        assert!(cmds.stop_node("compute-1").is_err());
    }

    #[test]
    fn submit_extrae_el_id() {
        let exec = Arc::new(
            ScriptedExecutor::new()
                .on(
                    "hadoop jar wordcount.jar",
                    "18/01/09 10:06:17 INFO impl.YarnClientImpl: Submitted application application_1515488762656_0003\n",
                )
                .on("hadoop jar broken.jar", "Exception in thread main"),
        );
        let submitter = Submitter::new(pool_of(&exec));
        assert_eq!(
            submitter.submit_application("hadoop jar wordcount.jar in out").unwrap(),
            SubmitOutcome::Submitted("application_1515488762656_0003".into())
        );
        assert_eq!(
            submitter.submit_application("hadoop jar broken.jar").unwrap(),
            SubmitOutcome::Ambiguous("Exception in thread main".into())
        );
    }
}
