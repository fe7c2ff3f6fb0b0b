use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Variable de entorno con la ruta del archivo de configuración.
pub const CONFIG_ENV: &str = "YARNFAULT_CONFIG";

/// De qué fuente se alimenta el espejo del cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    /// Salida de texto de la CLI `yarn` (vía ssh).
    #[default]
    Text,
    /// REST del resource manager / node managers + timeline server.
    Json,
}

/// Configuración inmutable, se arma una vez al arrancar y se pasa a los constructores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub mode: HostMode,

    /// Host del resource manager y del timeline server
    pub controller_host: String,
    pub rm_port: u16,
    pub timeline_port: u16,
    pub nm_http_port: u16,
    /// Puerto que YARN agrega al nombre del nodo para formar el Node-Id
    pub node_port: u16,

    /// Nombres de los nodos (slots físicos, nunca cambian)
    pub nodes: Vec<String>,

    pub slots: SlotConfig,
    /// Largo máximo de los campos de texto del árbol de estado
    pub max_field_len: usize,

    pub faults: FaultConfig,
    pub pool: PoolConfig,
    pub ssh: SshConfig,
    pub commands: CommandTemplates,

    pub tick_interval_secs: u64,
    pub http_listen: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            mode: HostMode::Text,
            controller_host: "controller".to_string(),
            rm_port: 8088,
            timeline_port: 8188,
            nm_http_port: 8042,
            node_port: 45454,
            nodes: vec![
                "compute-1".to_string(),
                "compute-2".to_string(),
                "compute-3".to_string(),
                "compute-4".to_string(),
            ],
            slots: SlotConfig::default(),
            max_field_len: 256,
            faults: FaultConfig::default(),
            pool: PoolConfig::default(),
            ssh: SshConfig::default(),
            commands: CommandTemplates::default(),
            tick_interval_secs: 10,
            http_listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub applications: usize,
    pub attempts: usize,
    pub containers: usize,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            applications: 32,
            attempts: 64,
            containers: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub enabled: bool,
    pub activation_probability: f64,
    pub repair_probability: f64,
    pub seed: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            activation_probability: 0.25,
            repair_probability: 0.5,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub monitoring: usize,
    pub faulting: usize,
    pub submission: usize,
    pub acquire_retries: u32,
    pub retry_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            monitoring: 1,
            faulting: 1,
            submission: 4,
            acquire_retries: 50,
            retry_interval_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub identity_file: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            host: "localhost".to_string(),
            port: 22,
            identity_file: None,
        }
    }
}

/// Plantillas de comandos. `{node}` y `{app}` se reemplazan al renderizar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplates {
    /// Prefijo para la CLI de yarn (p. ej. `docker exec controller yarn`)
    pub yarn: String,
    pub start_node: String,
    pub stop_node: String,
    pub start_node_network: String,
    pub stop_node_network: String,
    pub kill_application: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            yarn: "yarn".to_string(),
            start_node: "hadoop-benchmark/node.sh start {node}".to_string(),
            stop_node: "hadoop-benchmark/node.sh stop {node}".to_string(),
            start_node_network: "hadoop-benchmark/node.sh net-up {node}".to_string(),
            stop_node_network: "hadoop-benchmark/node.sh net-down {node}".to_string(),
            kill_application: "yarn application -kill {app}".to_string(),
        }
    }
}

impl CommandTemplates {
    pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
        let mut out = template.to_string();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config: ClusterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Lee la ruta de `YARNFAULT_CONFIG`; si no está definida usa los valores por defecto.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(CONFIG_ENV) {
            Ok(path) => {
                info!("cargando configuración desde {}", path);
                Self::load(path)
            }
            Err(_) => {
                info!("{} no definida, usando configuración por defecto", CONFIG_ENV);
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() {
            return Err(ConfigError::Invalid("la lista de nodos está vacía".into()));
        }
        for (name, p) in [
            ("activation_probability", self.faults.activation_probability),
            ("repair_probability", self.faults.repair_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} fuera de [0, 1]: {p}")));
            }
        }
        if self.pool.monitoring == 0 || self.pool.faulting == 0 || self.pool.submission == 0 {
            return Err(ConfigError::Invalid(
                "cada pool necesita al menos una conexión".into(),
            ));
        }
        if self.max_field_len == 0 {
            return Err(ConfigError::Invalid("max_field_len debe ser > 0".into()));
        }
        Ok(())
    }

    /// `compute-1` -> `compute-1:45454`
    pub fn node_id(&self, name: &str) -> String {
        format!("{}:{}", name, self.node_port)
    }

    pub fn rm_url(&self) -> String {
        format!("http://{}:{}/ws/v1/cluster", self.controller_host, self.rm_port)
    }

    pub fn timeline_url(&self) -> String {
        format!(
            "http://{}:{}/ws/v1/applicationhistory",
            self.controller_host, self.timeline_port
        )
    }

    pub fn nm_url(&self, node: &str) -> String {
        format!("http://{}:{}/ws/v1/node", node, self.nm_http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parcial_completa_con_defaults() {
        let raw = r#"{ "mode": "json", "nodes": ["n1", "n2"], "faults": { "seed": 7 } }"#;
        let config: ClusterConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(config.mode, HostMode::Json);
        assert_eq!(config.nodes, vec!["n1", "n2"]);
        assert_eq!(config.faults.seed, 7);
        assert_eq!(config.faults.repair_probability, 0.5);
        assert_eq!(config.node_id("n1"), "n1:45454");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rechaza_probabilidades_fuera_de_rango() {
        let mut config = ClusterConfig::default();
        config.faults.activation_probability = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rechaza_pool_vacio() {
        let mut config = ClusterConfig::default();
        config.pool.submission = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn render_reemplaza_variables() {
        let cmd = CommandTemplates::render("node.sh stop {node} # {app}", &[("node", "compute-2")]);
        assert_eq!(cmd, "node.sh stop compute-2 # {app}");
    }

    #[test]
    fn urls_del_cluster() {
        let config = ClusterConfig::default();
        assert_eq!(config.rm_url(), "http://controller:8088/ws/v1/cluster");
        assert_eq!(config.timeline_url(), "http://controller:8188/ws/v1/applicationhistory");
        assert_eq!(config.nm_url("compute-1"), "http://compute-1:8042/ws/v1/node");
    }
}
