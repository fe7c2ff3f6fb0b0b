use thiserror::Error;

use crate::ids::IdError;

/// Fallo del transporte (ssh / http). Nunca se reintenta acá.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no se pudo ejecutar '{command}': {message}")]
    Failed { command: String, message: String },

    #[error("'{command}' terminó con código {code:?}: {stderr}")]
    ExitStatus {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("HTTP {status} en {url}")]
    Http { url: String, status: u16 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool '{role}' sin conexiones libres tras {attempts} intentos")]
    Exhausted { role: String, attempts: u32 },

    #[error("pool '{role}' no tiene conexiones configuradas")]
    Empty { role: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("no quedan slots disponibles para {level} (capacidad {capacity})")]
    NoMoreSlots { level: &'static str, capacity: usize },

    #[error("el campo {field} mide {len} y el máximo es {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("nodo desconocido: {0}")]
    UnknownNode(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no se pudo leer la configuración: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuración inválida: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuración inválida: {0}")]
    Invalid(String),
}

/// Error general de las operaciones contra el cluster.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Id(#[from] IdError),

    /// Ningún nodo en RUNNING: no hay reconfiguración posible.
    #[error("ningún nodo en estado RUNNING, no hay reconfiguración posible")]
    NoReconfiguration,
}

pub type ClusterResult<T> = Result<T, ClusterError>;
