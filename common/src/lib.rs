//! Espejo del estado de un cluster YARN e inyector de fallos.
//!
//! El [`controller::Controller`] refresca un [`tree::StateTree`] a partir de
//! un [`parser::ClusterMonitor`] (CLI de texto o REST) y, según la carga de
//! cada nodo, apaga / repara nodos con [`commands::FaultCommands`].

pub mod api;
pub mod app;
pub mod attempt;
pub mod commands;
pub mod config;
pub mod constraints;
pub mod container;
pub mod controller;
pub mod directory;
pub mod error;
pub mod executor;
pub mod fault;
pub mod ids;
pub mod node;
pub mod parser;
pub mod pool;
pub mod resources;
pub mod results;
pub mod snapshot;
pub mod tree;

pub use config::{ClusterConfig, HostMode};
pub use controller::{Controller, TickReport};
pub use error::{ClusterError, ClusterResult, TransportError};
pub use executor::RemoteExecutor;
pub use pool::ConnectionPool;
pub use tree::StateTree;
