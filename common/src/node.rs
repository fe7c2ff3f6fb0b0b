use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::container::ContainerRef;
use crate::fault::ActiveFault;
use crate::resources::ResourceCounter;

/// Índice de un nodo en el árbol de estado (y en el directorio de nodos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    #[default]
    Unknown,
    New,
    Running,
    Unhealthy,
    Decommissioned,
    Lost,
    Rebooted,
}

impl FromStr for NodeState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => NodeState::New,
            "RUNNING" => NodeState::Running,
            "UNHEALTHY" => NodeState::Unhealthy,
            "DECOMMISSIONED" => NodeState::Decommissioned,
            "LOST" => NodeState::Lost,
            "REBOOTED" => NodeState::Rebooted,
            // DECOMMISSIONING, SHUTDOWN y cualquier cosa nueva
            _ => NodeState::Unknown,
        })
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Unknown => "UNKNOWN",
            NodeState::New => "NEW",
            NodeState::Running => "RUNNING",
            NodeState::Unhealthy => "UNHEALTHY",
            NodeState::Decommissioned => "DECOMMISSIONED",
            NodeState::Lost => "LOST",
            NodeState::Rebooted => "REBOOTED",
        };
        f.write_str(s)
    }
}

/// Un nodo físico del cluster. Se crea al configurar y nunca se destruye.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    /// `name:puerto`, tal como lo reporta YARN
    pub node_id: String,

    /// El node manager está levantado (lo apaga el fault `NodeDead`)
    pub active: bool,
    /// La red del nodo está conectada (la corta `NodeConnectionError`)
    pub connected: bool,
    pub state: NodeState,

    pub memory: ResourceCounter,
    pub cpu: ResourceCounter,

    pub last_health_update: Option<DateTime<Utc>>,
    pub health_report: String,
    /// Containers que reporta el resource manager
    pub reported_containers: u32,

    /// Containers programados en este nodo (referencia, no propiedad)
    pub containers: Vec<ContainerRef>,

    pub fault: Option<ActiveFault>,
}

impl Node {
    pub fn new(name: &str, node_id: String) -> Self {
        Self {
            name: name.to_string(),
            node_id,
            active: true,
            connected: true,
            state: NodeState::Unknown,
            memory: ResourceCounter::default(),
            cpu: ResourceCounter::default(),
            last_health_update: None,
            health_report: String::new(),
            reported_containers: 0,
            containers: Vec::new(),
            fault: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == NodeState::Running && self.active
    }

    /// Se le pueden hacer consultas directas al node manager.
    pub fn is_reachable(&self) -> bool {
        self.active
            && self.connected
            && !matches!(self.state, NodeState::Lost | NodeState::Decommissioned)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "node {} ({}) state={} active={} connected={} mem={}/{} cpu={}/{} containers={}",
            self.name,
            self.node_id,
            self.state,
            self.active,
            self.connected,
            opt(self.memory.used()),
            opt(self.memory.capacity()),
            opt(self.cpu.used()),
            opt(self.cpu.capacity()),
            self.containers.len(),
        )?;
        if let Some(fault) = &self.fault {
            write!(f, " fault={:?}", fault.kind)?;
        }
        Ok(())
    }
}

pub(crate) fn opt<T: fmt::Display>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "-".to_string())
}
