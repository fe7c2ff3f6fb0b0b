use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::AttemptRef;
use crate::node::{opt, NodeRef};

/// Índice de un container; el nodo lo guarda como referencia inversa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerRef(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerState {
    #[default]
    Unknown,
    New,
    Reserved,
    Allocated,
    Acquired,
    Running,
    Released,
    Expired,
    Killed,
    Complete,
}

impl ContainerState {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            ContainerState::Complete
                | ContainerState::Killed
                | ContainerState::Released
                | ContainerState::Expired
        )
    }
}

impl FromStr for ContainerState {
    type Err = ();

    /// Acepta tanto los estados del resource manager como los del node manager.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "NEW" | "SCHEDULED" | "LOCALIZING" | "LOCALIZED" => ContainerState::New,
            "RESERVED" => ContainerState::Reserved,
            "ALLOCATED" => ContainerState::Allocated,
            "ACQUIRED" => ContainerState::Acquired,
            "RUNNING" => ContainerState::Running,
            "RELEASED" => ContainerState::Released,
            "EXPIRED" => ContainerState::Expired,
            "KILLED" | "KILLING" | "CONTAINER_CLEANEDUP_AFTER_KILL" => ContainerState::Killed,
            "COMPLETE" | "DONE" | "EXITED_WITH_SUCCESS" | "EXITED_WITH_FAILURE"
            | "LOCALIZATION_FAILED" | "CONTAINER_RESOURCES_CLEANINGUP" => ContainerState::Complete,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Unknown => "UNKNOWN",
            ContainerState::New => "NEW",
            ContainerState::Reserved => "RESERVED",
            ContainerState::Allocated => "ALLOCATED",
            ContainerState::Acquired => "ACQUIRED",
            ContainerState::Running => "RUNNING",
            ContainerState::Released => "RELEASED",
            ContainerState::Expired => "EXPIRED",
            ContainerState::Killed => "KILLED",
            ContainerState::Complete => "COMPLETE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    pub container_id: String,
    /// Attempt dueño (referencia inversa)
    pub attempt: Option<AttemptRef>,
    pub state: ContainerState,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub host: Option<NodeRef>,
    pub log_url: String,
    pub exit_code: Option<i32>,
    pub diagnostics: String,
    pub memory_mb: i64,
    pub vcores: i64,
    pub priority: i32,
}

impl Container {
    pub fn is_free(&self) -> bool {
        self.container_id.is_empty()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "container {} state={} host={} mem={}MB vcores={} exit={} start={} finish={}",
            self.container_id,
            self.state,
            opt(self.host.map(|n| n.0)),
            self.memory_mb,
            self.vcores,
            opt(self.exit_code),
            opt(self.start_time.map(|t| t.to_rfc3339())),
            opt(self.finish_time.map(|t| t.to_rfc3339())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estados_del_node_manager_se_mapean() {
        assert_eq!("LOCALIZING".parse::<ContainerState>(), Ok(ContainerState::New));
        assert_eq!("EXITED_WITH_SUCCESS".parse::<ContainerState>(), Ok(ContainerState::Complete));
        assert_eq!("KILLING".parse::<ContainerState>(), Ok(ContainerState::Killed));
        assert_eq!("RUNNING".parse::<ContainerState>(), Ok(ContainerState::Running));
        assert!("zzz".parse::<ContainerState>().is_err());
    }

    #[test]
    fn estados_terminados() {
        assert!(ContainerState::Complete.is_finished());
        assert!(!ContainerState::Running.is_finished());
    }
}
