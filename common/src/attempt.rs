use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{AppRef, AppState};
use crate::container::ContainerRef;
use crate::node::NodeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttemptRef(pub usize);

/// Un intento de ejecución de una aplicación, con su propio ApplicationMaster.
#[derive(Debug, Clone, Default)]
pub struct Attempt {
    pub attempt_id: String,
    /// Aplicación dueña (referencia inversa)
    pub app: Option<AppRef>,
    pub state: AppState,
    pub am_container_id: String,
    pub am_host: Option<NodeRef>,
    pub tracking_url: String,
    pub diagnostics: String,
    pub start_time: Option<DateTime<Utc>>,
    pub containers: Vec<ContainerRef>,
}

impl Attempt {
    pub fn is_free(&self) -> bool {
        self.attempt_id.is_empty()
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} state={} am_container={} am_host={} containers={}",
            self.attempt_id,
            self.state,
            if self.am_container_id.is_empty() { "-" } else { &self.am_container_id },
            self.am_host.map(|n| n.0.to_string()).unwrap_or_else(|| "-".into()),
            self.containers.len(),
        )
    }
}
