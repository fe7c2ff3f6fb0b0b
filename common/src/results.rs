//! Registros canónicos que devuelven los parsers, sin importar la fuente.
//! Un campo en `None` significa "la fuente no lo trajo" y no pisa el árbol.

use chrono::{DateTime, Utc};

use crate::app::{AppState, FinalStatus};
use crate::container::ContainerState;
use crate::node::{NodeRef, NodeState};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResult {
    pub node_id: String,
    /// Hostname (Node-Id sin el puerto)
    pub name: String,
    pub state: Option<NodeState>,
    pub http_address: Option<String>,
    pub last_health_update: Option<DateTime<Utc>>,
    pub health_report: Option<String>,
    pub running_containers: Option<u32>,
    pub mem_used: Option<i64>,
    pub mem_available: Option<i64>,
    pub mem_capacity: Option<i64>,
    pub cpu_used: Option<i64>,
    pub cpu_available: Option<i64>,
    pub cpu_capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationResult {
    pub app_id: String,
    pub name: Option<String>,
    pub app_type: Option<String>,
    pub user: Option<String>,
    pub queue: Option<String>,
    pub state: Option<AppState>,
    pub final_status: Option<FinalStatus>,
    pub progress: Option<f64>,
    pub tracking_url: Option<String>,
    pub diagnostics: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    /// Hostname del AM ya sin esquema ni puerto
    pub am_host_id: Option<String>,
    pub allocated_mb: Option<i64>,
    pub allocated_vcores: Option<i64>,
    pub preempted_mb: Option<i64>,
    pub preempted_vcores: Option<i64>,
    pub mb_seconds: Option<i64>,
    pub vcore_seconds: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptResult {
    pub attempt_id: String,
    pub state: Option<AppState>,
    pub am_container_id: Option<String>,
    pub am_host: Option<NodeRef>,
    pub tracking_url: Option<String>,
    pub diagnostics: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerResult {
    pub container_id: String,
    pub state: Option<ContainerState>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub host: Option<NodeRef>,
    pub log_url: Option<String>,
    pub exit_code: Option<i32>,
    pub diagnostics: Option<String>,
    pub memory_mb: Option<i64>,
    pub vcores: Option<i64>,
    pub priority: Option<i32>,
}
