//! Sobres JSON del resource manager, node managers y timeline server.
//!
//! Casi todo es `Option`: cada versión de YARN trae campos distintos y una
//! lista vacía a veces llega como `null`.

use serde::Deserialize;

/* ---------------- resource manager ---------------- */

#[derive(Debug, Deserialize)]
pub struct RmNodes {
    pub nodes: Option<RmNodeList>,
}

#[derive(Debug, Deserialize)]
pub struct RmNodeList {
    #[serde(default)]
    pub node: Vec<RmNode>,
}

#[derive(Debug, Deserialize)]
pub struct RmNodeEnvelope {
    pub node: RmNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmNode {
    pub id: String,
    pub state: Option<String>,
    pub node_host_name: Option<String>,
    #[serde(rename = "nodeHTTPAddress")]
    pub node_http_address: Option<String>,
    pub last_health_update: Option<i64>,
    pub health_report: Option<String>,
    pub num_containers: Option<u32>,
    #[serde(rename = "usedMemoryMB")]
    pub used_memory_mb: Option<i64>,
    #[serde(rename = "availMemoryMB")]
    pub avail_memory_mb: Option<i64>,
    pub used_virtual_cores: Option<i64>,
    pub available_virtual_cores: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RmApps {
    pub apps: Option<RmAppList>,
}

#[derive(Debug, Deserialize)]
pub struct RmAppList {
    #[serde(default)]
    pub app: Vec<RmApp>,
}

#[derive(Debug, Deserialize)]
pub struct RmAppEnvelope {
    pub app: RmApp,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmApp {
    pub id: String,
    pub name: Option<String>,
    pub application_type: Option<String>,
    pub user: Option<String>,
    pub queue: Option<String>,
    pub state: Option<String>,
    pub final_status: Option<String>,
    pub progress: Option<f64>,
    pub tracking_url: Option<String>,
    pub diagnostics: Option<String>,
    pub started_time: Option<i64>,
    pub finished_time: Option<i64>,
    pub am_host_http_address: Option<String>,
    #[serde(rename = "allocatedMB")]
    pub allocated_mb: Option<i64>,
    #[serde(rename = "allocatedVCores")]
    pub allocated_vcores: Option<i64>,
    pub memory_seconds: Option<i64>,
    pub vcore_seconds: Option<i64>,
    #[serde(rename = "preemptedResourceMB")]
    pub preempted_mb: Option<i64>,
    #[serde(rename = "preemptedResourceVCores")]
    pub preempted_vcores: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmAttempts {
    pub app_attempts: Option<RmAttemptList>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmAttemptList {
    #[serde(default)]
    pub app_attempt: Vec<RmAttempt>,
}

/// El RM sólo da el número de attempt, no el id completo.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RmAttempt {
    pub id: u64,
    pub start_time: Option<i64>,
    pub container_id: Option<String>,
    pub node_http_address: Option<String>,
    pub node_id: Option<String>,
    pub logs_link: Option<String>,
}

/* ---------------- node manager ---------------- */

#[derive(Debug, Deserialize)]
pub struct NmContainers {
    pub containers: Option<NmContainerList>,
}

#[derive(Debug, Deserialize)]
pub struct NmContainerList {
    #[serde(default)]
    pub container: Vec<NmContainer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmContainer {
    pub id: String,
    pub state: Option<String>,
    pub exit_code: Option<i32>,
    pub diagnostics: Option<String>,
    #[serde(rename = "totalMemoryNeededMB")]
    pub total_memory_needed_mb: Option<i64>,
    #[serde(rename = "totalVCoresNeeded")]
    pub total_vcores_needed: Option<i64>,
    pub container_logs_link: Option<String>,
    pub node_id: Option<String>,
}

/* ---------------- timeline (application history) ---------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineApp {
    pub app_id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub app_type: Option<String>,
    pub user: Option<String>,
    pub queue: Option<String>,
    pub app_state: Option<String>,
    pub final_app_status: Option<String>,
    pub progress: Option<f64>,
    pub tracking_url: Option<String>,
    pub diagnostics_info: Option<String>,
    pub started_time: Option<i64>,
    pub finished_time: Option<i64>,
    pub host: Option<String>,
    #[serde(rename = "allocatedMB")]
    pub allocated_mb: Option<i64>,
    #[serde(rename = "allocatedVCores")]
    pub allocated_vcores: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAttempts {
    #[serde(default)]
    pub app_attempt: Vec<TimelineAttempt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAttempt {
    pub app_attempt_id: String,
    pub host: Option<String>,
    pub rpc_port: Option<i64>,
    pub tracking_url: Option<String>,
    pub diagnostics_info: Option<String>,
    pub app_attempt_state: Option<String>,
    pub am_container_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineContainers {
    #[serde(default)]
    pub container: Vec<TimelineContainer>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineContainer {
    pub container_id: String,
    #[serde(rename = "allocatedMB")]
    pub allocated_mb: Option<i64>,
    #[serde(rename = "allocatedVCores")]
    pub allocated_vcores: Option<i64>,
    pub assigned_node_id: Option<String>,
    pub priority: Option<i32>,
    pub started_time: Option<i64>,
    pub finished_time: Option<i64>,
    pub diagnostics_info: Option<String>,
    pub log_url: Option<String>,
    pub container_exit_status: Option<i32>,
    pub container_state: Option<String>,
    pub node_http_address: Option<String>,
}
