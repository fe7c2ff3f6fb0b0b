//! Parser REST/JSON con reconciliación contra el timeline server.
//!
//! Fuente "viva": resource manager (nodos, apps, attempts) y node managers
//! (containers). Fuente histórica: timeline server. Reglas de mezcla:
//! - containers: la lista sale de los node managers; el timeline sólo pisa
//!   prioridad, inicio y fin de los containers que ya están en la lista viva.
//!   Los que sólo aparecen en el timeline se descartan.
//! - attempts: el timeline pisa estado, tracking url y diagnósticos cuando el
//!   número de attempt coincide.
//! - detalles: si la fuente viva no tiene el registro se usa el del timeline.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::rest_model::*;
use super::{millis_to_time, non_empty, ClusterMonitor};
use crate::app::AppState;
use crate::config::ClusterConfig;
use crate::directory::{strip_host, NodeDirectory};
use crate::error::ClusterResult;
use crate::ids::{self, IdLevel};
use crate::pool::ConnectionPool;
use crate::results::{ApplicationResult, AttemptResult, ContainerResult, NodeResult};

pub struct RestParser {
    pool: Arc<ConnectionPool>,
    directory: Arc<NodeDirectory>,
    rm_url: String,
    timeline_url: String,
    config: Arc<ClusterConfig>,
}

impl RestParser {
    pub fn new(config: Arc<ClusterConfig>, pool: Arc<ConnectionPool>, directory: Arc<NodeDirectory>) -> Self {
        Self {
            pool,
            directory,
            rm_url: config.rm_url(),
            timeline_url: config.timeline_url(),
            config,
        }
    }

    fn get<T: DeserializeOwned>(&self, url: &str) -> ClusterResult<Option<T>> {
        debug!("[json] GET {}", url);
        let raw = self.pool.run(url)?;
        Ok(decode(&raw, url))
    }

    fn timeline_attempts(&self, app_id: &str) -> ClusterResult<Vec<TimelineAttempt>> {
        let url = format!("{}/apps/{}/appattempts", self.timeline_url, app_id);
        Ok(self
            .get::<TimelineAttempts>(&url)?
            .map(|t| t.app_attempt)
            .unwrap_or_default())
    }

    fn rm_attempts(&self, app_id: &str) -> ClusterResult<Option<Vec<RmAttempt>>> {
        let url = format!("{}/apps/{}/appattempts", self.rm_url, app_id);
        Ok(self
            .get::<RmAttempts>(&url)?
            .map(|a| a.app_attempts.map(|l| l.app_attempt).unwrap_or_default()))
    }

    /// Containers vivos del attempt, preguntando a cada node manager alcanzable.
    fn live_containers(&self, attempt_id: &str) -> ClusterResult<Vec<ContainerResult>> {
        let mut out = Vec::new();
        for node in self.directory.refs() {
            if !self.directory.is_reachable(node) {
                continue;
            }
            let Some(name) = self.directory.name(node) else {
                continue;
            };
            let url = format!("{}/containers", self.config.nm_url(name));
            let Some(list) = self.get::<NmContainers>(&url)? else {
                continue;
            };

            for c in list.containers.map(|l| l.container).unwrap_or_default() {
                if ids::convert(&c.id, IdLevel::Attempt).ok().as_deref() != Some(attempt_id) {
                    continue;
                }
                let mut result = nm_container_result(c, &self.directory);
                result.host = result.host.or(Some(node));
                out.push(result);
            }
        }
        Ok(out)
    }

    fn timeline_containers(&self, attempt_id: &str) -> ClusterResult<Vec<TimelineContainer>> {
        let app_id = ids::convert(attempt_id, IdLevel::Application)?;
        let url = format!(
            "{}/apps/{}/appattempts/{}/containers",
            self.timeline_url, app_id, attempt_id
        );
        Ok(self
            .get::<TimelineContainers>(&url)?
            .map(|t| t.container)
            .unwrap_or_default())
    }
}

impl ClusterMonitor for RestParser {
    fn list_nodes(&self) -> ClusterResult<Vec<NodeResult>> {
        let url = format!("{}/nodes", self.rm_url);
        Ok(self
            .get::<RmNodes>(&url)?
            .and_then(|n| n.nodes)
            .map(|l| l.node.into_iter().map(rm_node_result).collect())
            .unwrap_or_default())
    }

    fn node_details(&self, node_id: &str) -> ClusterResult<Option<NodeResult>> {
        let url = format!("{}/nodes/{}", self.rm_url, node_id);
        Ok(self.get::<RmNodeEnvelope>(&url)?.map(|e| rm_node_result(e.node)))
    }

    fn list_applications(&self, states: AppState) -> ClusterResult<Vec<ApplicationResult>> {
        let url = if states.contains(AppState::all_yarn()) {
            format!("{}/apps", self.rm_url)
        } else {
            let names = states.yarn_names();
            if names.is_empty() {
                return Ok(Vec::new());
            }
            format!("{}/apps?states={}", self.rm_url, names.join(","))
        };
        Ok(self
            .get::<RmApps>(&url)?
            .and_then(|a| a.apps)
            .map(|l| l.app.into_iter().map(rm_app_result).collect())
            .unwrap_or_default())
    }

    fn application_details(&self, app_id: &str) -> ClusterResult<Option<ApplicationResult>> {
        let url = format!("{}/apps/{}", self.rm_url, app_id);
        if let Some(env) = self.get::<RmAppEnvelope>(&url)? {
            return Ok(Some(rm_app_result(env.app)));
        }
        let url = format!("{}/apps/{}", self.timeline_url, app_id);
        Ok(self.get::<TimelineApp>(&url)?.map(timeline_app_result))
    }

    fn list_attempts(&self, app_id: &str) -> ClusterResult<Vec<AttemptResult>> {
        let history = self.timeline_attempts(app_id)?;

        let Some(live) = self.rm_attempts(app_id)? else {
            debug!("[json] el RM no conoce {}, se usan los attempts del timeline", app_id);
            return Ok(history
                .into_iter()
                .map(|t| timeline_attempt_result(t, &self.directory))
                .collect());
        };

        let live = live
            .into_iter()
            .map(|a| rm_attempt_result(app_id, a, &self.directory))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reconcile_attempts(live, &history))
    }

    fn attempt_details(&self, attempt_id: &str) -> ClusterResult<Option<AttemptResult>> {
        let app_id = ids::convert(attempt_id, IdLevel::Application)?;
        let number = ids::attempt_number(attempt_id)?;

        let history: Vec<_> = self
            .timeline_attempts(&app_id)?
            .into_iter()
            .filter(|t| ids::attempt_number(&t.app_attempt_id).ok() == Some(number))
            .collect();

        let live = self
            .rm_attempts(&app_id)?
            .unwrap_or_default()
            .into_iter()
            .find(|a| a.id == number);

        match live {
            Some(a) => {
                let live = rm_attempt_result(&app_id, a, &self.directory)?;
                Ok(reconcile_attempts(vec![live], &history).pop())
            }
            None => Ok(history
                .into_iter()
                .next()
                .map(|t| timeline_attempt_result(t, &self.directory))),
        }
    }

    fn list_containers(&self, attempt_id: &str) -> ClusterResult<Vec<ContainerResult>> {
        let live = self.live_containers(attempt_id)?;
        if live.is_empty() {
            return Ok(live);
        }
        let history = self.timeline_containers(attempt_id)?;
        Ok(reconcile_containers(live, &history))
    }

    fn container_details(&self, container_id: &str) -> ClusterResult<Option<ContainerResult>> {
        let attempt_id = ids::convert(container_id, IdLevel::Attempt)?;
        let app_id = ids::convert(container_id, IdLevel::Application)?;

        let url = format!(
            "{}/apps/{}/appattempts/{}/containers/{}",
            self.timeline_url, app_id, attempt_id, container_id
        );
        let history: Vec<_> = self.get::<TimelineContainer>(&url)?.into_iter().collect();

        let live = self
            .live_containers(&attempt_id)?
            .into_iter()
            .find(|c| c.container_id == container_id);

        Ok(match live {
            Some(c) => reconcile_containers(vec![c], &history).pop(),
            None => history
                .into_iter()
                .next()
                .map(|t| timeline_container_result(t, &self.directory)),
        })
    }
}

/// Salida vacía = sin datos; JSON roto se loguea y también cuenta como sin datos.
fn decode<T: DeserializeOwned>(raw: &str, source: &str) -> Option<T> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("[json] respuesta inválida de {}: {}", source, e);
            None
        }
    }
}

/* ---------------- reconciliación ---------------- */

/// El timeline manda en los tiempos y la prioridad; la identidad y el host
/// son los de la fuente viva. Containers sólo del timeline no entran.
pub fn reconcile_containers(
    mut live: Vec<ContainerResult>,
    history: &[TimelineContainer],
) -> Vec<ContainerResult> {
    for c in &mut live {
        let Some(h) = history.iter().find(|h| h.container_id == c.container_id) else {
            continue;
        };
        if h.priority.is_some() {
            c.priority = h.priority;
        }
        if let Some(t) = h.started_time.and_then(millis_to_time) {
            c.start_time = Some(t);
        }
        if let Some(t) = h.finished_time.and_then(millis_to_time) {
            c.finish_time = Some(t);
        }
    }
    live
}

pub fn reconcile_attempts(mut live: Vec<AttemptResult>, history: &[TimelineAttempt]) -> Vec<AttemptResult> {
    for a in &mut live {
        let Ok(number) = ids::attempt_number(&a.attempt_id) else {
            continue;
        };
        let Some(h) = history
            .iter()
            .find(|h| ids::attempt_number(&h.app_attempt_id).ok() == Some(number))
        else {
            continue;
        };

        if let Some(state) = h.app_attempt_state.as_deref().and_then(AppState::parse) {
            a.state = Some(state);
        }
        if let Some(url) = h.tracking_url.as_deref().and_then(non_empty) {
            a.tracking_url = Some(url);
        }
        if let Some(d) = &h.diagnostics_info {
            a.diagnostics = Some(d.clone());
        }
    }
    live
}

/* ---------------- conversiones ---------------- */

fn rm_node_result(n: RmNode) -> NodeResult {
    let name = n
        .node_host_name
        .as_deref()
        .and_then(non_empty)
        .unwrap_or_else(|| strip_host(&n.id).to_string());
    NodeResult {
        name,
        state: n.state.as_deref().and_then(|s| s.parse().ok()),
        http_address: n.node_http_address.as_deref().and_then(non_empty),
        last_health_update: n.last_health_update.and_then(millis_to_time),
        health_report: n.health_report,
        running_containers: n.num_containers,
        mem_used: n.used_memory_mb,
        mem_available: n.avail_memory_mb,
        cpu_used: n.used_virtual_cores,
        cpu_available: n.available_virtual_cores,
        node_id: n.id,
        ..Default::default()
    }
}

/// YARN informa -1 en los contadores de apps terminadas.
fn counter(v: Option<i64>) -> Option<i64> {
    v.filter(|v| *v >= 0)
}

fn rm_app_result(a: RmApp) -> ApplicationResult {
    ApplicationResult {
        name: a.name,
        app_type: a.application_type,
        user: a.user,
        queue: a.queue,
        state: a.state.as_deref().and_then(AppState::parse),
        final_status: a.final_status.as_deref().and_then(|s| s.parse().ok()),
        progress: a.progress,
        tracking_url: a.tracking_url.as_deref().and_then(non_empty),
        diagnostics: a.diagnostics,
        start_time: a.started_time.and_then(millis_to_time),
        finish_time: a.finished_time.and_then(millis_to_time),
        am_host_id: a.am_host_http_address.as_deref().map(strip_host).and_then(non_empty),
        allocated_mb: counter(a.allocated_mb),
        allocated_vcores: counter(a.allocated_vcores),
        preempted_mb: counter(a.preempted_mb),
        preempted_vcores: counter(a.preempted_vcores),
        mb_seconds: counter(a.memory_seconds),
        vcore_seconds: counter(a.vcore_seconds),
        app_id: a.id,
    }
}

fn timeline_app_result(a: TimelineApp) -> ApplicationResult {
    ApplicationResult {
        name: a.name,
        app_type: a.app_type,
        user: a.user,
        queue: a.queue,
        state: a.app_state.as_deref().and_then(AppState::parse),
        final_status: a.final_app_status.as_deref().and_then(|s| s.parse().ok()),
        progress: a.progress,
        tracking_url: a.tracking_url.as_deref().and_then(non_empty),
        diagnostics: a.diagnostics_info,
        start_time: a.started_time.and_then(millis_to_time),
        finish_time: a.finished_time.and_then(millis_to_time),
        am_host_id: a.host.as_deref().map(strip_host).and_then(non_empty),
        allocated_mb: counter(a.allocated_mb),
        allocated_vcores: counter(a.allocated_vcores),
        app_id: a.app_id,
        ..Default::default()
    }
}

fn rm_attempt_result(
    app_id: &str,
    a: RmAttempt,
    directory: &NodeDirectory,
) -> Result<AttemptResult, ids::IdError> {
    let host = a
        .node_id
        .as_deref()
        .and_then(|h| directory.resolve(h))
        .or_else(|| a.node_http_address.as_deref().and_then(|h| directory.resolve(h)));
    Ok(AttemptResult {
        attempt_id: ids::convert_with(app_id, &a.id.to_string(), IdLevel::Attempt)?,
        am_container_id: a.container_id.as_deref().and_then(non_empty),
        am_host: host,
        tracking_url: a.logs_link.as_deref().and_then(non_empty),
        start_time: a.start_time.and_then(millis_to_time),
        ..Default::default()
    })
}

fn timeline_attempt_result(t: TimelineAttempt, directory: &NodeDirectory) -> AttemptResult {
    AttemptResult {
        state: t.app_attempt_state.as_deref().and_then(AppState::parse),
        am_container_id: t.am_container_id.as_deref().and_then(non_empty),
        am_host: t.host.as_deref().and_then(|h| directory.resolve(h)),
        tracking_url: t.tracking_url.as_deref().and_then(non_empty),
        diagnostics: t.diagnostics_info,
        attempt_id: t.app_attempt_id,
        start_time: None,
    }
}

fn nm_container_result(c: NmContainer, directory: &NodeDirectory) -> ContainerResult {
    ContainerResult {
        state: c.state.as_deref().and_then(|s| s.parse().ok()),
        host: c.node_id.as_deref().and_then(|h| directory.resolve(h)),
        log_url: c.container_logs_link.as_deref().and_then(non_empty),
        exit_code: c.exit_code,
        diagnostics: c.diagnostics,
        memory_mb: c.total_memory_needed_mb,
        vcores: c.total_vcores_needed,
        container_id: c.id,
        ..Default::default()
    }
}

fn timeline_container_result(t: TimelineContainer, directory: &NodeDirectory) -> ContainerResult {
    let host = t
        .assigned_node_id
        .as_deref()
        .and_then(|h| directory.resolve(h))
        .or_else(|| t.node_http_address.as_deref().and_then(|h| directory.resolve(h)));
    ContainerResult {
        state: t.container_state.as_deref().and_then(|s| s.parse().ok()),
        start_time: t.started_time.and_then(millis_to_time),
        finish_time: t.finished_time.and_then(millis_to_time),
        host,
        log_url: t.log_url.as_deref().and_then(non_empty),
        exit_code: t.container_exit_status,
        diagnostics: t.diagnostics_info,
        memory_mb: t.allocated_mb,
        vcores: t.allocated_vcores,
        priority: t.priority,
        container_id: t.container_id,
    }
}
