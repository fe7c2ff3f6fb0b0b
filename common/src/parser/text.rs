//! Parser de la salida de texto de la CLI `yarn`.
//!
//! Las listas son líneas separadas por tabs con una cantidad fija de campos por
//! entidad; las líneas que no cumplen (encabezados, totales, basura) se saltean.
//! Los reportes (`-status`) son líneas `clave : valor`; si falta alguna clave
//! requerida el reporte entero se descarta.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use csv::{ReaderBuilder, Trim};
use regex::Regex;
use tracing::{debug, warn};

use super::{
    leading_int, millis_to_time, non_empty, parse_cli_time, parse_health_time, parse_percent,
    ClusterMonitor,
};
use crate::app::AppState;
use crate::config::ClusterConfig;
use crate::directory::{strip_host, NodeDirectory};
use crate::error::ClusterResult;
use crate::pool::ConnectionPool;
use crate::results::{ApplicationResult, AttemptResult, ContainerResult, NodeResult};

const NODE_FIELDS: usize = 4;
const APP_FIELDS: usize = 9;
const ATTEMPT_FIELDS: usize = 4;
const CONTAINER_FIELDS: usize = 7;

const NODE_KEYS: [&str; 11] = [
    "Node-Id",
    "Rack",
    "Node-State",
    "Node-Http-Address",
    "Last-Health-Update",
    "Health-Report",
    "Containers",
    "Memory-Used",
    "Memory-Capacity",
    "CPU-Used",
    "CPU-Capacity",
];

const APP_KEYS: [&str; 13] = [
    "Application-Id",
    "Application-Name",
    "Application-Type",
    "User",
    "Queue",
    "Start-Time",
    "Finish-Time",
    "Progress",
    "State",
    "Final-State",
    "Tracking-URL",
    "AM Host",
    "Diagnostics",
];

const ATTEMPT_KEYS: [&str; 7] = [
    "ApplicationAttempt-Id",
    "State",
    "AMContainer",
    "Tracking-URL",
    "RPC Port",
    "AM Host",
    "Diagnostics",
];

const CONTAINER_KEYS: [&str; 7] = [
    "Container-Id",
    "Start-Time",
    "Finish-Time",
    "State",
    "LOG-URL",
    "Host",
    "Diagnostics",
];

fn detail_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<key>[\w\- ]+?)\s+:\s?(?P<value>.*?)\s*$")
            .expect("regex de reporte inválida")
    })
}

pub struct CmdParser {
    pool: Arc<ConnectionPool>,
    directory: Arc<NodeDirectory>,
    yarn: String,
}

impl CmdParser {
    pub fn new(config: &ClusterConfig, pool: Arc<ConnectionPool>, directory: Arc<NodeDirectory>) -> Self {
        Self {
            pool,
            directory,
            yarn: config.commands.yarn.clone(),
        }
    }

    fn yarn(&self, args: &str) -> ClusterResult<String> {
        let command = format!("{} {}", self.yarn, args);
        debug!("[text] {}", command);
        self.pool.run(&command)
    }
}

impl ClusterMonitor for CmdParser {
    fn list_nodes(&self) -> ClusterResult<Vec<NodeResult>> {
        let raw = self.yarn("node -list -all")?;
        Ok(parse_node_list(&raw))
    }

    fn node_details(&self, node_id: &str) -> ClusterResult<Option<NodeResult>> {
        let raw = self.yarn(&format!("node -status {node_id}"))?;
        Ok(parse_node_report(&raw))
    }

    fn list_applications(&self, states: AppState) -> ClusterResult<Vec<ApplicationResult>> {
        let filter = if states.contains(AppState::all_yarn()) {
            "ALL".to_string()
        } else {
            states.yarn_names().join(",")
        };
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.yarn(&format!("application -list -appStates {filter}"))?;
        Ok(parse_app_list(&raw))
    }

    fn application_details(&self, app_id: &str) -> ClusterResult<Option<ApplicationResult>> {
        let raw = self.yarn(&format!("application -status {app_id}"))?;
        Ok(parse_app_report(&raw))
    }

    fn list_attempts(&self, app_id: &str) -> ClusterResult<Vec<AttemptResult>> {
        let raw = self.yarn(&format!("applicationattempt -list {app_id}"))?;
        Ok(parse_attempt_list(&raw))
    }

    fn attempt_details(&self, attempt_id: &str) -> ClusterResult<Option<AttemptResult>> {
        let raw = self.yarn(&format!("applicationattempt -status {attempt_id}"))?;
        Ok(parse_attempt_report(&raw, &self.directory))
    }

    fn list_containers(&self, attempt_id: &str) -> ClusterResult<Vec<ContainerResult>> {
        let raw = self.yarn(&format!("container -list {attempt_id}"))?;
        Ok(parse_container_list(&raw, &self.directory))
    }

    fn container_details(&self, container_id: &str) -> ClusterResult<Option<ContainerResult>> {
        let raw = self.yarn(&format!("container -status {container_id}"))?;
        Ok(parse_container_report(&raw, &self.directory))
    }
}

/* ---------------- listas ---------------- */

/// Filas con exactamente `fields` campos cuyo primer campo pasa `leading`.
fn rows(raw: &str, fields: usize, leading: impl Fn(&str) -> bool) -> Vec<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(raw.as_bytes());

    reader
        .records()
        .filter_map(|r| match r {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("[text] línea ilegible: {}", e);
                None
            }
        })
        .filter(|r| r.len() == fields && r.get(0).map(|f| leading(f)).unwrap_or(false))
        .map(|r| r.iter().map(str::to_string).collect())
        .collect()
}

/// `compute-1:45454`
fn looks_like_node_id(field: &str) -> bool {
    match field.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty() && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

pub fn parse_node_list(raw: &str) -> Vec<NodeResult> {
    rows(raw, NODE_FIELDS, looks_like_node_id)
        .into_iter()
        .map(|f| NodeResult {
            name: strip_host(&f[0]).to_string(),
            node_id: f[0].clone(),
            state: f[1].parse().ok(),
            http_address: non_empty(&f[2]),
            running_containers: leading_int(&f[3]).and_then(|n| u32::try_from(n).ok()),
            ..Default::default()
        })
        .collect()
}

pub fn parse_app_list(raw: &str) -> Vec<ApplicationResult> {
    rows(raw, APP_FIELDS, |f| f.starts_with("application_"))
        .into_iter()
        .map(|f| ApplicationResult {
            app_id: f[0].clone(),
            name: Some(f[1].clone()),
            app_type: Some(f[2].clone()),
            user: Some(f[3].clone()),
            queue: Some(f[4].clone()),
            state: AppState::parse(&f[5]),
            final_status: f[6].parse().ok(),
            progress: parse_percent(&f[7]),
            tracking_url: non_empty(&f[8]),
            ..Default::default()
        })
        .collect()
}

pub fn parse_attempt_list(raw: &str) -> Vec<AttemptResult> {
    rows(raw, ATTEMPT_FIELDS, |f| f.starts_with("appattempt_"))
        .into_iter()
        .map(|f| AttemptResult {
            attempt_id: f[0].clone(),
            state: AppState::parse(&f[1]),
            am_container_id: non_empty(&f[2]),
            tracking_url: non_empty(&f[3]),
            ..Default::default()
        })
        .collect()
}

pub fn parse_container_list(raw: &str, directory: &NodeDirectory) -> Vec<ContainerResult> {
    rows(raw, CONTAINER_FIELDS, |f| f.starts_with("container_"))
        .into_iter()
        .map(|f| ContainerResult {
            container_id: f[0].clone(),
            start_time: parse_cli_time(&f[1]),
            finish_time: parse_cli_time(&f[2]),
            state: f[3].parse().ok(),
            host: directory.resolve(&f[4]).or_else(|| directory.resolve(&f[5])),
            log_url: non_empty(&f[6]),
            ..Default::default()
        })
        .collect()
}

/* ---------------- reportes ---------------- */

fn report(raw: &str, required: &[&str]) -> Option<HashMap<String, String>> {
    if raw.trim().is_empty() {
        return None;
    }
    let re = detail_line();
    let fields: HashMap<String, String> = raw
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|c| (c["key"].trim().to_string(), c["value"].to_string()))
        .collect();

    let missing: Vec<_> = required.iter().filter(|k| !fields.contains_key(**k)).collect();
    if missing.is_empty() {
        Some(fields)
    } else {
        debug!("[text] reporte descartado, faltan {:?}", missing);
        None
    }
}

fn millis_field(fields: &HashMap<String, String>, key: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    fields.get(key).and_then(|v| leading_int(v)).and_then(millis_to_time)
}

pub fn parse_node_report(raw: &str) -> Option<NodeResult> {
    let f = report(raw, &NODE_KEYS)?;

    let mem_used = leading_int(&f["Memory-Used"]);
    let mem_capacity = leading_int(&f["Memory-Capacity"]);
    let cpu_used = leading_int(&f["CPU-Used"]);
    let cpu_capacity = leading_int(&f["CPU-Capacity"]);
    let available = |used: Option<i64>, cap: Option<i64>| match (used, cap) {
        (Some(u), Some(c)) => Some(c - u),
        _ => None,
    };

    let node_id = f["Node-Id"].clone();
    Some(NodeResult {
        name: strip_host(&node_id).to_string(),
        state: f["Node-State"].parse().ok(),
        http_address: non_empty(&f["Node-Http-Address"]),
        last_health_update: parse_health_time(&f["Last-Health-Update"]),
        health_report: Some(f["Health-Report"].clone()),
        running_containers: leading_int(&f["Containers"]).and_then(|n| u32::try_from(n).ok()),
        mem_used,
        mem_available: available(mem_used, mem_capacity),
        mem_capacity,
        cpu_used,
        cpu_available: available(cpu_used, cpu_capacity),
        cpu_capacity,
        node_id,
    })
}

pub fn parse_app_report(raw: &str) -> Option<ApplicationResult> {
    let f = report(raw, &APP_KEYS)?;

    // "261629 MB-seconds, 107 vcore-seconds"
    let (mb_seconds, vcore_seconds) = match f.get("Aggregate Resource Allocation") {
        Some(agg) => {
            let mut parts = agg.split(',').map(leading_int);
            (parts.next().flatten(), parts.next().flatten())
        }
        None => (None, None),
    };

    Some(ApplicationResult {
        app_id: f["Application-Id"].clone(),
        name: Some(f["Application-Name"].clone()),
        app_type: Some(f["Application-Type"].clone()),
        user: Some(f["User"].clone()),
        queue: Some(f["Queue"].clone()),
        state: AppState::parse(&f["State"]),
        final_status: f["Final-State"].parse().ok(),
        progress: parse_percent(&f["Progress"]),
        tracking_url: non_empty(&f["Tracking-URL"]),
        diagnostics: Some(f["Diagnostics"].clone()),
        start_time: millis_field(&f, "Start-Time"),
        finish_time: millis_field(&f, "Finish-Time"),
        am_host_id: non_empty(strip_host(&f["AM Host"])),
        mb_seconds,
        vcore_seconds,
        ..Default::default()
    })
}

pub fn parse_attempt_report(raw: &str, directory: &NodeDirectory) -> Option<AttemptResult> {
    let f = report(raw, &ATTEMPT_KEYS)?;
    Some(AttemptResult {
        attempt_id: f["ApplicationAttempt-Id"].clone(),
        state: AppState::parse(&f["State"]),
        am_container_id: non_empty(&f["AMContainer"]),
        am_host: directory.resolve(&f["AM Host"]),
        tracking_url: non_empty(&f["Tracking-URL"]),
        diagnostics: Some(f["Diagnostics"].clone()),
        start_time: None,
    })
}

pub fn parse_container_report(raw: &str, directory: &NodeDirectory) -> Option<ContainerResult> {
    let f = report(raw, &CONTAINER_KEYS)?;
    Some(ContainerResult {
        container_id: f["Container-Id"].clone(),
        start_time: millis_field(&f, "Start-Time"),
        finish_time: millis_field(&f, "Finish-Time"),
        state: f["State"].parse().ok(),
        host: directory.resolve(&f["Host"]),
        log_url: non_empty(&f["LOG-URL"]),
        diagnostics: Some(f["Diagnostics"].clone()),
        ..Default::default()
    })
}
