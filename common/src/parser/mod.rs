//! Parsers de la salida del cluster.
//!
//! Dos implementaciones de [`ClusterMonitor`]:
//! - [`CmdParser`]: salida de texto de la CLI `yarn`;
//! - [`RestParser`]: REST del resource manager y node managers, reconciliado
//!   con el timeline server.
//!
//! Ambas devuelven los mismos registros canónicos de [`crate::results`].

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use crate::app::AppState;
use crate::error::ClusterResult;
use crate::results::{ApplicationResult, AttemptResult, ContainerResult, NodeResult};

pub mod json;
pub mod rest_model;
pub mod text;

pub use json::RestParser;
pub use text::CmdParser;

/// Las ocho consultas de monitoreo.
///
/// Salida vacía de una fuente = "sin datos" (lista vacía / `None`), no error.
/// Los errores de transporte y de pool se propagan.
pub trait ClusterMonitor: Send + Sync {
    fn list_nodes(&self) -> ClusterResult<Vec<NodeResult>>;
    fn node_details(&self, node_id: &str) -> ClusterResult<Option<NodeResult>>;

    fn list_applications(&self, states: AppState) -> ClusterResult<Vec<ApplicationResult>>;
    fn application_details(&self, app_id: &str) -> ClusterResult<Option<ApplicationResult>>;

    fn list_attempts(&self, app_id: &str) -> ClusterResult<Vec<AttemptResult>>;
    fn attempt_details(&self, attempt_id: &str) -> ClusterResult<Option<AttemptResult>>;

    fn list_containers(&self, attempt_id: &str) -> ClusterResult<Vec<ContainerResult>>;
    fn container_details(&self, container_id: &str) -> ClusterResult<Option<ContainerResult>>;
}

/// Epoch en milisegundos; YARN usa 0 para "todavía no".
pub fn millis_to_time(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}

/// `Tue Jan 09 10:06:19 +0000 2018` (listas de containers). `N/A` => `None`.
pub fn parse_cli_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("N/A") {
        return None;
    }
    DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// `Tue 09/Jan/18 10:06:18:905UTC` (Last-Health-Update del node report).
pub fn parse_health_time(raw: &str) -> Option<DateTime<Utc>> {
    let (base, millis) = raw.trim().rsplit_once(':')?;
    let naive = NaiveDateTime::parse_from_str(base, "%a %d/%b/%y %H:%M:%S").ok()?;
    let millis = leading_int(millis).unwrap_or(0);
    Some(Utc.from_utc_datetime(&naive) + Duration::milliseconds(millis))
}

/// Entero al principio del texto: `2048MB` -> 2048, `1 vcores` -> 1.
pub fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let end = raw
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}

/// `100%` / `45.5%` / `45.5`
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

/// Texto vacío o `null` de la fuente => `None`.
pub(crate) fn non_empty(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("N/A") {
        None
    } else {
        Some(raw.to_string())
    }
}
