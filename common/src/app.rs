use std::{fmt, str::FromStr};

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attempt::AttemptRef;
use crate::node::opt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AppRef(pub usize);

bitflags! {
    /// Estado de una aplicación o de un attempt.
    ///
    /// `NOT_STARTED` es interno del modelo: el slot está libre.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AppState: u16 {
        const NOT_STARTED = 1 << 0;
        const NEW = 1 << 1;
        const NEW_SAVING = 1 << 2;
        const SUBMITTED = 1 << 3;
        const ACCEPTED = 1 << 4;
        const RUNNING = 1 << 5;
        const FINISHED = 1 << 6;
        const FAILED = 1 << 7;
        const KILLED = 1 << 8;

        const TERMINAL = Self::FINISHED.bits() | Self::FAILED.bits() | Self::KILLED.bits();
    }
}

impl AppState {
    /// Todos los estados que YARN conoce (sin el marcador interno).
    pub fn all_yarn() -> Self {
        Self::all() - Self::NOT_STARTED
    }

    pub fn is_terminal(self) -> bool {
        self.intersects(Self::TERMINAL)
    }

    /// Interpreta un estado de aplicación o de attempt tal como lo imprime YARN.
    ///
    /// Los estados intermedios de los attempts se pliegan al más cercano.
    pub fn parse(s: &str) -> Option<Self> {
        let state = match s.trim().to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Self::NOT_STARTED,
            "NEW" => Self::NEW,
            "NEW_SAVING" => Self::NEW_SAVING,
            "SUBMITTED" => Self::SUBMITTED,
            "ACCEPTED" | "SCHEDULED" | "ALLOCATED_SAVING" | "ALLOCATED"
            | "LAUNCHED_UNMANAGED_SAVING" | "LAUNCHED" => Self::ACCEPTED,
            "RUNNING" => Self::RUNNING,
            "FINISHED" | "FINAL_SAVING" | "FINISHING" => Self::FINISHED,
            "FAILED" => Self::FAILED,
            "KILLED" => Self::KILLED,
            _ => return None,
        };
        Some(state)
    }

    /// Nombres para filtrar en la CLI / REST (`RUNNING,FINISHED`).
    pub fn yarn_names(self) -> Vec<&'static str> {
        let mut out = Vec::new();
        for (flag, name) in [
            (Self::NEW, "NEW"),
            (Self::NEW_SAVING, "NEW_SAVING"),
            (Self::SUBMITTED, "SUBMITTED"),
            (Self::ACCEPTED, "ACCEPTED"),
            (Self::RUNNING, "RUNNING"),
            (Self::FINISHED, "FINISHED"),
            (Self::FAILED, "FAILED"),
            (Self::KILLED, "KILLED"),
        ] {
            if self.contains(flag) {
                out.push(name);
            }
        }
        out
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::NOT_STARTED
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.contains(Self::NOT_STARTED) && self.bits().count_ones() == 1 {
            return f.write_str("NOT_STARTED");
        }
        f.write_str(&self.yarn_names().join("|"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    #[default]
    Undefined,
    Succeeded,
    Failed,
    Killed,
}

impl FromStr for FinalStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNDEFINED" => Ok(FinalStatus::Undefined),
            "SUCCEEDED" => Ok(FinalStatus::Succeeded),
            "FAILED" => Ok(FinalStatus::Failed),
            "KILLED" => Ok(FinalStatus::Killed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FinalStatus::Undefined => "UNDEFINED",
            FinalStatus::Succeeded => "SUCCEEDED",
            FinalStatus::Failed => "FAILED",
            FinalStatus::Killed => "KILLED",
        };
        f.write_str(s)
    }
}

/// Una aplicación enviada al cluster. Un `app_id` vacío marca un slot libre.
#[derive(Debug, Clone, Default)]
pub struct Application {
    pub app_id: String,
    pub name: String,
    pub app_type: String,
    pub user: String,
    pub queue: String,

    pub state: AppState,
    pub final_status: FinalStatus,
    /// 0..=100
    pub progress: f64,

    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub tracking_url: String,
    pub diagnostics: String,

    /// Host del ApplicationMaster; se resuelve a un nodo cuando se necesita
    pub am_host_id: String,

    // consumo de recursos
    pub allocated_mb: i64,
    pub allocated_vcores: i64,
    pub preempted_mb: i64,
    pub preempted_vcores: i64,
    pub mb_seconds: i64,
    pub vcore_seconds: i64,

    pub attempts: Vec<AttemptRef>,
}

impl Application {
    pub fn is_free(&self) -> bool {
        self.app_id.is_empty()
    }

    /// Mientras `final_status` sea UNDEFINED la app todavía se puede matar,
    /// aunque el estado ya diga FINISHED/FAILED/KILLED.
    pub fn is_killable(&self) -> bool {
        !self.is_free() && self.final_status == FinalStatus::Undefined
    }
}

impl fmt::Display for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "app {} '{}' state={} final={} progress={:.0}% am_host={} attempts={} mem_s={} vcore_s={}",
            self.app_id,
            self.name,
            self.state,
            self.final_status,
            self.progress,
            if self.am_host_id.is_empty() { "-" } else { &self.am_host_id },
            self.attempts.len(),
            self.mb_seconds,
            self.vcore_seconds,
        )?;
        if let Some(start) = self.start_time {
            write!(f, " start={}", start.to_rfc3339())?;
        }
        write!(f, " finish={}", opt(self.finish_time.map(|t| t.to_rfc3339())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pliega_estados_de_attempt() {
        assert_eq!(AppState::parse("FINISHED"), Some(AppState::FINISHED));
        assert_eq!(AppState::parse("launched"), Some(AppState::ACCEPTED));
        assert_eq!(AppState::parse("FINAL_SAVING"), Some(AppState::FINISHED));
        assert_eq!(AppState::parse("cualquiera"), None);
    }

    #[test]
    fn all_yarn_no_incluye_not_started() {
        let all = AppState::all_yarn();
        assert!(!all.contains(AppState::NOT_STARTED));
        assert_eq!(all.yarn_names().len(), 8);
    }

    #[test]
    fn display_del_estado() {
        assert_eq!(AppState::default().to_string(), "NOT_STARTED");
        assert_eq!((AppState::RUNNING | AppState::FAILED).to_string(), "RUNNING|FAILED");
    }

    #[test]
    fn app_terminal_con_final_undefined_sigue_siendo_matable() {
        let app = Application {
            app_id: "application_1515488762656_0001".to_string(),
            state: AppState::FINISHED,
            final_status: FinalStatus::Undefined,
            ..Default::default()
        };
        assert!(app.state.is_terminal());
        assert!(app.is_killable());

        let done = Application {
            final_status: FinalStatus::Succeeded,
            ..app
        };
        assert!(!done.is_killable());
        assert!(!Application::default().is_killable());
    }
}
