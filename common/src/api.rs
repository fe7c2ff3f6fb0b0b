//! Cuerpos de request / response de la API HTTP del controlador.

use serde::{Deserialize, Serialize};

use crate::commands::SubmitOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Comando completo, p. ej. `hadoop jar ... wordcount in out`
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub app_id: Option<String>,
    /// Salida cruda cuando no se pudo extraer el id
    pub raw_output: Option<String>,
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Submitted(id) => Self {
                app_id: Some(id),
                raw_output: None,
            },
            SubmitOutcome::Ambiguous(out) => Self {
                app_id: None,
                raw_output: Some(out),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub target: String,
    pub action: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_response_desde_outcome() {
        let ok = SubmitResponse::from(SubmitOutcome::Submitted("application_1_0001".into()));
        assert_eq!(ok.app_id.as_deref(), Some("application_1_0001"));
        assert!(ok.raw_output.is_none());

        let raw = SubmitResponse::from(SubmitOutcome::Ambiguous("sin id".into()));
        assert!(raw.app_id.is_none());
        let json = serde_json::to_value(&raw).unwrap();
        assert_eq!(json["raw_output"], "sin id");
    }
}
