use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use common::api::{CommandResponse, ErrorResponse, SubmitRequest, SubmitResponse};
use common::ids::IdLevel;
use common::snapshot::{self, AppView, NodeView};
use common::{ClusterError, TickReport};

use crate::state::{lock, AppState};

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/nodes", get(list_nodes))
        .route("/api/v1/nodes/:name/:action", post(node_command))
        .route("/api/v1/apps", get(list_apps).post(submit_app))
        .route("/api/v1/apps/:id", get(get_app))
        .route("/api/v1/apps/:id/kill", post(kill_app))
        .route("/api/v1/report", get(last_report))
        .route("/api/v1/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn cluster_error(e: ClusterError) -> ApiError {
    let status = match &e {
        ClusterError::Transport(_) => StatusCode::BAD_GATEWAY,
        ClusterError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,
        ClusterError::Id(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!("error atendiendo request: {}", e);
    api_error(status, e.to_string())
}

/// Corre una operación bloqueante (pool + ssh) fuera del runtime async.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ClusterError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(cluster_error(e)),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("join error: {e}"),
        )),
    }
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeView>> {
    Json(snapshot::nodes(&state.tree()))
}

async fn list_apps(State(state): State<AppState>) -> Json<Vec<AppView>> {
    Json(snapshot::apps(&state.tree()))
}

async fn get_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AppView>, StatusCode> {
    snapshot::app(&state.tree(), &id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn submit_app(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if req.command.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "comando vacío"));
    }
    let submitter = state.submitter.clone();
    let outcome = blocking(move || submitter.submit_application(&req.command)).await?;
    Ok(Json(outcome.into()))
}

async fn kill_app(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    match IdLevel::of(&id) {
        Ok(IdLevel::Application) => {}
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("{id} no es un id de aplicación"),
            ))
        }
    }

    let faults = state.faults.clone();
    let target = id.clone();
    let ok = blocking(move || faults.kill_application(&target)).await?;
    info!("kill de {}: {}", id, ok);
    Ok(Json(CommandResponse {
        target: id,
        action: "kill".to_string(),
        ok,
    }))
}

async fn node_command(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
) -> Result<Json<CommandResponse>, ApiError> {
    if state.tree().node_by_name(&name).is_none() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("nodo desconocido: {name}"),
        ));
    }

    let faults = state.faults.clone();
    let node = name.clone();
    let ok = match action.as_str() {
        "start" => blocking(move || faults.start_node(&node)).await?,
        "stop" => blocking(move || faults.stop_node(&node)).await?,
        "start-network" => blocking(move || faults.start_node_network(&node)).await?,
        "stop-network" => blocking(move || faults.stop_node_network(&node)).await?,
        other => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("acción desconocida: {other}"),
            ))
        }
    };

    info!("{} de {}: {}", action, name, ok);
    Ok(Json(CommandResponse {
        target: name,
        action,
        ok,
    }))
}

async fn last_report(State(state): State<AppState>) -> Result<Json<TickReport>, StatusCode> {
    lock(&state.last_report)
        .clone()
        .map(Json)
        .ok_or(StatusCode::NO_CONTENT)
}

// espera a que termine el tick en curso
async fn reset(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let controller = state.controller.clone();
    blocking(move || {
        lock(&controller).reset();
        Ok(())
    })
    .await?;
    *lock(&state.last_report) = None;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use common::commands::{FaultCommands, Submitter};
    use common::constraints::ConstraintSet;
    use common::directory::NodeDirectory;
    use common::parser::CmdParser;
    use common::results::ApplicationResult;
    use common::{ClusterConfig, ConnectionPool, Controller, RemoteExecutor, StateTree, TransportError};

    use super::*;

    fn pool(role: &str, out: &'static str) -> Arc<ConnectionPool> {
        let exec = move |_: &str| -> Result<String, TransportError> { Ok(out.to_string()) };
        let executors: Vec<Box<dyn RemoteExecutor>> = vec![Box::new(exec)];
        Arc::new(ConnectionPool::with_retries(
            role,
            executors,
            0,
            std::time::Duration::from_millis(1),
        ))
    }

    fn test_state(fault_output: &'static str, submit_output: &'static str) -> AppState {
        let mut config = ClusterConfig::default();
        config.nodes = vec!["compute-1".into(), "compute-2".into()];
        let config = Arc::new(config);
        let directory = Arc::new(NodeDirectory::new(&config.nodes));
        let tree = Arc::new(Mutex::new(StateTree::new(&config, directory.clone())));

        let monitor = CmdParser::new(&config, pool("monitoring", ""), directory);
        let controller = Controller::new(
            config.clone(),
            tree,
            Box::new(monitor),
            FaultCommands::new(&config, pool("faulting", fault_output)),
            ConstraintSet::defaults(),
        );
        AppState::new(
            config.clone(),
            controller,
            FaultCommands::new(&config, pool("faulting", fault_output)),
            Submitter::new(pool("submission", submit_output)),
        )
    }

    async fn send(state: &AppState, method: &str, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
        let response = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn lista_los_nodos_configurados() {
        let state = test_state("", "");
        let (status, json) = send(&state, "GET", "/api/v1/nodes", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["name"], "compute-1");
    }

    #[tokio::test]
    async fn app_desconocida_es_404() {
        let state = test_state("", "");
        let (status, _) = send(&state, "GET", "/api/v1/apps/application_1_0001", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        {
            let mut tree = state.tree();
            let r = tree.claim_app("application_1_0001").unwrap();
            tree.apply_app(
                r,
                &ApplicationResult {
                    name: Some("wordcount".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let (status, json) = send(&state, "GET", "/api/v1/apps/application_1_0001", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "wordcount");
    }

    #[tokio::test]
    async fn comando_de_nodo() {
        let state = test_state("compute-1 stopped", "");
        let (status, json) = send(&state, "POST", "/api/v1/nodes/compute-1/stop", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["action"], "stop");

        let (status, _) = send(&state, "POST", "/api/v1/nodes/compute-9/stop", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&state, "POST", "/api/v1/nodes/compute-1/reboot", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn submit_devuelve_el_id() {
        let state = test_state("", "Submitted application application_1515488762656_0007");
        let body = Body::from(r#"{"command":"hadoop jar wordcount.jar in out"}"#);
        let (status, json) = send(&state, "POST", "/api/v1/apps", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["app_id"], "application_1515488762656_0007");
    }

    #[tokio::test]
    async fn kill_valida_el_id() {
        let state = test_state("Killing application application_1_0001", "");
        let (status, _) = send(&state, "POST", "/api/v1/apps/container_1_0001_01_000001/kill", Body::empty()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(&state, "POST", "/api/v1/apps/application_1_0001/kill", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn reset_vacia_el_arbol() {
        let state = test_state("", "");
        state.tree().claim_app("application_1_0001").unwrap();
        let (status, _) = send(&state, "POST", "/api/v1/reset", Body::empty()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.tree().apps().count(), 0);

        let (status, _) = send(&state, "GET", "/api/v1/report", Body::empty()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
}
