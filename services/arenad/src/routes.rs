//! HTTP routes over the orchestrator.
//!
//! Every failure is answered with a `{status, msg}` body.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use arena_common::StatusBody;
use arena_orchestrator::domain::validate_name;
use arena_orchestrator::{CreateSpec, LifecycleError};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/servers", get(list_servers).post(create_server))
        .route("/api/servers/{name}", delete(destroy_server))
        .route("/api/servers/{name}/start", post(start_server))
        .route("/api/servers/{name}/stop", post(stop_server))
        .route("/api/servers/{name}/settings", post(apply_settings))
        .route("/api/maps", get(list_maps))
        .route("/api/ports", get(list_ports))
        .with_state(state)
}

/// Lifecycle error rendered as a status body.
struct ApiError(LifecycleError);

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = StatusBody {
            status: self.0.response_status(),
            msg: self.0.to_string(),
        };
        (code, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct OwnerQuery {
    owner: Option<String>,
}

async fn list_servers(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> ApiResult<Response> {
    let servers = state
        .orchestrator
        .list_servers(query.owner.as_deref())
        .await?;
    Ok(Json(servers).into_response())
}

#[derive(Debug, Deserialize)]
struct CreateRequest {
    #[serde(flatten)]
    spec: CreateSpec,
    owner: String,
}

async fn create_server(
    State(state): State<AppState>,
    Json(request): Json<CreateRequest>,
) -> ApiResult<Response> {
    let created = state
        .orchestrator
        .create(&request.spec, &request.owner)
        .await?;
    let instance = &created.instance;
    let body = json!({
        "name": instance.name,
        "port": instance.port,
        "owner": instance.owner,
        "static": instance.is_static,
        "map": instance.current_map,
        "created_at": instance.created_at,
        "server": created.snapshot,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn start_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let snapshot = state.orchestrator.start(&name).await?;
    Ok(Json(snapshot).into_response())
}

async fn stop_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let snapshot = state.orchestrator.stop(&name).await?;
    Ok(Json(snapshot).into_response())
}

async fn destroy_server(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if let Err(e) = validate_name(&name) {
        return ApiError(e).into_response();
    }
    if state.orchestrator.destroy(&name).await {
        Json(StatusBody::success(format!("Server '{name}' removed"))).into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusBody::error(format!("Server '{name}' could not be removed"))),
        )
            .into_response()
    }
}

async fn apply_settings(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(changes): Json<Map<String, Value>>,
) -> ApiResult<Response> {
    let report = state.orchestrator.execute_settings(&name, &changes).await?;
    Ok(Json(report).into_response())
}

async fn list_maps(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.orchestrator.maps().await?).into_response())
}

async fn list_ports(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(Json(state.orchestrator.ports().await?).into_response())
}
