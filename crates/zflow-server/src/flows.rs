// Flow lifecycle HTTP routes

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use zflow_core::{
    ExecutorError, FlowId, FlowStatus, FlowTemplate, FlowValue, PollResponse, Schema, TemplateId,
    TypedValue,
};
use zflow_engine::FlowExecutor;
use zflow_storage::TemplateStore;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn FlowExecutor>,
    pub templates: TemplateStore,
}

/// Request to start a flow
///
/// Externally tagged: inline flows carry the flow value itself, template
/// variants carry the template id. Parameterized variants additionally carry
/// the raw parameter JSON, decoded under the declared input schema before
/// being bound into the flow.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub enum StartRequest {
    /// Inline flow without a parameter
    Flow(#[schema(value_type = Object)] FlowValue),

    /// Inline flow, input schema, and the parameter to bind
    FlowWithParameter(
        #[schema(value_type = Object)] FlowValue,
        #[schema(value_type = Object)] Schema,
        #[schema(value_type = Object)] Value,
    ),

    /// Start a stored template; its input schema must be absent
    Template(String),

    /// Start a stored template binding a parameter; its input schema must be
    /// present
    TemplateWithParameter(String, #[schema(value_type = Object)] Value),
}

/// Response to a successful start
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartResponse {
    #[serde(rename = "flowId")]
    #[schema(value_type = String)]
    pub flow_id: FlowId,
}

/// Response listing every known flow with its status
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GetAllResponse {
    #[schema(value_type = Object)]
    pub flows: BTreeMap<String, FlowStatus>,
}

/// Create flow routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/flows", post(start_flow).get(get_all_flows))
        .route("/flows/:flow_id", get(poll_flow).delete(delete_flow))
        .route("/flows/:flow_id/pause", post(pause_flow))
        .route("/flows/:flow_id/resume", post(resume_flow))
        .route("/flows/:flow_id/abort", post(abort_flow))
        .with_state(state)
}

/// POST /flows - Start a flow from an inline definition or a template
#[utoipa::path(
    post,
    path = "/flows",
    request_body = StartRequest,
    responses(
        (status = 200, description = "Flow started", body = StartResponse),
        (status = 400, description = "Malformed request or parameter mismatch"),
        (status = 404, description = "Unknown template"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn start_flow(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<StartResponse>, StatusCode> {
    let request: StartRequest = serde_json::from_value(body).map_err(|e| {
        tracing::warn!("Malformed start request: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    let flow = resolve_flow(&state, request).await?;
    let flow_id = FlowId::generate();

    state.executor.start(&flow_id, flow).await.map_err(|e| {
        tracing::error!("Failed to start flow: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    tracing::info!(flow_id = %flow_id, "flow started");

    Ok(Json(StartResponse { flow_id }))
}

/// Resolve a start request to the concrete flow value to execute.
async fn resolve_flow(state: &AppState, request: StartRequest) -> Result<FlowValue, StatusCode> {
    match request {
        StartRequest::Flow(flow) => Ok(flow),
        StartRequest::FlowWithParameter(flow, schema, parameter) => {
            let value = decode_parameter(&schema, &parameter)?;
            Ok(flow.provide(value))
        }
        StartRequest::Template(id) => {
            let template = load_template(state, &id).await?;
            if template.input_schema.is_some() {
                tracing::warn!(template_id = %id, "template requires a parameter");
                return Err(StatusCode::BAD_REQUEST);
            }
            Ok(template.flow)
        }
        StartRequest::TemplateWithParameter(id, parameter) => {
            let template = load_template(state, &id).await?;
            let Some(schema) = template.input_schema else {
                tracing::warn!(template_id = %id, "template does not take a parameter");
                return Err(StatusCode::BAD_REQUEST);
            };
            let value = decode_parameter(&schema, &parameter)?;
            Ok(template.flow.provide(value))
        }
    }
}

fn decode_parameter(schema: &Schema, parameter: &Value) -> Result<TypedValue, StatusCode> {
    TypedValue::from_json(schema, parameter).map_err(|e| {
        tracing::warn!("Failed to decode start parameter: {}", e);
        StatusCode::BAD_REQUEST
    })
}

async fn load_template(state: &AppState, id: &str) -> Result<FlowTemplate, StatusCode> {
    state
        .templates
        .get(&TemplateId::new(id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to load template: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /flows - List every known flow with its status
#[utoipa::path(
    get,
    path = "/flows",
    responses(
        (status = 200, description = "Map of flow id to status", body = GetAllResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn get_all_flows(
    State(state): State<AppState>,
) -> Result<Json<GetAllResponse>, StatusCode> {
    let mut flows = BTreeMap::new();
    let mut listing = state.executor.get_all();
    while let Some((flow_id, status)) = listing.try_next().await.map_err(|e| {
        tracing::error!("Failed to list flows: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })? {
        flows.insert(flow_id.to_string(), status);
    }
    Ok(Json(GetAllResponse { flows }))
}

/// GET /flows/:flow_id - Poll a flow's result
#[utoipa::path(
    get,
    path = "/flows/{flow_id}",
    params(("flow_id" = String, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Current poll outcome"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn poll_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let outcome = state
        .executor
        .poll(&FlowId::new(flow_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to poll flow: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let body = PollResponse::from_poll(outcome).to_json().map_err(|e| {
        tracing::error!("Failed to encode poll outcome: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(body))
}

/// DELETE /flows/:flow_id - Reclaim a finished flow's durable state
#[utoipa::path(
    delete,
    path = "/flows/{flow_id}",
    params(("flow_id" = String, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Flow state removed (or id unknown)"),
        (status = 400, description = "Flow is still running"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn delete_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match state.executor.delete(&FlowId::new(flow_id)).await {
        Ok(()) => Ok(StatusCode::OK),
        // The one user error: deleting a flow that is still live.
        Err(ExecutorError::InvalidOperationArguments { .. }) => Err(StatusCode::BAD_REQUEST),
        Err(e) => {
            tracing::error!("Failed to delete flow: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /flows/:flow_id/pause
#[utoipa::path(
    post,
    path = "/flows/{flow_id}/pause",
    params(("flow_id" = String, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Pause requested"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn pause_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .executor
        .pause(&FlowId::new(flow_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to pause flow: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}

/// POST /flows/:flow_id/resume
#[utoipa::path(
    post,
    path = "/flows/{flow_id}/resume",
    params(("flow_id" = String, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Resume requested"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn resume_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .executor
        .resume(&FlowId::new(flow_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to resume flow: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}

/// POST /flows/:flow_id/abort
#[utoipa::path(
    post,
    path = "/flows/{flow_id}/abort",
    params(("flow_id" = String, Path, description = "Flow ID")),
    responses(
        (status = 200, description = "Abort requested"),
        (status = 500, description = "Internal server error")
    ),
    tag = "flows"
)]
pub async fn abort_flow(
    State(state): State<AppState>,
    Path(flow_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .executor
        .abort(&FlowId::new(flow_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to abort flow: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}
