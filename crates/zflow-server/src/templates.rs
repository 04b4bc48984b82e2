// Template registry HTTP routes

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use zflow_core::{FlowTemplate, FlowValue, Schema, TemplateId};
use zflow_storage::TemplateStore;

/// App state
#[derive(Clone)]
pub struct AppState {
    pub templates: TemplateStore,
}

/// Wire form of a stored template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TemplateBody {
    #[schema(value_type = Object)]
    pub flow: FlowValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub input_schema: Option<Schema>,
}

impl From<FlowTemplate> for TemplateBody {
    fn from(template: FlowTemplate) -> Self {
        Self {
            flow: template.flow,
            input_schema: template.input_schema,
        }
    }
}

impl From<TemplateBody> for FlowTemplate {
    fn from(body: TemplateBody) -> Self {
        Self {
            flow: body.flow,
            input_schema: body.input_schema,
        }
    }
}

/// Response listing every stored template
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GetTemplatesResponse {
    #[schema(value_type = Object)]
    pub templates: BTreeMap<String, TemplateBody>,
}

/// Create template routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/templates", get(list_templates))
        .route(
            "/templates/:template_id",
            get(get_template)
                .put(put_template)
                .delete(delete_template),
        )
        .with_state(state)
}

/// GET /templates - List every stored template
#[utoipa::path(
    get,
    path = "/templates",
    responses(
        (status = 200, description = "Map of template id to template", body = GetTemplatesResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "templates"
)]
pub async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<GetTemplatesResponse>, StatusCode> {
    let mut templates = BTreeMap::new();
    let mut all = state.templates.all();
    while let Some((id, template)) = all.try_next().await.map_err(|e| {
        tracing::error!("Failed to list templates: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })? {
        templates.insert(id.to_string(), template.into());
    }
    Ok(Json(GetTemplatesResponse { templates }))
}

/// GET /templates/:template_id
#[utoipa::path(
    get,
    path = "/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template found", body = TemplateBody),
        (status = 404, description = "Template not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "templates"
)]
pub async fn get_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<Json<TemplateBody>, StatusCode> {
    let template = state
        .templates
        .get(&TemplateId::new(template_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to get template: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(template.into()))
}

/// PUT /templates/:template_id - Store or replace a template
#[utoipa::path(
    put,
    path = "/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template ID")),
    request_body = TemplateBody,
    responses(
        (status = 200, description = "Template stored"),
        (status = 400, description = "Malformed template"),
        (status = 500, description = "Internal server error")
    ),
    tag = "templates"
)]
pub async fn put_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    Json(body): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    let body: TemplateBody = serde_json::from_value(body).map_err(|e| {
        tracing::warn!("Malformed template body: {}", e);
        StatusCode::BAD_REQUEST
    })?;

    state
        .templates
        .put(&TemplateId::new(template_id), &body.into())
        .await
        .map_err(|e| {
            tracing::error!("Failed to store template: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}

/// DELETE /templates/:template_id
#[utoipa::path(
    delete,
    path = "/templates/{template_id}",
    params(("template_id" = String, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Template removed (or id unknown)"),
        (status = 500, description = "Internal server error")
    ),
    tag = "templates"
)]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    state
        .templates
        .delete(&TemplateId::new(template_id))
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete template: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(StatusCode::OK)
}
