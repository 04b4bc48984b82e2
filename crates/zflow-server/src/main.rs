// zflow API server
// Flows begin when started; scheduling by time is out of scope.

use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use zflow_engine::{FlowExecutor, PersistentFlowExecutor};
use zflow_server::config::{BackendConfig, Config};
use zflow_server::{flows, templates};
use zflow_storage::{
    InMemoryKeyValueStore, KeyValueStore, PostgresKeyValueStore, TemplateStore,
};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    backend: String,
}

/// State for health endpoint
#[derive(Clone)]
struct HealthState {
    backend: String,
}

async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.backend.clone(),
    })
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        flows::start_flow,
        flows::get_all_flows,
        flows::poll_flow,
        flows::delete_flow,
        flows::pause_flow,
        flows::resume_flow,
        flows::abort_flow,
        templates::list_templates,
        templates::get_template,
        templates::put_template,
        templates::delete_template,
    ),
    components(
        schemas(
            flows::StartRequest,
            flows::StartResponse,
            flows::GetAllResponse,
            templates::TemplateBody,
            templates::GetTemplatesResponse,
        )
    ),
    tags(
        (name = "flows", description = "Flow lifecycle endpoints"),
        (name = "templates", description = "Flow template registry endpoints")
    ),
    info(
        title = "zflow API",
        version = "0.1.0",
        description = "Durable workflow execution service",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zflow_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("zflow-server starting...");

    let config = Config::from_env().context("Failed to load configuration")?;

    // Build the storage backend
    let kv: Arc<dyn KeyValueStore> = match &config.backend {
        BackendConfig::InMemory => {
            tracing::info!("Using in-memory storage backend");
            Arc::new(InMemoryKeyValueStore::new())
        }
        BackendConfig::Postgres { url } => {
            let pool = sqlx::PgPool::connect(url)
                .await
                .context("Failed to connect to database")?;
            let store = PostgresKeyValueStore::new(pool);
            store
                .init_schema()
                .await
                .context("Failed to initialize storage schema")?;
            tracing::info!("Connected to postgres storage backend");
            Arc::new(store)
        }
    };

    let executor: Arc<dyn FlowExecutor> = Arc::new(PersistentFlowExecutor::new(kv.clone()));

    // Re-schedule persisted, non-terminal flows before accepting traffic
    executor
        .restart_all()
        .await
        .context("Failed to restart persisted flows")?;

    let template_store = TemplateStore::new(kv);

    // Create module-specific states
    let flows_state = flows::AppState {
        executor,
        templates: template_store.clone(),
    };
    let templates_state = templates::AppState {
        templates: template_store,
    };
    let health_state = HealthState {
        backend: config.backend.name().to_string(),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health).with_state(health_state))
        .merge(flows::routes(flows_state))
        .merge(templates::routes(templates_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
