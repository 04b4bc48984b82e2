// HTTP scenarios for the template registry endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use zflow_core::{FlowValue, TypedValue};
use zflow_server::templates;
use zflow_storage::{InMemoryKeyValueStore, TemplateStore};

fn test_app() -> Router {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    templates::routes(templates::AppState {
        templates: TemplateStore::new(kv),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn typed_template() -> Value {
    json!({
        "flow": FlowValue::input().as_json(),
        "input_schema": "Int",
    })
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let app = test_app();

    let (status, _) = send(
        &app,
        Method::PUT,
        "/templates/test",
        Some(typed_template()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/templates/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, typed_template());
}

#[tokio::test]
async fn get_of_unknown_template_is_not_found() {
    let app = test_app();
    let (status, _) = send(&app, Method::GET, "/templates/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_enumerates_stored_templates() {
    let app = test_app();

    let plain = json!({ "flow": FlowValue::succeed(TypedValue::int(1)).as_json() });
    send(&app, Method::PUT, "/templates/a", Some(typed_template())).await;
    send(&app, Method::PUT, "/templates/b", Some(plain.clone())).await;

    let (status, body) = send(&app, Method::GET, "/templates", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["templates"]["a"], typed_template());
    assert_eq!(body["templates"]["b"], plain);
    assert_eq!(body["templates"].as_object().unwrap().len(), 2);
}

#[tokio::test]
async fn delete_removes_the_template_idempotently() {
    let app = test_app();

    send(&app, Method::PUT, "/templates/gone", Some(typed_template())).await;

    let (status, _) = send(&app, Method::DELETE, "/templates/gone", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/templates/gone", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting again (or an id that never existed) still succeeds.
    let (status, _) = send(&app, Method::DELETE, "/templates/gone", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_template_bodies_are_bad_requests() {
    let app = test_app();

    let (status, _) = send(
        &app,
        Method::PUT,
        "/templates/bad",
        Some(json!({"input_schema": "Int"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::GET, "/templates/bad", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
