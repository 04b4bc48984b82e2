// HTTP scenarios for the flow lifecycle endpoints, driven through the
// recording mock executor.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use zflow_core::{
    ExecutorError, FlowId, FlowOutcome, FlowTemplate, FlowValue, Schema, TemplateId, TypedValue,
};
use zflow_engine::MockFlowExecutor;
use zflow_server::flows;
use zflow_storage::{InMemoryKeyValueStore, TemplateStore};

fn test_app() -> (Router, MockFlowExecutor, TemplateStore) {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let templates = TemplateStore::new(kv);
    let executor = MockFlowExecutor::new();
    let app = flows::routes(flows::AppState {
        executor: Arc::new(executor.clone()),
        templates: templates.clone(),
    });
    (app, executor, templates)
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

async fn start_flow(app: &Router, body: Value) -> FlowId {
    let (status, body) = send(app, Method::POST, "/flows", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    FlowId::new(body["flowId"].as_str().expect("flowId in start response"))
}

#[tokio::test]
async fn inline_flow_starts_and_polls_through_to_success() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let flow_id = start_flow(&app, json!({"Flow": flow1.as_json()})).await;

    let started = executor.started();
    assert_eq!(started.len(), 1);
    assert_eq!(started.get(&flow_id), Some(&flow1));

    // No result posted yet.
    let uri = format!("/flows/{flow_id}");
    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Running": {}}));

    // Result arrives on the second poll from here: one more skip tick first.
    executor.arrange_outcome(
        &flow_id,
        FlowOutcome::Succeeded(TypedValue::string("hello")),
        1,
    );

    let (_, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(body, json!({"Running": {}}));

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Succeeded": {"String": "hello"}}));
}

#[tokio::test]
async fn user_level_failures_are_reported_as_failed() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let flow_id = start_flow(&app, json!({"Flow": flow1.as_json()})).await;
    executor.arrange_outcome(&flow_id, FlowOutcome::Failed(TypedValue::string("hello")), 0);

    let (status, body) = send(&app, Method::GET, &format!("/flows/{flow_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"Failed": {"String": "hello"}}));
}

#[tokio::test]
async fn executor_death_is_reported_as_died() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let flow_id = start_flow(&app, json!({"Flow": flow1.as_json()})).await;
    executor.arrange_outcome(
        &flow_id,
        FlowOutcome::Died(ExecutorError::missing_variable("x", "y")),
        0,
    );

    let (status, body) = send(&app, Method::GET, &format!("/flows/{flow_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"Died": {"MissingVariable": {"name": "x", "context": "y"}}})
    );
}

#[tokio::test]
async fn inline_flow_with_parameter_is_bound_before_starting() {
    let (app, executor, _) = test_app();
    let flow2 = FlowValue::input();

    let flow_id = start_flow(
        &app,
        json!({"FlowWithParameter": [flow2.as_json(), "Int", 11]}),
    )
    .await;

    // The persisted flow is the bound one.
    let started = executor.started();
    assert_eq!(
        started.get(&flow_id),
        Some(&FlowValue::input().provide(TypedValue::int(11)))
    );

    executor.arrange_outcome(&flow_id, FlowOutcome::Succeeded(TypedValue::int(1)), 0);
    let (_, body) = send(&app, Method::GET, &format!("/flows/{flow_id}"), None).await;
    assert_eq!(body, json!({"Succeeded": {"Int": 1}}));
}

#[tokio::test]
async fn template_with_parameter_starts_the_bound_flow() {
    let (app, executor, templates) = test_app();
    let flow2 = FlowValue::input();

    templates
        .put(
            &TemplateId::new("test"),
            &FlowTemplate::with_input(flow2.clone(), Schema::Int),
        )
        .await
        .unwrap();

    let flow_id = start_flow(&app, json!({"TemplateWithParameter": ["test", 11]})).await;

    let started = executor.started();
    assert_eq!(started.get(&flow_id), Some(&flow2.provide(TypedValue::int(11))));
}

#[tokio::test]
async fn parameterless_template_starts_its_flow_unchanged() {
    let (app, executor, templates) = test_app();
    let flow = FlowValue::succeed(TypedValue::string("stored"));

    templates
        .put(&TemplateId::new("plain"), &FlowTemplate::new(flow.clone()))
        .await
        .unwrap();

    let flow_id = start_flow(&app, json!({"Template": "plain"})).await;
    assert_eq!(executor.started().get(&flow_id), Some(&flow));
}

#[tokio::test]
async fn unknown_templates_are_not_found() {
    let (app, _, _) = test_app();

    let (status, _) = send(&app, Method::POST, "/flows", Some(json!({"Template": "nope"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::POST,
        "/flows",
        Some(json!({"TemplateWithParameter": ["nope", 1]})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn parameter_mismatches_are_bad_requests() {
    let (app, executor, templates) = test_app();

    templates
        .put(
            &TemplateId::new("typed"),
            &FlowTemplate::with_input(FlowValue::input(), Schema::Int),
        )
        .await
        .unwrap();
    templates
        .put(
            &TemplateId::new("plain"),
            &FlowTemplate::new(FlowValue::succeed(TypedValue::unit())),
        )
        .await
        .unwrap();

    // Parameterless start of a template that requires a parameter.
    let (status, _) = send(&app, Method::POST, "/flows", Some(json!({"Template": "typed"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Parameter supplied to a parameterless template.
    let (status, _) = send(
        &app,
        Method::POST,
        "/flows",
        Some(json!({"TemplateWithParameter": ["plain", 1]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Parameter that does not decode under the declared schema.
    let (status, _) = send(
        &app,
        Method::POST,
        "/flows",
        Some(json!({"TemplateWithParameter": ["typed", "not an int"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(executor.started().is_empty());
}

#[tokio::test]
async fn malformed_start_bodies_are_bad_requests() {
    let (app, executor, _) = test_app();

    let (status, _) = send(
        &app,
        Method::POST,
        "/flows",
        Some(json!({"NotAVariant": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(executor.started().is_empty());
}

#[tokio::test]
async fn delete_rejects_running_flows_and_ignores_unknown_ones() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let flow_id = start_flow(&app, json!({"Flow": flow1.as_json()})).await;

    // Still running.
    let (status, _) = send(&app, Method::DELETE, &format!("/flows/{flow_id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown ids delete idempotently.
    let (status, _) = send(&app, Method::DELETE, "/flows/does-not-exist", None).await;
    assert_eq!(status, StatusCode::OK);

    // Finished flows can be deleted.
    executor.arrange_outcome(&flow_id, FlowOutcome::Succeeded(TypedValue::unit()), 0);
    send(&app, Method::GET, &format!("/flows/{flow_id}"), None).await;
    let (status, _) = send(&app, Method::DELETE, &format!("/flows/{flow_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(executor.started().is_empty());
}

#[tokio::test]
async fn control_verbs_reach_the_executor_exactly_once() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let flow_id = start_flow(&app, json!({"Flow": flow1.as_json()})).await;

    for verb in ["pause", "resume", "abort"] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/flows/{flow_id}/{verb}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(executor.pause_requests(), vec![flow_id.clone()]);
    assert_eq!(executor.resume_requests(), vec![flow_id.clone()]);
    assert_eq!(executor.abort_requests(), vec![flow_id]);
}

#[tokio::test]
async fn get_all_reports_every_flow_with_its_status() {
    let (app, executor, _) = test_app();
    let flow1 = FlowValue::succeed(TypedValue::int(11));

    let running = start_flow(&app, json!({"Flow": flow1.as_json()})).await;
    let finished = start_flow(&app, json!({"Flow": flow1.as_json()})).await;

    executor.arrange_outcome(&finished, FlowOutcome::Succeeded(TypedValue::unit()), 0);
    send(&app, Method::GET, &format!("/flows/{finished}"), None).await;

    let (status, body) = send(&app, Method::GET, "/flows", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flows"][running.as_str()], json!("Running"));
    assert_eq!(body["flows"][finished.as_str()], json!("Done"));
    assert_eq!(body["flows"].as_object().unwrap().len(), 2);
}
