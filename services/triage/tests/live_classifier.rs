//! Live classifier against a local chat-completions stub.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use pawtrack_triage::{
    ClassifierConfig, ClassifierError, ConditionTag, Coordinates, ImageClassifier, ImagePayload,
    LiveClassifier, TriageEngine,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct Stub {
    status: StatusCode,
    body: Value,
    last_request: Arc<Mutex<Option<Value>>>,
}

async fn completions(State(stub): State<Stub>, Json(request): Json<Value>) -> (StatusCode, Json<Value>) {
    *stub.last_request.lock().unwrap() = Some(request);
    (stub.status, Json(stub.body.clone()))
}

async fn spawn_stub(status: StatusCode, body: Value) -> (String, Arc<Mutex<Option<Value>>>) {
    let last_request = Arc::new(Mutex::new(None));
    let stub = Stub {
        status,
        body,
        last_request: last_request.clone(),
    };

    let router = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/v1/chat/completions", addr), last_request)
}

fn config_for(endpoint: String) -> ClassifierConfig {
    ClassifierConfig {
        api_key: Some("gsk_test".to_string()),
        endpoint,
        request_timeout_secs: 5,
        simulation_seed: Some(9),
        ..Default::default()
    }
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[tokio::test]
async fn test_live_classification_maps_fields_to_tags() {
    let content = "```json\n{\"animalType\": \"Dog\", \"hasInjury\": true, \"isMalnourished\": true, \"hasCollar\": false}\n```";
    let (endpoint, last_request) = spawn_stub(StatusCode::OK, completion(content)).await;

    let classifier = LiveClassifier::new(&config_for(endpoint)).unwrap();
    let result = classifier
        .classify(&ImagePayload::from("AAAA"))
        .await
        .unwrap();

    assert_eq!(
        result.tags,
        vec![
            ConditionTag::Dog,
            ConditionTag::ApparentInjury,
            ConditionTag::Malnourished
        ]
    );
    assert_eq!(result.confidence, 0.85);

    let request = last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request["temperature"].as_f64().map(|t| (t * 10.0).round()), Some(1.0));
    assert_eq!(
        request["messages"][0]["content"][1]["image_url"]["url"],
        "data:image/jpeg;base64,AAAA"
    );
}

#[tokio::test]
async fn test_error_status_is_unavailable() {
    let (endpoint, _) = spawn_stub(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "message": "model overloaded" } }),
    )
    .await;

    let classifier = LiveClassifier::new(&config_for(endpoint)).unwrap();
    match classifier.classify(&ImagePayload::from("AAAA")).await {
        Err(ClassifierError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("overloaded"));
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_content_is_unavailable() {
    let (endpoint, _) = spawn_stub(StatusCode::OK, json!({ "choices": [] })).await;

    let classifier = LiveClassifier::new(&config_for(endpoint)).unwrap();
    assert!(matches!(
        classifier.classify(&ImagePayload::from("AAAA")).await,
        Err(ClassifierError::EmptyResponse)
    ));
}

#[tokio::test]
async fn test_prose_content_is_unavailable() {
    let (endpoint, _) = spawn_stub(StatusCode::OK, completion("Looks like a happy dog!")).await;

    let classifier = LiveClassifier::new(&config_for(endpoint)).unwrap();
    assert!(matches!(
        classifier.classify(&ImagePayload::from("AAAA")).await,
        Err(ClassifierError::Parse(_))
    ));
}

#[tokio::test]
async fn test_empty_verdict_is_unavailable() {
    let (endpoint, _) = spawn_stub(StatusCode::OK, completion("{}")).await;

    let classifier = LiveClassifier::new(&config_for(endpoint)).unwrap();
    assert!(matches!(
        classifier.classify(&ImagePayload::from("AAAA")).await,
        Err(ClassifierError::NoFindings)
    ));
}

#[tokio::test]
async fn test_engine_falls_back_when_live_fails() {
    let (endpoint, _) = spawn_stub(StatusCode::BAD_GATEWAY, json!({})).await;

    let engine = TriageEngine::from_config(&config_for(endpoint));
    let result = engine
        .triage(&ImagePayload::from("AAAA"), Coordinates::new(37.42199999, -122.084))
        .await
        .unwrap();

    assert_eq!(result.readable_address, "Near 37.4220, -122.0840");
    assert!([1, 3, 4, 5].contains(&result.priority_score));
}

#[tokio::test]
async fn test_engine_falls_back_when_service_unreachable() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    drop(listener);

    let engine = TriageEngine::from_config(&config_for(endpoint));
    let result = engine
        .triage(&ImagePayload::from("AAAA"), Coordinates::new(0.0, 0.0))
        .await;

    assert!(result.is_ok());
}
