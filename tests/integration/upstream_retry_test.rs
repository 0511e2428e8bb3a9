// Gemini client against a fake upstream served by actix-test.
//
// The fake records every attempt so retry counts can be asserted exactly.

mod test_app;

use actix_web::http::StatusCode;
use actix_web::{test, web, App, HttpRequest, HttpResponse};
use insight_proxy::config::{RequestConfig, UpstreamConfig};
use insight_proxy::core::{ApiSecret, AppError, GENERIC_FAILURE_MESSAGE};
use insight_proxy::insights::{self, GeminiClient, InsightState, InsightUpstream};
use insight_proxy::middleware::FixedWindowLimiter;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Reply {
    Json(Value),
    Status(u16),
    Delay(Duration),
}

#[derive(Default)]
struct FakeUpstream {
    hits: AtomicUsize,
    script: Mutex<VecDeque<Reply>>,
    last_query: Mutex<String>,
    last_body: Mutex<Option<Value>>,
}

impl FakeUpstream {
    fn new(script: Vec<Reply>) -> web::Data<Self> {
        let fake = Self::default();
        *fake.script.lock().unwrap() = script.into();
        web::Data::new(fake)
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn fake_generate(
    req: HttpRequest,
    body: web::Bytes,
    fake: web::Data<FakeUpstream>,
) -> HttpResponse {
    let attempt = fake.hits.fetch_add(1, Ordering::SeqCst) + 1;
    *fake.last_query.lock().unwrap() = req.query_string().to_string();
    *fake.last_body.lock().unwrap() = serde_json::from_slice(&body).ok();

    let reply = fake.script.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Json(value)) => HttpResponse::Ok().json(value),
        Some(Reply::Status(code)) => HttpResponse::build(StatusCode::from_u16(code).unwrap())
            .json(json!({ "error": { "message": "internal upstream detail" } })),
        Some(Reply::Delay(delay)) => {
            tokio::time::sleep(delay).await;
            HttpResponse::Ok().json(json!({ "late": true }))
        }
        None => HttpResponse::Ok().json(json!({ "attempt": attempt })),
    }
}

fn start_fake(fake: web::Data<FakeUpstream>) -> actix_test::TestServer {
    actix_test::start(move || {
        App::new()
            .app_data(fake.clone())
            .route("/v1beta/models/{tail:.*}", web::post().to(fake_generate))
    })
}

fn client_for(srv: &actix_test::TestServer, request: RequestConfig) -> GeminiClient {
    GeminiClient::new(&UpstreamConfig {
        base_url: format!("http://{}", srv.addr()),
        model: "gemini-test".to_string(),
        system_instruction: None,
        request,
    })
    .expect("client should build")
}

#[actix_web::test]
async fn test_server_error_then_success_takes_two_attempts() {
    let fake = FakeUpstream::new(vec![
        Reply::Status(503),
        Reply::Json(json!({ "candidates": ["second"] })),
    ]);
    let srv = start_fake(fake.clone());
    let client = client_for(&srv, RequestConfig::new(2_000, 2, 10));

    let body = client
        .generate("hello", &ApiSecret::new("k"))
        .await
        .expect("second attempt should succeed");

    assert_eq!(body, json!({ "candidates": ["second"] }));
    assert_eq!(fake.hits(), 2);
}

#[actix_web::test]
async fn test_persistent_server_error_exhausts_retries() {
    let fake = FakeUpstream::new(vec![
        Reply::Status(500),
        Reply::Status(502),
        Reply::Status(503),
        Reply::Json(json!({ "never": "reached" })),
    ]);
    let srv = start_fake(fake.clone());
    let client = client_for(&srv, RequestConfig::new(2_000, 2, 5));

    let err = client
        .generate("hello", &ApiSecret::new("k"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UpstreamTransient(_)));
    assert_eq!(fake.hits(), 3);
}

#[actix_web::test]
async fn test_client_error_is_not_retried() {
    let fake = FakeUpstream::new(vec![Reply::Status(400)]);
    let srv = start_fake(fake.clone());
    let client = client_for(&srv, RequestConfig::new(2_000, 3, 5));

    let err = client
        .generate("hello", &ApiSecret::new("k"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UpstreamFatal(_)));
    assert_eq!(fake.hits(), 1);
    assert!(!err.to_string().contains("internal upstream detail"));
}

#[actix_web::test]
async fn test_timeout_without_retries_is_single_attempt() {
    let fake = FakeUpstream::new(vec![Reply::Delay(Duration::from_millis(800))]);
    let srv = start_fake(fake.clone());
    let client = client_for(&srv, RequestConfig::new(100, 0, 5));

    let err = client
        .generate("hello", &ApiSecret::new("secret-key"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UpstreamTransient(_)));
    assert!(!err.to_string().contains("secret-key"));
    assert_eq!(fake.hits(), 1);
}

#[actix_web::test]
async fn test_payload_and_key_reach_upstream() {
    let fake = FakeUpstream::new(vec![]);
    let srv = start_fake(fake.clone());
    let client = GeminiClient::new(&UpstreamConfig {
        base_url: format!("http://{}", srv.addr()),
        model: "gemini-test".to_string(),
        system_instruction: Some("Be concise".to_string()),
        request: RequestConfig::new(2_000, 0, 5),
    })
    .unwrap();

    client
        .generate("Describe my stack", &ApiSecret::new("abc123"))
        .await
        .unwrap();

    assert_eq!(*fake.last_query.lock().unwrap(), "key=abc123");
    assert_eq!(
        fake.last_body.lock().unwrap().clone().unwrap(),
        json!({
            "contents": [{ "parts": [{ "text": "Describe my stack" }] }],
            "systemInstruction": { "parts": [{ "text": "Be concise" }] }
        })
    );
}

fn proxy_state(client: GeminiClient) -> web::Data<InsightState> {
    let config = test_app::config(&[("GEMINI_API_KEY", test_app::SERVER_KEY)]);
    web::Data::new(InsightState::new(
        &config,
        FixedWindowLimiter::new(config.rate_limit),
        Arc::new(client),
    ))
}

#[actix_web::test]
async fn test_proxy_returns_second_attempt_body() {
    let fake = FakeUpstream::new(vec![
        Reply::Status(500),
        Reply::Json(json!({ "candidates": [{ "text": "retry won" }] })),
    ]);
    let srv = start_fake(fake.clone());
    let app = test::init_service(
        App::new()
            .app_data(proxy_state(client_for(&srv, RequestConfig::new(2_000, 1, 5))))
            .configure(insights::configure),
    )
    .await;

    let resp = test::call_service(&app, test_app::insight_request("hi").to_request()).await;

    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "candidates": [{ "text": "retry won" }] }));
    assert_eq!(fake.hits(), 2);
}

#[actix_web::test]
async fn test_proxy_timeout_is_generic_500() {
    let fake = FakeUpstream::new(vec![Reply::Delay(Duration::from_millis(800))]);
    let srv = start_fake(fake.clone());
    let app = test::init_service(
        App::new()
            .app_data(proxy_state(client_for(&srv, RequestConfig::new(100, 0, 5))))
            .configure(insights::configure),
    )
    .await;

    let resp = test::call_service(&app, test_app::insight_request("hi").to_request()).await;

    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({ "error": { "code": 500, "message": GENERIC_FAILURE_MESSAGE } })
    );
    assert_eq!(fake.hits(), 1);
}
