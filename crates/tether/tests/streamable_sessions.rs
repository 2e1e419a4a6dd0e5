//! End-to-end session lifecycle over the streamable HTTP router.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use tether::transport::router;
use tether::{CallToolResult, ErrorData, Handler, Implementation, SessionManager, Tool, SESSION_HEADER};

struct CounterHandler;

#[async_trait]
impl Handler for CounterHandler {
    fn tools(&self) -> Vec<Tool> {
        vec![Tool::new("count", "Count the arguments").read_only()]
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, ErrorData> {
        match name {
            "count" => {
                let n = arguments.as_object().map(|m| m.len()).unwrap_or(0);
                Ok(CallToolResult::text(n.to_string()))
            }
            "explode" => panic!("tool exploded"),
            other => Err(ErrorData::tool_not_found(other)),
        }
    }

    fn server_info(&self) -> Implementation {
        Implementation::new("counter", "0.1.0")
    }
}

struct Harness {
    app: Router,
    manager: Arc<SessionManager>,
    closed: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let closed = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (c, e) = (Arc::clone(&closed), Arc::clone(&errors));
    let manager = Arc::new(
        SessionManager::new(Arc::new(CounterHandler))
            .with_session_closed(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .with_error_handler(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            }),
    );
    Harness {
        app: router(Arc::clone(&manager)),
        manager,
        closed,
        errors,
    }
}

fn post(session: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json, text/event-stream");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare(method: Method, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    builder.body(Body::empty()).unwrap()
}

fn initialize(id: i64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "capabilities": {},
            "clientInfo": { "name": "test", "version": "1.0" }
        }
    })
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn session_of(response: &Response) -> String {
    response
        .headers()
        .get(SESSION_HEADER)
        .expect("session header")
        .to_str()
        .unwrap()
        .to_string()
}

async fn open_session(h: &Harness) -> String {
    let response = h.app.clone().oneshot(post(None, initialize(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    session_of(&response)
}

#[tokio::test]
async fn initialize_creates_session() {
    let h = harness();
    let response = h.app.clone().oneshot(post(None, initialize(1))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id = session_of(&response);
    let body = json_body(response).await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "counter");
    assert!(h.manager.registry().has(&id));
}

#[tokio::test]
async fn non_initialize_without_session_is_rejected() {
    let h = harness();
    let request = post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
    let response = h.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SESSION_HEADER).is_none());
    assert!(h.manager.registry().is_empty());
}

#[tokio::test]
async fn continuation_reaches_same_session() {
    let h = harness();
    let id = open_session(&h).await;

    let notify = post(Some(&id), json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
    let response = h.app.clone().oneshot(notify).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let call = post(
        Some(&id),
        json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": { "name": "count", "arguments": { "a": 1, "b": 2 } }
        }),
    );
    let response = h.app.clone().oneshot(call).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_of(&response), id);

    let body = json_body(response).await;
    assert_eq!(body["result"]["content"][0]["text"], "2");
    assert_eq!(h.manager.registry().len(), 1);
}

#[tokio::test]
async fn second_initialize_on_same_session_is_rejected() {
    let h = harness();
    let id = open_session(&h).await;

    let response = h.app.clone().oneshot(post(Some(&id), initialize(2))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.manager.registry().len(), 1);
}

#[tokio::test]
async fn unknown_session_id_starts_fresh_session() {
    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(post(Some("stale-id"), initialize(1)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let id = session_of(&response);
    assert_ne!(id, "stale-id");
    assert!(h.manager.registry().has(&id));
    assert!(!h.manager.registry().has("stale-id"));
}

#[tokio::test]
async fn malformed_body_is_parse_error() {
    let h = harness();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{nope"))
        .unwrap();
    let response = h.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], ErrorData::PARSE_ERROR);
    assert!(body["id"].is_null());
    assert!(h.manager.registry().is_empty());
}

#[tokio::test]
async fn get_requires_known_session() {
    let h = harness();

    let response = h.app.clone().oneshot(bare(Method::GET, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = h.app.clone().oneshot(bare(Method::GET, Some("ghost"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.manager.registry().is_empty());
}

#[tokio::test]
async fn only_one_standalone_stream_per_session() {
    let h = harness();
    let id = open_session(&h).await;

    let first = h.app.clone().oneshot(bare(Method::GET, Some(&id))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let content_type = first.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));

    let second = h.app.clone().oneshot(bare(Method::GET, Some(&id))).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    drop(first);
}

#[tokio::test]
async fn delete_terminates_session_once() {
    let h = harness();
    let id = open_session(&h).await;

    let response = h.app.clone().oneshot(bare(Method::DELETE, Some(&id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(!h.manager.registry().has(&id));
    assert_eq!(h.closed.load(Ordering::SeqCst), 1);

    // Second DELETE is a no-op
    let response = h.app.clone().oneshot(bare(Method::DELETE, Some(&id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.closed.load(Ordering::SeqCst), 1);

    // Later requests with the old id start over
    let call = post(Some(&id), json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}));
    let response = h.app.clone().oneshot(call).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_without_header_is_bad_request() {
    let h = harness();
    let response = h.app.clone().oneshot(bare(Method::DELETE, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let h = harness();
    let a = open_session(&h).await;
    let b = open_session(&h).await;
    assert_ne!(a, b);
    assert_eq!(h.manager.registry().len(), 2);

    h.app.clone().oneshot(bare(Method::DELETE, Some(&a))).await.unwrap();
    assert!(h.manager.registry().has(&b));
    assert_eq!(h.manager.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_initialize_gets_distinct_sessions() {
    let h = harness();
    let first = tokio::spawn(h.app.clone().oneshot(post(None, initialize(1))));
    let second = tokio::spawn(h.app.clone().oneshot(post(None, initialize(1))));
    let (first, second) = tokio::join!(first, second);
    let (first, second) = (first.unwrap().unwrap(), second.unwrap().unwrap());

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    let (a, b) = (session_of(&first), session_of(&second));
    assert_ne!(a, b);

    let registry = h.manager.registry();
    assert_eq!(registry.len(), 2);
    let (ta, tb) = (registry.get(&a).unwrap(), registry.get(&b).unwrap());
    assert!(!Arc::ptr_eq(&ta, &tb));
}

#[tokio::test]
async fn handler_panic_becomes_server_error() {
    let h = harness();
    let id = open_session(&h).await;

    let call = post(
        Some(&id),
        json!({
            "jsonrpc": "2.0",
            "id": 9,
            "method": "tools/call",
            "params": { "name": "explode", "arguments": {} }
        }),
    );
    let response = h.app.clone().oneshot(call).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(h.errors.load(Ordering::SeqCst), 1);

    // The session survives
    assert!(h.manager.registry().has(&id));
}
