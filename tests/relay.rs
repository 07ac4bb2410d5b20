//! End-to-end relay tests against a stub upstream server.
//!
//! Each test starts a real relay instance and a stub upstream on
//! loopback port 0, then drives requests through with reqwest. The stub
//! records every request it receives and answers with a canned response.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use bellhop::config::model::{Config, RelaySettings, Upstream};
use bellhop::config::ConfigVersion;
use bellhop::server::{self, AppState, LoadedConfig, Stats};

struct StubState {
    reply_status: StatusCode,
    reply_headers: Vec<(&'static str, &'static str)>,
    reply_body: Vec<u8>,
    delay: Option<Duration>,
    requests: Mutex<Vec<SeenRequest>>,
}

struct SeenRequest {
    method: String,
    uri: String,
    headers: HeaderMap,
    body: Bytes,
}

impl StubState {
    fn envelope(body: &Value) -> Arc<Self> {
        Self::raw(
            StatusCode::OK,
            vec![
                ("content-type", "application/json"),
                ("x-upstream", "yes"),
            ],
            serde_json::to_vec(body).unwrap(),
        )
    }

    fn raw(
        status: StatusCode,
        headers: Vec<(&'static str, &'static str)>,
        body: Vec<u8>,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply_status: status,
            reply_headers: headers,
            reply_body: body,
            delay: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn seen(&self) -> Vec<SeenRequest> {
        std::mem::take(&mut *self.requests.lock().await)
    }
}

async fn stub_handler(
    State(stub): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    stub.requests.lock().await.push(SeenRequest {
        method: method.to_string(),
        uri: uri.to_string(),
        headers,
        body,
    });

    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = (stub.reply_status, stub.reply_body.clone()).into_response();
    for (key, value) in &stub.reply_headers {
        response.headers_mut().insert(*key, value.parse().unwrap());
    }
    response
}

async fn spawn(router: Router) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

async fn start_upstream(stub: Arc<StubState>) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let router = Router::new().fallback(stub_handler).with_state(stub);
    spawn(router).await
}

async fn start_relay_with(
    config: Config,
) -> (SocketAddr, Arc<AppState>, tokio::sync::oneshot::Sender<()>) {
    let state = Arc::new(AppState {
        config: tokio::sync::RwLock::new(LoadedConfig {
            config: Arc::new(config),
            version: ConfigVersion::Hash("test-hash".into()),
            source_name: "test".into(),
            loaded_at: Instant::now(),
        }),
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    let router = server::build_router(state.clone(), 1_048_576);
    let (addr, shutdown) = spawn(router).await;
    (addr, state, shutdown)
}

async fn start_relay(
    origin: String,
) -> (SocketAddr, Arc<AppState>, tokio::sync::oneshot::Sender<()>) {
    start_relay_with(Config {
        upstream: Upstream {
            origin,
            timeout: None,
        },
        relay: RelaySettings::default(),
    })
    .await
}

#[tokio::test]
async fn get_is_forwarded_and_payload_unwrapped() {
    let stub = StubState::envelope(&json!({"status": "OK", "payload": {"a": 1}}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/orders/42?page=2&size=10"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("x-upstream").unwrap(), "yes");
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({"a": 1}));

    let seen = stub.seen().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].uri, "/api/orders/42?page=2&size=10");
    assert_eq!(
        seen[0].headers.get("host").unwrap(),
        &upstream_addr.to_string()
    );
}

#[tokio::test]
async fn write_methods_forward_their_json_bodies() {
    for method in [Method::POST, Method::PUT, Method::DELETE] {
        let stub = StubState::envelope(&json!({"status": "OK", "payload": null}));
        let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
        let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

        let resp = reqwest::Client::new()
            .request(method.clone(), format!("http://{relay_addr}/api/items"))
            .json(&json!({"name": "widget"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{method} should relay");

        let seen = stub.seen().await;
        assert_eq!(seen[0].method, method.to_string());
        assert_eq!(
            serde_json::from_slice::<Value>(&seen[0].body).unwrap(),
            json!({"name": "widget"})
        );
        assert_eq!(
            seen[0].headers.get("content-type").unwrap(),
            "application/json"
        );
    }
}

#[tokio::test]
async fn client_headers_reach_the_upstream() {
    let stub = StubState::envelope(&json!({"status": "OK", "payload": 1}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    reqwest::Client::new()
        .get(format!("http://{relay_addr}/api/me"))
        .header("cookie", "session=abc123")
        .header("authorization", "Bearer tok")
        .send()
        .await
        .unwrap();

    let seen = stub.seen().await;
    assert_eq!(seen[0].headers.get("cookie").unwrap(), "session=abc123");
    assert_eq!(seen[0].headers.get("authorization").unwrap(), "Bearer tok");
}

#[tokio::test]
async fn non_ok_envelope_maps_to_400_with_upstream_message() {
    let stub = StubState::envelope(&json!({
        "status": "ERR",
        "errors": {"message": "bad input"}
    }));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    // Rejections never propagate upstream headers
    assert!(resp.headers().get("x-upstream").is_none());
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"error": "bad input"})
    );
}

#[tokio::test]
async fn non_ok_envelope_without_message_falls_back() {
    let stub = StubState::envelope(&json!({"status": "ERR"}));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"error": "Unknown error"})
    );
}

#[tokio::test]
async fn upstream_error_status_passes_through() {
    let stub = StubState::raw(
        StatusCode::SERVICE_UNAVAILABLE,
        vec![("x-upstream", "yes")],
        b"Service Unavailable".to_vec(),
    );
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    assert!(resp.headers().get("x-upstream").is_none());
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"error": "Upstream request failed"})
    );
}

#[tokio::test]
async fn redirects_pass_through_unfollowed() {
    let stub = StubState::raw(
        StatusCode::FOUND,
        vec![("location", "http://elsewhere.example/")],
        Vec::new(),
    );
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let resp = client
        .get(format!("http://{relay_addr}/api/items"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 302);
    assert!(resp.headers().get("location").is_none());
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({"error": "Upstream request failed"})
    );
}

#[tokio::test]
async fn malformed_post_body_still_forwards_without_body() {
    let stub = StubState::envelope(&json!({"status": "OK", "payload": "ok"}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{relay_addr}/api/items"))
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let seen = stub.seen().await;
    assert_eq!(seen.len(), 1);
    assert!(seen[0].body.is_empty());
}

#[tokio::test]
async fn get_never_forwards_a_body() {
    let stub = StubState::envelope(&json!({"status": "OK", "payload": 1}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    reqwest::Client::new()
        .get(format!("http://{relay_addr}/api/items"))
        .body(r#"{"a": 1}"#)
        .send()
        .await
        .unwrap();

    let seen = stub.seen().await;
    assert!(seen[0].body.is_empty());
}

#[tokio::test]
async fn unreachable_upstream_maps_to_500() {
    // Grab a loopback port and release it so nothing listens there
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (relay_addr, _state, _relay) = start_relay(origin).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body = resp.json::<Value>().await.unwrap();
    assert_eq!(body["error"], "Internal server error");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn non_envelope_2xx_body_maps_to_500() {
    let stub = StubState::raw(
        StatusCode::OK,
        vec![("content-type", "text/html")],
        b"<html>hello</html>".to_vec(),
    );
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert_eq!(
        resp.json::<Value>().await.unwrap()["error"],
        "Internal server error"
    );
}

#[tokio::test]
async fn string_payloads_round_through_verbatim() {
    let stub = StubState::envelope(&json!({"status": "OK", "payload": "token-abc123"}));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/token"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), r#""token-abc123""#);
}

#[tokio::test]
async fn missing_payload_becomes_null() {
    let stub = StubState::envelope(&json!({"status": "OK"}));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/items"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "null");
}

#[tokio::test]
async fn paths_outside_the_prefix_are_404() {
    let stub = StubState::envelope(&json!({"status": "OK"}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    for path in ["/other", "/apiary/items", "/"] {
        let resp = reqwest::get(format!("http://{relay_addr}{path}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404, "{path} should not be relayed");
    }
    assert!(stub.seen().await.is_empty());
}

#[tokio::test]
async fn disallowed_methods_get_405_with_allow() {
    let stub = StubState::envelope(&json!({"status": "OK"}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    let resp = reqwest::Client::new()
        .request(Method::PATCH, format!("http://{relay_addr}/api/items"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 405);
    assert_eq!(
        resp.headers().get("allow").unwrap(),
        "GET, POST, PUT, DELETE"
    );
    assert!(stub.seen().await.is_empty());
}

#[tokio::test]
async fn strip_prefix_removes_the_prefix_upstream() {
    let stub = StubState::envelope(&json!({"status": "OK"}));
    let (upstream_addr, _upstream) = start_upstream(stub.clone()).await;
    let (relay_addr, _state, _relay) = start_relay_with(Config {
        upstream: Upstream {
            origin: format!("http://{upstream_addr}"),
            timeout: None,
        },
        relay: RelaySettings {
            strip_prefix: true,
            ..RelaySettings::default()
        },
    })
    .await;

    reqwest::get(format!("http://{relay_addr}/api/orders/7"))
        .await
        .unwrap();

    let seen = stub.seen().await;
    assert_eq!(seen[0].uri, "/orders/7");
}

#[tokio::test]
async fn slow_upstream_times_out_when_configured() {
    let stub = Arc::new(StubState {
        reply_status: StatusCode::OK,
        reply_headers: vec![("content-type", "application/json")],
        reply_body: br#"{"status":"OK"}"#.to_vec(),
        delay: Some(Duration::from_millis(500)),
        requests: Mutex::new(Vec::new()),
    });
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, _state, _relay) = start_relay_with(Config {
        upstream: Upstream {
            origin: format!("http://{upstream_addr}"),
            timeout: Some(50),
        },
        relay: RelaySettings::default(),
    })
    .await;

    let resp = reqwest::get(format!("http://{relay_addr}/api/slow"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    let body = resp.json::<Value>().await.unwrap();
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("timed out")));
}

#[tokio::test]
async fn successes_count_as_relayed() {
    let stub = StubState::envelope(&json!({"status": "OK"}));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    reqwest::get(format!("http://{relay_addr}/api/x"))
        .await
        .unwrap();
    // 404s must not touch any counter
    reqwest::get(format!("http://{relay_addr}/nope"))
        .await
        .unwrap();

    assert_eq!(state.stats.relayed.load(Ordering::Relaxed), 1);
    assert_eq!(state.stats.rejected.load(Ordering::Relaxed), 0);
    assert_eq!(state.stats.failed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn rejections_count_separately() {
    let stub = StubState::envelope(&json!({"status": "ERR"}));
    let (upstream_addr, _upstream) = start_upstream(stub).await;
    let (relay_addr, state, _relay) = start_relay(format!("http://{upstream_addr}")).await;

    reqwest::get(format!("http://{relay_addr}/api/x"))
        .await
        .unwrap();

    assert_eq!(state.stats.relayed.load(Ordering::Relaxed), 0);
    assert_eq!(state.stats.rejected.load(Ordering::Relaxed), 1);
    assert_eq!(state.stats.failed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn upstream_failures_count_as_failed() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let (relay_addr, state, _relay) = start_relay(origin).await;

    reqwest::get(format!("http://{relay_addr}/api/x"))
        .await
        .unwrap();

    assert_eq!(state.stats.relayed.load(Ordering::Relaxed), 0);
    assert_eq!(state.stats.rejected.load(Ordering::Relaxed), 0);
    assert_eq!(state.stats.failed.load(Ordering::Relaxed), 1);
}
