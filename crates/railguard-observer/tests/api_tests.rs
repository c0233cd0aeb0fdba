//! Integration tests for the observer API endpoints.
//!
//! Most tests drive Axum's `Router` directly via `tower::ServiceExt`
//! without starting a TCP server. The `WebSocket` tests serve the router
//! on an ephemeral local port and connect a real client.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use futures::StreamExt;
use railguard_core::RailguardConfig;
use railguard_observer::hub::QueueSink;
use railguard_observer::router::build_router;
use railguard_observer::server;
use railguard_observer::state::AppState;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

fn make_state(config: &RailguardConfig) -> Arc<AppState> {
    Arc::new(AppState::from_config(config))
}

async fn call(state: &Arc<AppState>, request: Request<Body>) -> Response {
    build_router(Arc::clone(state)).oneshot(request).await.unwrap()
}

async fn get(state: &Arc<AppState>, uri: &str) -> Response {
    call(state, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(state: &Arc<AppState>, uri: &str, body: &Value) -> Response {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    call(state, request).await
}

async fn post_frame(state: &Arc<AppState>, frame: Vec<u8>) -> Response {
    let request = Request::post("/api/internal/stream/cam1")
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from(frame))
        .unwrap();
    call(state, request).await
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn report() -> Value {
    json!({
        "type": "OBSTACLE_STUCK",
        "object_class": "car",
        "confidence": 0.91,
        "in_roi": true,
        "object_id": 12,
        "duration_seconds": 7.5,
        "camera_id": "CCTV-JBG-01"
    })
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_describes_the_service() {
    let state = make_state(&RailguardConfig::default());
    let response = get(&state, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ONLINE");
    assert_eq!(json["endpoints"]["live"], "GET /ws");
}

#[tokio::test]
async fn health_is_ok() {
    let state = make_state(&RailguardConfig::default());
    let response = get(&state, "/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn initial_train_and_city_state() {
    let state = make_state(&RailguardConfig::default());

    let train = body_json(get(&state, "/api/status").await).await;
    assert_eq!(train["train_id"], "KA-101");
    assert_eq!(train["distance"], 10.0);
    assert_eq!(train["speed"], 80.0);
    assert_eq!(train["status"], "SAFE");
    assert_eq!(train["city_action"], "TRAFFIC_NORMAL");
    assert_eq!(train["eta"], 450.0);

    let city = body_json(get(&state, "/api/city-status").await).await;
    assert_eq!(city["tier"], "NORMAL");
    assert_eq!(city["traffic_light"], "NORMAL");
    assert_eq!(city["rail_crossing"], "OPEN");
}

#[tokio::test]
async fn units_cover_the_topology() {
    let state = make_state(&RailguardConfig::default());
    let units = body_json(get(&state, "/api/units").await).await;
    let map = units.as_object().unwrap();
    assert_eq!(map.len(), 4);
    assert_eq!(units["CCTV-BRN-01"], "ONLINE");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let state = make_state(&RailguardConfig::default());
    let response = get(&state, "/api/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn alert_arms_the_override() {
    let state = make_state(&RailguardConfig::default());

    let response = post_json(&state, "/api/alert", &report()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["status"], "ok");
    assert_eq!(ack["received"], "OBSTACLE_STUCK");
    assert!(ack["incident_id"].is_string());
    assert!(ack["clears_at"].is_string());

    let incident = body_json(get(&state, "/api/incident").await).await;
    assert_eq!(incident["active"], true);
    assert_eq!(incident["incident_id"], ack["incident_id"]);

    let train = body_json(get(&state, "/api/status").await).await;
    assert_eq!(train["status"], "CRITICAL");
    assert_eq!(train["city_action"], "EMERGENCY_DISPATCH");
}

#[tokio::test]
async fn accepted_alert_is_pushed_to_live_viewers() {
    let state = make_state(&RailguardConfig::default());
    let (sink, mut rx) = QueueSink::channel(4);
    state.snapshots.connect(Box::new(sink), None).await.unwrap();

    let response = post_json(&state, "/api/alert", &report()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let batch = rx.recv().await.unwrap();
    assert_eq!(batch.frames().len(), 1);
    let pushed: Value = serde_json::from_str(batch.frames().first().unwrap().as_str()).unwrap();
    assert_eq!(pushed["type"], "detection");
    assert_eq!(pushed["data"]["type"], "OBSTACLE_STUCK");
    assert_eq!(pushed["data"]["camera_id"], "CCTV-JBG-01");
    assert!(pushed["data"]["timestamp"].is_string());
}

#[tokio::test]
async fn rejected_alert_is_not_pushed() {
    let state = make_state(&RailguardConfig::default());
    let (sink, mut rx) = QueueSink::channel(4);
    state.snapshots.connect(Box::new(sink), None).await.unwrap();

    let mut bad = report();
    bad["confidence"] = json!(-1.0);
    let response = post_json(&state, "/api/alert", &bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.snapshots.subscriber_count().await, 1);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn internal_push_accepts_the_same_payload() {
    let state = make_state(&RailguardConfig::default());
    let mut body = report();
    body["type"] = json!("");
    let response = post_json(&state, "/api/internal/push", &body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let ack = body_json(response).await;
    assert_eq!(ack["received"], "detection");
}

#[tokio::test]
async fn malformed_alert_is_rejected_without_effect() {
    let state = make_state(&RailguardConfig::default());

    let request = Request::post("/api/alert")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = call(&state, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);

    let mut bad = report();
    bad["confidence"] = json!(2.0);
    let response = post_json(&state, "/api/alert", &bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut bad = report();
    bad["timestamp"] = json!(1_700_000_000.5);
    let response = post_json(&state, "/api/alert", &bad).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let incident = body_json(get(&state, "/api/incident").await).await;
    assert_eq!(incident["active"], false);
    let train = body_json(get(&state, "/api/status").await).await;
    assert_eq!(train["status"], "SAFE");
    let history = body_json(get(&state, "/api/history").await).await;
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn history_respects_limit() {
    let state = make_state(&RailguardConfig::default());
    for _ in 0..3 {
        let response = post_json(&state, "/api/alert", &report()).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let all = body_json(get(&state, "/api/history").await).await;
    assert_eq!(all["total"], 3);
    assert_eq!(all["source"], "memory");
    assert_eq!(all["history"][0]["object_class"], "car");

    let one = body_json(get(&state, "/api/history?limit=1").await).await;
    assert_eq!(one["total"], 1);

    let clamped = body_json(get(&state, "/api/history?limit=9999").await).await;
    assert_eq!(clamped["total"], 3);
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hierarchy_defaults_to_the_region() {
    let state = make_state(&RailguardConfig::default());
    let json = body_json(get(&state, "/api/hierarchy").await).await;
    assert_eq!(json["id"], "DAOP-7");
    assert_eq!(json["stations"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn hierarchy_is_scoped_by_role() {
    let state = make_state(&RailguardConfig::default());

    let station = body_json(
        get(&state, "/api/hierarchy?role=STATION_MASTER&station_id=STA-KTS").await,
    )
    .await;
    assert_eq!(station["id"], "STA-KTS");
    assert_eq!(station["head_officer"], "Bpk. Hartono");

    let post = body_json(get(&state, "/api/hierarchy?role=JPL_OFFICER&post_id=JPL-102").await).await;
    assert_eq!(post["id"], "JPL-102");
    assert_eq!(post["units"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn hierarchy_unknown_post_is_404() {
    let state = make_state(&RailguardConfig::default());
    let response = get(&state, "/api/hierarchy?role=JPL_OFFICER&post_id=JPL-404").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["status"], 404);
}

// ---------------------------------------------------------------------------
// Camera frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn frame_upload_validation() {
    let mut config = RailguardConfig::default();
    config.frames.max_frame_bytes = 16;
    let state = make_state(&config);

    let response = post_frame(&state, Vec::new()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_frame(&state, vec![0xAB; 64]).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(state.frames.latest().await.is_none());

    let response = post_frame(&state, vec![0xFF, 0xD8, 0xFF, 0xD9]).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        state.frames.latest().await,
        Some(Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]))
    );
}

#[tokio::test]
async fn mjpeg_stream_starts_with_latest_frame() {
    let state = make_state(&RailguardConfig::default());
    let response = post_frame(&state, b"JPEGDATA".to_vec()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = get(&state, "/stream/cam1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_owned();
    assert_eq!(content_type, "multipart/x-mixed-replace; boundary=frame");

    let mut body = response.into_body().into_data_stream();
    let first = body.next().await.unwrap().unwrap();
    assert_eq!(
        first,
        Bytes::from_static(
            b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 8\r\n\r\nJPEGDATA\r\n"
        )
    );
    assert_eq!(state.frames.subscriber_count().await, 1);

    drop(body);
    assert_eq!(state.frames.subscriber_count().await, 0);
}

// ---------------------------------------------------------------------------
// Live updates over a real socket
// ---------------------------------------------------------------------------

/// Serve the router on an ephemeral port for the rest of the test.
async fn serve_live(state: &Arc<AppState>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(
        listener,
        Arc::clone(state),
        std::future::pending::<()>(),
    ));
    format!("ws://{addr}/ws")
}

type LiveSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Type tag of the next live message.
async fn next_type(ws: &mut LiveSocket) -> String {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let value: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
    value["type"].as_str().unwrap().to_owned()
}

async fn wait_for_subscribers(state: &Arc<AppState>, expected: usize) {
    for _ in 0..100 {
        if state.snapshots.subscriber_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state.snapshots.subscriber_count().await, expected);
}

#[tokio::test]
async fn websocket_sends_welcome_snapshot_then_updates() {
    let state = make_state(&RailguardConfig::default());
    let url = serve_live(&state).await;
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();

    assert_eq!(next_type(&mut ws).await, "welcome");
    for expected in ["train_status", "city_status", "unit_status", "incident_status"] {
        assert_eq!(next_type(&mut ws).await, expected);
    }
    assert_eq!(state.snapshots.subscriber_count().await, 1);

    let batch = railguard_observer::hub::capture(&state.store).await.unwrap();
    state.snapshots.broadcast(batch).await.unwrap();
    assert_eq!(next_type(&mut ws).await, "train_status");
    for _ in 0..3 {
        next_type(&mut ws).await;
    }

    let response = post_json(&state, "/api/alert", &report()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(next_type(&mut ws).await, "detection");

    ws.close(None).await.unwrap();
    wait_for_subscribers(&state, 0).await;
}

#[tokio::test]
async fn websocket_churn_leaves_no_subscribers() {
    let state = make_state(&RailguardConfig::default());
    let url = serve_live(&state).await;

    for _ in 0..5 {
        let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
        assert_eq!(next_type(&mut ws).await, "welcome");
        // Dropped without a close frame.
        drop(ws);
    }
    let (mut ws, _) = connect_async(url.as_str()).await.unwrap();
    assert_eq!(next_type(&mut ws).await, "welcome");
    ws.close(None).await.unwrap();

    wait_for_subscribers(&state, 0).await;
}
