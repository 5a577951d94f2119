mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Harness, WAIT};
use serde_json::{json, Value};
use signtalk::client::{run_event_loop, ClientOptions};
use signtalk::http::ErrorResponse;
use signtalk::{create_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    let (client, events) = h.client(ClientOptions::default());
    let client = Arc::new(Mutex::new(client));
    tokio::spawn(run_event_loop(Arc::clone(&client), events));
    create_router(AppState::new(client))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => request.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Ok((status, value))
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let h = Harness::new().await?;
    let app = router(&h);

    let (status, _) = call(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_send_without_room_is_conflict() -> Result<()> {
    let h = Harness::new().await?;
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/chat/send", Some(json!({"text": "hi"}))).await?;

    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorResponse = serde_json::from_value(body)?;
    assert_eq!(error.code, "NO_ACTIVE_ROOM");

    Ok(())
}

#[tokio::test]
async fn test_bind_then_send() -> Result<()> {
    let h = Harness::new().await?;
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/chat/bind", Some(json!({"peer": "bob"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roomKey"], "alice_bob");

    let (status, body) = call(&app, "POST", "/chat/send", Some(json!({"text": "hi"}))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");

    let (status, body) = call(&app, "GET", "/chat/messages", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    Ok(())
}

#[tokio::test]
async fn test_bind_failure_is_bad_gateway() -> Result<()> {
    let h = Harness::new().await?;
    h.backend.fail(true);
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/chat/bind", Some(json!({"peer": "bob"}))).await?;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "ROOM_RESOLUTION");

    let (status, _) = call(&app, "POST", "/chat/bind", Some(json!({"peer": "  "}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_capture_lifecycle_over_http() -> Result<()> {
    let h = Harness::new().await?;
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/capture/start", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ILLEGAL_STATE");

    let (status, body) = call(&app, "POST", "/capture/arm", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "armed");

    let (status, body) = call(&app, "POST", "/capture/start", None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NO_ACTIVE_ROOM");

    call(&app, "POST", "/chat/bind", Some(json!({"peer": "bob"}))).await?;

    let (status, body) = call(&app, "POST", "/capture/start", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "capturing");

    let (_, body) = call(&app, "GET", "/capture/status", None).await?;
    assert_eq!(body["state"], "capturing");
    assert_eq!(body["room_key"], "alice_bob");

    let (status, body) = call(&app, "POST", "/capture/stop", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "armed");

    let (_, body) = call(&app, "GET", "/recognition", None).await?;
    assert_eq!(body["awaiting_final"], true);

    let (status, body) = call(&app, "POST", "/capture/close", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(h.camera.held(), 0);

    Ok(())
}

#[tokio::test]
async fn test_denied_camera_is_forbidden() -> Result<()> {
    let h = Harness::new().await?;
    h.camera.deny();
    let app = router(&h);

    let (status, body) = call(&app, "POST", "/capture/arm", None).await?;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "DEVICE_ACCESS");

    Ok(())
}

#[tokio::test]
async fn test_device_loss_shows_in_capture_status() -> Result<()> {
    let h = Harness::new().await?;
    let app = router(&h);

    call(&app, "POST", "/chat/bind", Some(json!({"peer": "bob"}))).await?;
    call(&app, "POST", "/capture/arm", None).await?;
    let (status, _) = call(&app, "POST", "/capture/start", None).await?;
    assert_eq!(status, StatusCode::OK);

    h.camera.lose();
    h.ticker.tick();

    let body = tokio::time::timeout(WAIT, async {
        loop {
            let (_, body) = call(&app, "GET", "/capture/status", None).await?;
            if body["state"] == "idle" {
                return Ok::<_, anyhow::Error>(body);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await??;

    assert_eq!(body["last_error"], "unplugged");
    assert_eq!(h.camera.held(), 0);

    let (status, body) = call(&app, "POST", "/capture/arm", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "armed");
    let (_, body) = call(&app, "GET", "/capture/status", None).await?;
    assert_eq!(body["last_error"], Value::Null);

    Ok(())
}
