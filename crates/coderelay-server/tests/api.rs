//! Router host over HTTP and WebSocket, relaying into a real receiver.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

use coderelay_capture::{Document, Dom, PageInput, PageSelectors};
use coderelay_core::config::DEFAULT_RECEIVER_ADDR;
use coderelay_core::{BusMessage, CaptureBus, RelayConfig, TransportState};
use coderelay_server::{build_router, AppState};

async fn start_receiver() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());
    tokio::spawn(coderelay_receiver::serve(listener));
    url
}

fn state(data_dir: &std::path::Path, relay_url: String) -> Arc<AppState> {
    let config =
        RelayConfig::with_data_dir(data_dir, 0, relay_url, DEFAULT_RECEIVER_ADDR.to_string())
            .unwrap();
    Arc::new(AppState::start(config))
}

async fn wait_connected(state: &AppState) {
    for _ in 0..250 {
        if state.router.status().transport == TransportState::Connected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("relay never connected");
}

async fn call(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_status_and_settings_shape() {
    let data = tempfile::tempdir().unwrap();
    let state = state(data.path(), "ws://127.0.0.1:9/".to_string());

    let get = Request::builder().uri("/api/status").body(Body::empty()).unwrap();
    let (status, json) = call(&state, get).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sourceActive"], false);
    assert_eq!(json["relayActive"], true);
    assert!(json["transport"].is_string());

    let put = json_request("PUT", "/api/settings", serde_json::json!({"destination": "/work/proj"}));
    let (status, json) = call(&state, put).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["destination"], "/work/proj");

    let get = Request::builder().uri("/api/settings").body(Body::empty()).unwrap();
    let (_, json) = call(&state, get).await;
    assert_eq!(json["destination"], "/work/proj");
    assert!(data.path().join("settings.json").exists());

    let put = json_request("PUT", "/api/settings", serde_json::json!({"destination": "  "}));
    let (_, json) = call(&state, put).await;
    assert!(json.get("destination").is_none());

    state.shutdown();
}

#[tokio::test]
async fn test_bus_message_is_acknowledged() {
    let data = tempfile::tempdir().unwrap();
    let state = state(data.path(), "ws://127.0.0.1:9/".to_string());

    let alive = json_request("POST", "/api/bus", serde_json::json!({"type": "ALIVE"}));
    let (status, json) = call(&state, alive).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"status": "received"}));

    let bad = json_request("POST", "/api/bus", serde_json::json!({"type": "NOPE"}));
    let (status, _) = call(&state, bad).await;
    assert!(status.is_client_error());

    state.shutdown();
}

#[tokio::test]
async fn test_snippet_written_and_mirrored() {
    let data = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let state = state(data.path(), start_receiver().await);
    state
        .settings
        .set_destination(Some(dest.path().to_string_lossy().to_string()))
        .unwrap();
    wait_connected(&state).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut display, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/display", addr))
        .await
        .unwrap();

    let first = next_json(&mut display).await;
    assert_eq!(first["type"], "STATUS_UPDATE");

    let body = serde_json::json!({
        "type": "NEW_SNIPPETS",
        "snippets": [{"id": 0, "kind": "snippet", "content": "hello", "filePath": "out/file.txt"}],
    });
    let (status, _) = call(&state, json_request("POST", "/api/bus", body)).await;
    assert_eq!(status, StatusCode::OK);

    let mirrored = loop {
        let event = next_json(&mut display).await;
        if event["type"] == "DISPLAY_SNIPPET" {
            break event;
        }
    };
    assert_eq!(mirrored["snippet"]["content"], "hello");
    assert_eq!(mirrored["snippet"]["kind"], "snippet");

    let target = dest.path().join("out/file.txt");
    for _ in 0..250 {
        if target.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");

    state.shutdown();
}

async fn wait_for_file(path: &std::path::Path) -> String {
    for _ in 0..250 {
        if let Ok(content) = std::fs::read_to_string(path) {
            return content;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("{} never written", path.display());
}

#[tokio::test]
async fn test_reloaded_page_reuses_positional_ids() {
    let data = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let state = state(data.path(), start_receiver().await);
    state
        .settings
        .set_destination(Some(dest.path().to_string_lossy().to_string()))
        .unwrap();
    wait_connected(&state).await;

    let mut written = Vec::new();
    for name in ["first.txt", "second.txt"] {
        let (status, json) =
            call(&state, json_request("POST", "/api/session", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let session = json["session"].as_u64().unwrap();

        let body = serde_json::json!({
            "type": "NEW_SNIPPETS",
            "snippets": [{"id": 0, "kind": "snippet", "content": name, "filePath": name}],
        });
        let uri = format!("/api/bus?session={}", session);
        let (status, _) = call(&state, json_request("POST", &uri, body)).await;
        assert_eq!(status, StatusCode::OK);

        written.push(wait_for_file(&dest.path().join(name)).await);

        let end = Request::builder()
            .method("DELETE")
            .uri(format!("/api/session/{}", session))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&state, end).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    assert_eq!(written, vec!["first.txt", "second.txt"]);

    state.shutdown();
}

#[tokio::test]
async fn test_page_socket_acks_and_receives_prompt() {
    let data = tempfile::tempdir().unwrap();
    let state = state(data.path(), "ws://127.0.0.1:9/".to_string());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let (mut page, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/page", addr))
        .await
        .unwrap();
    page.send(Message::Text(r#"{"type":"ALIVE"}"#.into())).await.unwrap();
    assert_eq!(next_json(&mut page).await, serde_json::json!({"status": "received"}));

    let body = serde_json::json!({"type": "SEND_TO_CHAT", "content": "a\nb"});
    let (status, _) = call(&state, json_request("POST", "/api/bus", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        next_json(&mut page).await,
        serde_json::json!({"type": "APPEND_PROMPT", "message": "a\nb"})
    );
    assert!(state.router.status().source_active);

    page.close(None).await.unwrap();
    for _ in 0..250 {
        if !state.router.status().source_active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!state.router.status().source_active);

    state.shutdown();
}

async fn next_json<S>(socket: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("display frame")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn test_embedded_page_is_relayed_and_commanded() {
    let data = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let state = state(data.path(), start_receiver().await);
    state
        .settings
        .set_destination(Some(dest.path().to_string_lossy().to_string()))
        .unwrap();
    wait_connected(&state).await;

    let mut dom = Dom::new();
    let prompt = dom.append(dom.body(), "div", &[("id", "prompt-textarea")]);
    let page = state.embed_page(dom, PageSelectors::default()).unwrap();

    page.send(PageInput::Mutate(Box::new(|dom: &mut Dom| {
        dom.append(dom.body(), "button", &[("data-testid", "stop-button")]);
        dom.append_with_text(dom.body(), "code", &[], "// out/embedded.rs\nfn main() {}");
    })));
    page.send(PageInput::Mutate(Box::new(|dom: &mut Dom| {
        let selectors = PageSelectors::default();
        for button in dom.query_all(&selectors.stop_indicator) {
            dom.remove(button);
        }
    })));
    let written = wait_for_file(&dest.path().join("out/embedded.rs")).await;
    assert_eq!(written, "fn main() {}");

    state
        .router
        .publish(BusMessage::SendToChat {
            content: "looks good".into(),
        })
        .unwrap();
    let mut html = String::new();
    for _ in 0..250 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        page.send(PageInput::Mutate(Box::new(move |dom: &mut Dom| {
            let _ = tx.send(dom.outer_html(prompt));
        })));
        html = rx.await.unwrap();
        if html.contains("looks good") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(html, "<div id=\"prompt-textarea\"><br>looks good</div>");

    let session = page.session();
    assert!(page.close().await.is_some());
    assert!(state.router.end_session(session).is_ok());

    state.shutdown();
}
