//! Receiver over a real socket.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

async fn start() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(coderelay_receiver::serve(listener));
    format!("ws://{}/", addr)
}

async fn next_json<S>(stream: &mut S) -> serde_json::Value
where
    S: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn test_capture_roundtrip_over_socket() {
    let url = start().await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("src/lib.rs");

    let (socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    let (mut sink, mut stream) = socket.split();

    let frame = serde_json::json!({
        "kind": "snippet",
        "filePath": target.to_str().unwrap(),
        "content": "// src/lib.rs\npub fn a() {}",
        "id": 2,
    });
    sink.send(Message::Text(frame.to_string())).await.unwrap();

    let reply = next_json(&mut stream).await;
    assert_eq!(reply["status"], "success");
    assert_eq!(reply["id"], 2);
    assert_eq!(reply["savedPath"], target.to_str().unwrap());
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "pub fn a() {}");

    sink.send(Message::Text("garbage".into())).await.unwrap();
    let reply = next_json(&mut stream).await;
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "Invalid JSON format.");
}
