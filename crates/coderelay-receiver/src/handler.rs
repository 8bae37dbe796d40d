//! Turns one inbound text frame into the frames sent back.

use serde::Deserialize;
use tracing::{error, warn};

use coderelay_core::{CaptureId, CaptureKind, InboundMessage, StatusReply};

use crate::store;

/// Loose view of anything the router may send: a capture or a SYNC request.
#[derive(Debug, Default, Deserialize)]
struct RelayRequest {
    #[serde(rename = "type")]
    message_type: Option<String>,
    kind: Option<String>,
    #[serde(rename = "filePath")]
    file_path: Option<String>,
    content: Option<String>,
    id: Option<CaptureId>,
    destination: Option<String>,
}

/// Handle a frame. May block on disk and on `git`.
pub fn handle_text(text: &str) -> Vec<InboundMessage> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            error!("Invalid JSON format received.");
            return vec![error_reply("Invalid JSON format.", None)];
        }
    };
    let request: RelayRequest = match serde_json::from_value(value) {
        Ok(r) => r,
        Err(e) => {
            warn!("Invalid message format: {}", e);
            return vec![error_reply("Invalid message format.", None)];
        }
    };

    if request.message_type.as_deref() == Some("SYNC") {
        return handle_sync(request);
    }
    match request.kind.as_deref() {
        None | Some("snippet") => vec![handle_capture(request, CaptureKind::Snippet)],
        Some("assistant") => vec![handle_capture(request, CaptureKind::Assistant)],
        Some(other) => {
            error!("Unknown message kind received: {}", other);
            vec![error_reply("Unknown message type.", request.id)]
        }
    }
}

fn handle_sync(request: RelayRequest) -> Vec<InboundMessage> {
    match request.destination.filter(|d| !d.trim().is_empty()) {
        Some(destination) => store::collect_file_pushes(&destination)
            .into_iter()
            .map(InboundMessage::FileContent)
            .collect(),
        None => {
            error!("SYNC message missing destination.");
            vec![error_reply("Missing destination in SYNC message.", None)]
        }
    }
}

fn handle_capture(request: RelayRequest, kind: CaptureKind) -> InboundMessage {
    let id = match request.id {
        Some(id) => id,
        None => {
            error!("{} message missing id.", kind);
            return error_reply("Missing snippet id.", None);
        }
    };
    let (file_path, content) = match (request.file_path, request.content) {
        (Some(p), Some(c)) if !p.is_empty() && !c.is_empty() => (p, c),
        _ => {
            error!("Invalid {} message format.", kind);
            return error_reply("Invalid message format.", Some(id));
        }
    };

    match store::save_capture(&file_path, &content, kind) {
        Ok(saved) => InboundMessage::Status(StatusReply::Success {
            id: Some(id),
            saved_path: Some(saved.to_string_lossy().to_string()),
        }),
        Err(e) => {
            error!("Error saving file {}: {}", file_path, e);
            error_reply("Failed to save file.", Some(id))
        }
    }
}

fn error_reply(message: &str, id: Option<CaptureId>) -> InboundMessage {
    InboundMessage::Status(StatusReply::Error {
        id,
        message: message.to_string(),
    })
}

/// Serialize a reply frame.
pub fn encode(message: &InboundMessage) -> coderelay_core::Result<String> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(replies: Vec<InboundMessage>) -> InboundMessage {
        assert_eq!(replies.len(), 1, "{:?}", replies);
        replies.into_iter().next().unwrap()
    }

    #[test]
    fn test_invalid_json() {
        let reply = single(handle_text("{not json"));
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"status": "error", "message": "Invalid JSON format."})
        );
    }

    #[test]
    fn test_snippet_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/file.txt");
        let frame = serde_json::json!({
            "kind": "snippet",
            "filePath": path.to_str().unwrap(),
            "content": "// out/file.txt\nhello",
            "id": 0,
        });

        let reply = single(handle_text(&frame.to_string()));
        assert_eq!(
            reply,
            InboundMessage::Status(StatusReply::Success {
                id: Some(CaptureId::Index(0)),
                saved_path: Some(path.to_string_lossy().to_string()),
            })
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn test_assistant_capture_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.html");
        let frame = serde_json::json!({
            "kind": "assistant",
            "filePath": path.to_str().unwrap(),
            "content": "<div>hi</div>",
            "id": "assistant-1-abc",
        });
        let reply = single(handle_text(&frame.to_string()));
        assert!(matches!(reply, InboundMessage::Status(StatusReply::Success { .. })));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<div>hi</div>");
    }

    #[test]
    fn test_capture_errors() {
        let missing_id = single(handle_text(r#"{"filePath":"/tmp/x","content":"a"}"#));
        assert_eq!(
            missing_id,
            InboundMessage::Status(StatusReply::Error {
                id: None,
                message: "Missing snippet id.".into()
            })
        );

        let missing_content = single(handle_text(r#"{"filePath":"/tmp/x","id":3}"#));
        assert_eq!(
            missing_content,
            InboundMessage::Status(StatusReply::Error {
                id: Some(CaptureId::Index(3)),
                message: "Invalid message format.".into()
            })
        );

        let unknown = single(handle_text(r#"{"kind":"video","id":1}"#));
        assert!(matches!(
            unknown,
            InboundMessage::Status(StatusReply::Error { ref message, .. }) if message == "Unknown message type."
        ));
    }

    #[test]
    fn test_sync_without_destination() {
        let reply = single(handle_text(r#"{"type":"SYNC"}"#));
        assert_eq!(
            reply,
            InboundMessage::Status(StatusReply::Error {
                id: None,
                message: "Missing destination in SYNC message.".into()
            })
        );
    }

    #[test]
    fn test_sync_outside_repository_pushes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let frame = serde_json::json!({"type": "SYNC", "destination": dir.path().to_str().unwrap()});
        assert!(handle_text(&frame.to_string()).is_empty());
    }
}
