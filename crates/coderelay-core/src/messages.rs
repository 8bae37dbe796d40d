//! Message shapes exchanged between the page side, the router, the relay
//! endpoint and display subscribers.

use serde::{Deserialize, Serialize};

use crate::types::{CaptureId, CaptureKind, CaptureRecord, StatusSnapshot};

// ---------------------------------------------------------------
// Page side -> router (internal bus)
// ---------------------------------------------------------------

/// Event posted by the page-side detector to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusMessage {
    NewSnippets { snippets: Vec<CaptureRecord> },
    NewAssistantResponses { responses: Vec<CaptureRecord> },
    Sync,
    SendToChat { content: String },
    Alive,
}

impl BusMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewSnippets { .. } => "NEW_SNIPPETS",
            Self::NewAssistantResponses { .. } => "NEW_ASSISTANT_RESPONSES",
            Self::Sync => "SYNC",
            Self::SendToChat { .. } => "SEND_TO_CHAT",
            Self::Alive => "ALIVE",
        }
    }
}

/// Acknowledgement returned for every bus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
}

impl Ack {
    pub fn received() -> Self {
        Self {
            status: "received".to_string(),
        }
    }
}

/// Command pushed from the router back to a page session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageCommand {
    AppendPrompt { message: String },
}

// ---------------------------------------------------------------
// Router <-> relay endpoint (wire protocol)
// ---------------------------------------------------------------

/// A capture as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEnvelope {
    pub kind: CaptureKind,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
    pub id: CaptureId,
}

/// Marker for the `"type": "SYNC"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncTag {
    #[serde(rename = "SYNC")]
    Sync,
}

/// Frame sent from the router to the relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Sync {
        #[serde(rename = "type")]
        tag: SyncTag,
        destination: String,
    },
    Capture(CaptureEnvelope),
}

impl OutboundMessage {
    pub fn sync(destination: impl Into<String>) -> Self {
        Self::Sync {
            tag: SyncTag::Sync,
            destination: destination.into(),
        }
    }

    pub fn capture(record: &CaptureRecord, file_path: String) -> Self {
        Self::Capture(CaptureEnvelope {
            kind: record.kind(),
            file_path,
            content: record.content().to_string(),
            id: record.id().clone(),
        })
    }
}

/// Marker for the `"type": "FILE_CONTENT"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileContentTag {
    #[serde(rename = "FILE_CONTENT")]
    FileContent,
}

/// A file pushed by the relay endpoint (answer to SYNC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePush {
    #[serde(rename = "type")]
    pub tag: FileContentTag,
    #[serde(rename = "filePath")]
    pub file_path: String,
    pub content: String,
}

impl FilePush {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tag: FileContentTag::FileContent,
            file_path: file_path.into(),
            content: content.into(),
        }
    }
}

/// Outcome reported by the relay endpoint for a previously sent capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusReply {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<CaptureId>,
        #[serde(rename = "savedPath", default, skip_serializing_if = "Option::is_none")]
        saved_path: Option<String>,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<CaptureId>,
        message: String,
    },
}

/// Frame received from the relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    FileContent(FilePush),
    Status(StatusReply),
}

// ---------------------------------------------------------------
// Router -> display subscribers
// ---------------------------------------------------------------

/// Display-oriented view of a capture record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySnippet {
    pub id: CaptureId,
    pub kind: CaptureKind,
    pub content: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// Event pushed to every display subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayEvent {
    StatusUpdate {
        status: StatusSnapshot,
    },
    DisplaySnippet {
        snippet: DisplaySnippet,
    },
    DisplayFile {
        #[serde(rename = "filePath")]
        file_path: String,
        content: String,
    },
}
