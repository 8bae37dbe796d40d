//! Shared data model: capture records, transport state, status snapshots.

use serde::{Deserialize, Serialize};

/// Identifier of a capture record.
///
/// Code snippets are identified by their position among the page's code
/// nodes; assistant responses carry a key cached on the DOM node. Uniqueness
/// only holds within one page session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureId {
    Index(u64),
    Key(String),
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{}", i),
            Self::Key(k) => write!(f, "{}", k),
        }
    }
}

impl From<u64> for CaptureId {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for CaptureId {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for CaptureId {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// Which capture stream a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    #[default]
    Snippet,
    Assistant,
}

impl CaptureKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Snippet => "snippet",
            Self::Assistant => "assistant",
        }
    }

    /// Extension used when a record carries no path of its own.
    pub fn fallback_extension(&self) -> &'static str {
        match self {
            Self::Snippet => "txt",
            Self::Assistant => "html",
        }
    }
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One extracted unit of page content. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    id: CaptureId,
    #[serde(default)]
    kind: CaptureKind,
    content: String,
    #[serde(rename = "filePath", default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

impl CaptureRecord {
    pub fn new(
        id: impl Into<CaptureId>,
        kind: CaptureKind,
        content: impl Into<String>,
        file_path: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            content: content.into(),
            file_path,
        }
    }

    pub fn snippet(id: impl Into<CaptureId>, content: impl Into<String>) -> Self {
        Self::new(id, CaptureKind::Snippet, content, None)
    }

    pub fn assistant(id: impl Into<CaptureId>, content: impl Into<String>) -> Self {
        Self::new(id, CaptureKind::Assistant, content, None)
    }

    pub fn id(&self) -> &CaptureId {
        &self.id
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    /// Same record re-labelled for another stream.
    pub fn into_kind(self, kind: CaptureKind) -> Self {
        Self { kind, ..self }
    }

    /// Path relative to the destination: the recovered path, or `<id>.<ext>`.
    pub fn relative_path(&self) -> String {
        match &self.file_path {
            Some(path) => path.clone(),
            None => format!("{}.{}", self.id, self.kind.fallback_extension()),
        }
    }
}

/// Connection state of the relay transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Aggregated liveness pushed to display subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "sourceActive")]
    pub source_active: bool,
    #[serde(rename = "relayActive")]
    pub relay_active: bool,
    pub transport: TransportState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_fallback() {
        let snippet = CaptureRecord::snippet(3, "a\nb");
        assert_eq!(snippet.relative_path(), "3.txt");

        let response = CaptureRecord::assistant("assistant-1-abc", "<div></div>");
        assert_eq!(response.relative_path(), "assistant-1-abc.html");

        let with_path =
            CaptureRecord::new(0, CaptureKind::Snippet, "x", Some("src/a.ts".to_string()));
        assert_eq!(with_path.relative_path(), "src/a.ts");
    }

    #[test]
    fn test_capture_id_serializes_untagged() {
        assert_eq!(serde_json::to_value(CaptureId::Index(4)).unwrap(), 4);
        assert_eq!(
            serde_json::to_value(CaptureId::from("k-1")).unwrap(),
            "k-1"
        );
        let parsed: CaptureId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, CaptureId::Index(7));
    }

    #[test]
    fn test_status_snapshot_shape() {
        let snapshot = StatusSnapshot {
            source_active: true,
            relay_active: true,
            transport: TransportState::Disconnected,
        };
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["sourceActive"], true);
        assert_eq!(json["relayActive"], true);
        assert_eq!(json["transport"], "disconnected");
    }
}
