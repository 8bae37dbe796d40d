//! Content extraction: code snippets and assistant responses.
//!
//! A scan re-reads the whole live document every time; deduplication is the
//! caller's job (see [`coderelay_core::DeliveryLedger`]).

use tracing::debug;

pub use coderelay_core::paths::{extract_path, split_path_header};
use coderelay_core::{CaptureKind, CaptureRecord};

use crate::dom::Document;
use crate::selectors::PageSelectors;

/// Reads capture records out of a [`Document`].
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    selectors: PageSelectors,
}

impl Extractor {
    pub fn new(selectors: PageSelectors) -> Self {
        Self { selectors }
    }

    pub fn selectors(&self) -> &PageSelectors {
        &self.selectors
    }

    /// Multi-line code nodes, identified by their position among all code
    /// nodes on the page.
    pub fn scan_snippets<D: Document + ?Sized>(&self, doc: &D) -> Vec<CaptureRecord> {
        let mut snippets = Vec::new();
        for (index, node) in doc.query_all(&self.selectors.code_block).into_iter().enumerate() {
            let text = doc.text_content(node);
            if !text.contains('\n') {
                continue;
            }
            let (file_path, content) = split_path_header(&text);
            debug!(
                "Code snippet detected: ID {} (path: {})",
                index,
                file_path.as_deref().unwrap_or("-")
            );
            snippets.push(CaptureRecord::new(
                index as u64,
                CaptureKind::Snippet,
                content,
                file_path,
            ));
        }
        debug!("Total snippets extracted: {}", snippets.len());
        snippets
    }

    /// Assistant response containers, serialized as markup. Each node gets a
    /// stable id cached in an attribute on first sight.
    pub fn scan_responses<D: Document + ?Sized>(&self, doc: &mut D) -> Vec<CaptureRecord> {
        let mut responses = Vec::new();
        for node in doc.query_all(&self.selectors.assistant_response) {
            let id = match doc.attribute(node, &self.selectors.id_attribute) {
                Some(id) => id,
                None => {
                    let id = generate_id(CaptureKind::Assistant);
                    doc.set_attribute(node, &self.selectors.id_attribute, &id);
                    id
                }
            };
            let markup = doc.outer_html(node);
            let markup = markup.trim();
            if markup.is_empty() {
                continue;
            }
            debug!("Assistant response detected: ID {}", id);
            responses.push(CaptureRecord::assistant(id, markup));
        }
        debug!("Total assistant responses extracted: {}", responses.len());
        responses
    }
}

/// `kind-timestamp-random` identifier.
fn generate_id(kind: CaptureKind) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        kind.name(),
        chrono::Utc::now().timestamp_millis(),
        &random[..8]
    )
}
