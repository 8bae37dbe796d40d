//! Where the capture pipeline looks on a chat page.

use serde::{Deserialize, Serialize};

use crate::dom::NodeQuery;

/// Attribute used to cache a generated response id on its node.
pub const UNIQUE_ID_ATTRIBUTE: &str = "data-unique-id";

/// Queries locating each kind of node the pipeline cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Nodes whose text is a candidate code snippet.
    pub code_block: NodeQuery,
    /// Assistant response containers.
    pub assistant_response: NodeQuery,
    /// Control that is present only while a response is being generated.
    pub stop_indicator: NodeQuery,
    /// Code containers that get a visibility toggle.
    pub collapsible_code: NodeQuery,
    /// Prompt input that SEND_TO_CHAT appends to.
    pub prompt_input: NodeQuery,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
}

fn default_id_attribute() -> String {
    UNIQUE_ID_ATTRIBUTE.to_string()
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            code_block: NodeQuery::tag("code"),
            assistant_response: NodeQuery::tag("div")
                .attr("data-message-author-role", "assistant"),
            stop_indicator: NodeQuery::tag("button").attr("data-testid", "stop-button"),
            collapsible_code: NodeQuery::tag("pre").class("overflow-visible"),
            prompt_input: NodeQuery::default().attr("id", "prompt-textarea"),
            id_attribute: default_id_attribute(),
        }
    }
}
