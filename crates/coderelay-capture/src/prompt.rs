//! Applying router commands to the page.

use tracing::{info, warn};

use coderelay_core::PageCommand;

use crate::dom::Document;
use crate::selectors::PageSelectors;

/// Append `message` to the prompt input, one `<br>` before each line.
/// Returns false when the page has no prompt input.
pub fn append_prompt<D: Document + ?Sized>(
    doc: &mut D,
    selectors: &PageSelectors,
    message: &str,
) -> bool {
    let prompt = match doc.query_all(&selectors.prompt_input).first() {
        Some(node) => *node,
        None => {
            warn!("Prompt input not found; dropping appended prompt");
            return false;
        }
    };
    for line in message.split('\n') {
        doc.append_element(prompt, "br");
        if !line.is_empty() {
            doc.append_text(prompt, line);
        }
    }
    true
}

/// Apply one router command to the page.
pub fn apply_command<D: Document + ?Sized>(
    doc: &mut D,
    selectors: &PageSelectors,
    command: PageCommand,
) -> bool {
    match command {
        PageCommand::AppendPrompt { message } => {
            info!("APPEND_PROMPT received ({} chars)", message.len());
            append_prompt(doc, selectors, &message)
        }
    }
}
