//! coderelay capture: the page-side detector.
//!
//! Watches a chat page for finished generations, extracts code snippets and
//! assistant responses, and posts the ones not yet sent to the router.
//!
//! The `coderelay` binary runs it in process through its `embed` module for
//! hosts that own the page; pages living elsewhere talk `/api/page` instead.

pub mod dom;
pub mod extractor;
pub mod generation;
pub mod prompt;
pub mod selectors;
pub mod session;
pub mod watcher;

pub use dom::{Document, Dom, MutationBatch, NodeId, NodeQuery};
pub use extractor::{extract_path, split_path_header, Extractor};
pub use generation::{check_stopped, detect_edge, GenerationPhase, GenerationTracker};
pub use selectors::PageSelectors;
pub use session::{PageInput, PageSession};
pub use watcher::{BatchOutcome, MutationWatcher, ToggleHook};
