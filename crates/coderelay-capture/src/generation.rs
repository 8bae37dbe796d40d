//! Generation state tracking: detects the "just finished generating" edge.

use serde::Serialize;

use crate::dom::Document;
use crate::selectors::PageSelectors;

/// Phase of the chat page as seen through the stop indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationPhase {
    /// No stop indicator on the page.
    Stopped,
    /// Stop indicator present: a response is being generated.
    Running,
}

impl GenerationPhase {
    pub fn from_indicator(indicator_present: bool) -> Self {
        if indicator_present {
            Self::Running
        } else {
            Self::Stopped
        }
    }
}

/// True exactly when the indicator was present and now is not.
pub fn detect_edge(previous_indicator: bool, current_indicator: bool) -> bool {
    previous_indicator && !current_indicator
}

/// Reads the stop indicator from the document.
pub fn check_stopped<D: Document + ?Sized>(doc: &D, selectors: &PageSelectors) -> bool {
    doc.exists(&selectors.stop_indicator)
}

/// One-step memory of the stop indicator.
///
/// Only the previous sample is kept, so two transitions inside one mutation
/// batch collapse into whatever the before/after pair shows.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationTracker {
    previous_stopped: bool,
}

impl GenerationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current indicator sample. Returns true on the finished edge.
    pub fn observe(&mut self, current_stopped: bool) -> bool {
        let finished = detect_edge(self.previous_stopped, current_stopped);
        self.previous_stopped = current_stopped;
        finished
    }

    pub fn phase(&self) -> GenerationPhase {
        GenerationPhase::from_indicator(self.previous_stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Dom;

    #[test]
    fn test_detect_edge_truth_table() {
        assert!(detect_edge(true, false));
        assert!(!detect_edge(false, false));
        assert!(!detect_edge(false, true));
        assert!(!detect_edge(true, true));
    }

    #[test]
    fn test_tracker_fires_once_per_stop() {
        let mut tracker = GenerationTracker::new();
        assert_eq!(tracker.phase(), GenerationPhase::Stopped);

        assert!(!tracker.observe(true));
        assert_eq!(tracker.phase(), GenerationPhase::Running);
        assert!(!tracker.observe(true));
        assert!(tracker.observe(false));
        assert!(!tracker.observe(false));
        assert_eq!(tracker.phase(), GenerationPhase::Stopped);
    }

    #[test]
    fn test_check_stopped_reads_indicator() {
        let selectors = PageSelectors::default();
        let mut dom = Dom::new();
        assert!(!check_stopped(&dom, &selectors));

        let button = dom.append(dom.body(), "button", &[("data-testid", "stop-button")]);
        assert!(check_stopped(&dom, &selectors));

        dom.remove(button);
        assert!(!check_stopped(&dom, &selectors));
    }
}
