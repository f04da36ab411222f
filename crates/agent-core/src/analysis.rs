use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Element statistics of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementCounts {
    pub total_elements: usize,
    pub clickable_elements: usize,
    pub form_elements: usize,
    pub interactive_elements: usize,
}

/// DOM-analysis collaborator. Optional: planning works without one.
pub trait MarkupAnalyzer: Send + Sync {
    fn analyze_markup(&self, markup: &str) -> Result<ElementCounts, AgentError>;
}
