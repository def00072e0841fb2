use std::sync::Arc;

use crate::completion::Suggestion;
use crate::diagnostics::Mistake;
use crate::recognition::Token;

/// Notifications broadcast to session subscribers (highlighter, mistake
/// list, completion popup).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Tokens whose classification changed, in document order.
    TokensChanged {
        version: u64,
        changed: Vec<Arc<Token>>,
    },
    /// A complete replacement of the mistake batch.
    MistakesUpdated {
        version: u64,
        mistakes: Vec<Mistake>,
    },
    SuggestionsUpdated {
        version: u64,
        offset: usize,
        suggestions: Vec<Suggestion>,
    },
    LanguageChanged {
        version: u64,
        language: String,
    },
    /// The document became empty; tokens and mistakes are reset.
    Cleared { version: u64 },
}

impl SessionEvent {
    pub fn version(&self) -> u64 {
        match self {
            SessionEvent::TokensChanged { version, .. }
            | SessionEvent::MistakesUpdated { version, .. }
            | SessionEvent::SuggestionsUpdated { version, .. }
            | SessionEvent::LanguageChanged { version, .. }
            | SessionEvent::Cleared { version } => *version,
        }
    }
}
