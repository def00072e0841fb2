pub mod provider;

pub use provider::{Suggestion, SuggestionProvider, SuggestionSource};
