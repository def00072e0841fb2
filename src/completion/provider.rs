//! Prefix completion for the word being typed
//!
//! Candidates come from two places, in this order:
//! 1. Variables already in the token list (first occurrence order, no duplicates)
//! 2. Keywords, value types and commands of the language (definition order)
//!
//! Matching is a case-insensitive prefix test. Nothing is ranked: the first
//! candidate is the default selection.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::cancel::{CancelFlag, Cancelled};
use crate::language::{LanguageDefinition, Vocabulary};
use crate::metrics::TimingGuard;
use crate::recognition::{Token, TokenType};

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionSource {
    Variable,
    Keyword,
    ValueType,
    Command,
}

impl fmt::Display for SuggestionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionSource::Variable => "Variable",
            SuggestionSource::Keyword => "Keyword",
            SuggestionSource::ValueType => "ValueType",
            SuggestionSource::Command => "Command",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub source: SuggestionSource,
}

pub struct SuggestionProvider<'a> {
    language: &'a LanguageDefinition,
    limit: Option<usize>,
}

impl<'a> SuggestionProvider<'a> {
    pub fn new(language: &'a LanguageDefinition) -> Self {
        Self {
            language,
            limit: None,
        }
    }

    /// Caps the number of suggestions returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Suggestions for the token being edited. Only an unclassified,
    /// non-empty word gets any.
    pub fn suggest<'t, I>(
        &self,
        edited: &Token,
        tokens: I,
        cancel: &CancelFlag,
    ) -> Result<Vec<Suggestion>, Cancelled>
    where
        I: IntoIterator<Item = &'t Arc<Token>>,
    {
        if edited.token_type() != TokenType::NotDefined || edited.is_empty() {
            return Ok(Vec::new());
        }
        self.complete(edited.content(), tokens, cancel)
    }

    /// All candidates starting with `prefix`.
    pub fn complete<'t, I>(
        &self,
        prefix: &str,
        tokens: I,
        cancel: &CancelFlag,
    ) -> Result<Vec<Suggestion>, Cancelled>
    where
        I: IntoIterator<Item = &'t Arc<Token>>,
    {
        let _timer = TimingGuard::new("suggest");
        let prefix = prefix.to_lowercase();
        let limit = self.limit.unwrap_or(usize::MAX);
        let mut suggestions = Vec::new();

        let mut seen = FxHashSet::default();
        for token in tokens {
            cancel.check()?;
            if suggestions.len() >= limit {
                return Ok(suggestions);
            }
            if token.token_type() == TokenType::Variable
                && matches_prefix(token.content(), &prefix)
                && seen.insert(token.content())
            {
                suggestions.push(Suggestion {
                    text: token.content().to_string(),
                    source: SuggestionSource::Variable,
                });
            }
        }

        let vocabularies: [(&Vocabulary, SuggestionSource); 3] = [
            (self.language.keywords(), SuggestionSource::Keyword),
            (self.language.value_types(), SuggestionSource::ValueType),
            (self.language.commands(), SuggestionSource::Command),
        ];
        for (vocabulary, source) in vocabularies {
            cancel.check()?;
            suggestions.extend(
                vocabulary
                    .surfaces()
                    .filter(|surface| matches_prefix(surface, &prefix))
                    .map(|surface| Suggestion {
                        text: surface.to_string(),
                        source,
                    }),
            );
        }

        suggestions.truncate(limit);
        Ok(suggestions)
    }
}

fn matches_prefix(candidate: &str, lowercase_prefix: &str) -> bool {
    candidate.to_lowercase().starts_with(lowercase_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::{RecognitionEngine, TokenList};
    use ropey::Rope;

    const LANGUAGE: &str = r#"{
        "name": "Test",
        "keywords": { "Continue": "continue", "If": "if" },
        "valueTypes": { "Integer": "integer", "Char": "Char" },
        "commands": { "Console": "console", "Print": "print" },
        "startTokens": { "String": "\"", "Character": "'", "LineCommentary": "//", "BlockCommentary": "/*" },
        "endTokens": { "String": "\"", "Character": "'", "LineCommentary": "\n", "BlockCommentary": "*/" }
    }"#;

    fn texts(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_variables_come_before_vocabulary() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let text = Rope::from_str("integer count\ninteger cost\ncount = cost\nco");
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&text, &CancelFlag::new())
            .unwrap();
        let edited = tokens.iter().last().unwrap();
        assert_eq!(edited.token_type(), TokenType::NotDefined);

        let suggestions = SuggestionProvider::new(&language)
            .suggest(edited, &tokens, &CancelFlag::new())
            .unwrap();

        assert_eq!(texts(&suggestions), vec!["count", "cost", "continue", "console"]);
        assert_eq!(suggestions[0].source, SuggestionSource::Variable);
        assert_eq!(suggestions[3].source, SuggestionSource::Command);
    }

    #[test]
    fn test_prefix_match_ignores_case() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let suggestions = SuggestionProvider::new(&language)
            .complete("cH", &TokenList::new(), &CancelFlag::new())
            .unwrap();

        assert_eq!(texts(&suggestions), vec!["Char"]);
    }

    #[test]
    fn test_classified_token_gets_no_suggestions() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let text = Rope::from_str("if");
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&text, &CancelFlag::new())
            .unwrap();

        let suggestions = SuggestionProvider::new(&language)
            .suggest(tokens.get(0).unwrap(), &tokens, &CancelFlag::new())
            .unwrap();

        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_limit() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let suggestions = SuggestionProvider::new(&language)
            .with_limit(1)
            .complete("c", &TokenList::new(), &CancelFlag::new())
            .unwrap();

        assert_eq!(texts(&suggestions), vec!["continue"]);
    }
}
