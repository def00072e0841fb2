use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::cancel::{CancelFlag, Cancelled};
use crate::document::TextSource;
use crate::language::{LanguageDefinition, NOT_DEFINED_MISTAKE};
use crate::metrics::TimingGuard;
use crate::recognition::{Token, TokenType};

use super::mistake::{Mistake, MistakeCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Initial,
    Scan,
    Done,
}

/// The mistake detector.
///
/// Every [`scan`](MistakeSearch::scan) rebuilds the whole batch from the
/// tokens it is given; nothing carries over between passes.
#[derive(Debug)]
pub struct MistakeSearch<'a> {
    language: &'a LanguageDefinition,
    phase: SearchPhase,
    mistakes: Vec<Mistake>,
}

impl<'a> MistakeSearch<'a> {
    pub fn new(language: &'a LanguageDefinition) -> Self {
        Self {
            language,
            phase: SearchPhase::Initial,
            mistakes: Vec::new(),
        }
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn mistakes(&self) -> &[Mistake] {
        &self.mistakes
    }

    pub fn into_mistakes(self) -> Vec<Mistake> {
        self.mistakes
    }

    /// Walks `tokens` in order and flags every `NotDefined` token, skipping
    /// tokens whose position is already flagged. On cancellation the
    /// search returns to `Initial` with no mistakes.
    pub fn scan<'t, S, I>(
        &mut self,
        source: &S,
        tokens: I,
        cancel: &CancelFlag,
    ) -> Result<(), Cancelled>
    where
        S: TextSource + ?Sized,
        I: IntoIterator<Item = &'t Arc<Token>>,
    {
        let _timer = TimingGuard::new("mistake_search");
        self.phase = SearchPhase::Scan;
        self.mistakes.clear();

        let mut seen = FxHashSet::default();
        for token in tokens {
            if let Err(cancelled) = cancel.check() {
                self.phase = SearchPhase::Initial;
                self.mistakes.clear();
                return Err(cancelled);
            }
            if token.token_type() != TokenType::NotDefined || token.is_empty() {
                continue;
            }

            let (line, column) = source.line_column(token.start());
            if !seen.insert((line, column)) {
                continue;
            }
            self.mistakes.push(Mistake {
                sequence: self.mistakes.len() + 1,
                line,
                column,
                category: MistakeCategory::Error,
                description: self.language.describe_mistake(NOT_DEFINED_MISTAKE, token.content()),
                token: Arc::clone(token),
            });
        }

        self.phase = SearchPhase::Done;
        debug!(mistakes = self.mistakes.len(), "mistake search done");
        Ok(())
    }
}

/// Runs one complete mistake search.
pub fn find_mistakes<'t, S, I>(
    language: &LanguageDefinition,
    source: &S,
    tokens: I,
    cancel: &CancelFlag,
) -> Result<Vec<Mistake>, Cancelled>
where
    S: TextSource + ?Sized,
    I: IntoIterator<Item = &'t Arc<Token>>,
{
    let mut search = MistakeSearch::new(language);
    search.scan(source, tokens, cancel)?;
    Ok(search.into_mistakes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::{Classification, RecognitionEngine};
    use ropey::Rope;

    const LANGUAGE: &str = r#"{
        "name": "Test",
        "keywords": { "If": "if" },
        "startTokens": { "String": "\"", "Character": "'", "LineCommentary": "//", "BlockCommentary": "/*" },
        "endTokens": { "String": "\"", "Character": "'", "LineCommentary": "\n", "BlockCommentary": "*/" },
        "mistakeDescriptions": { "NotDefined": "Unknown word '{0}'" }
    }"#;

    #[test]
    fn test_flags_not_defined_tokens_in_order() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let text = Rope::from_str("if foo\n  bar if");
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&text, &CancelFlag::new())
            .unwrap();

        let mut search = MistakeSearch::new(&language);
        assert_eq!(search.phase(), SearchPhase::Initial);
        search.scan(&text, &tokens, &CancelFlag::new()).unwrap();
        assert_eq!(search.phase(), SearchPhase::Done);

        let mistakes = search.mistakes();
        assert_eq!(mistakes.len(), 2);
        assert_eq!(mistakes[0].to_string(), "1 1:4 Error Unknown word 'foo'");
        assert_eq!(mistakes[1].position(), (2, 3));
        assert_eq!(mistakes[1].sequence, 2);
    }

    #[test]
    fn test_same_position_is_reported_once() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let text = Rope::from_str("foo");
        let token = Arc::new(
            Token::extract(&text, 0)
                .unwrap()
                .with_classification(Classification::of(TokenType::NotDefined)),
        );
        let tokens = vec![Arc::clone(&token), Arc::clone(&token)];

        let mistakes = find_mistakes(&language, &text, &tokens, &CancelFlag::new()).unwrap();

        assert_eq!(mistakes.len(), 1);
        assert_eq!(mistakes[0].sequence, 1);
    }

    #[test]
    fn test_cancelled_search_reports_nothing() {
        let language = LanguageDefinition::from_json_str(LANGUAGE).unwrap();
        let text = Rope::from_str("foo bar");
        let tokens = RecognitionEngine::new(&language)
            .scan_document(&text, &CancelFlag::new())
            .unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut search = MistakeSearch::new(&language);
        assert_eq!(search.scan(&text, &tokens, &cancel), Err(Cancelled));
        assert_eq!(search.phase(), SearchPhase::Initial);
        assert!(search.mistakes().is_empty());
    }
}
