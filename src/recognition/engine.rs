use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::cancel::{CancelFlag, Cancelled};
use crate::document::{DocumentError, TextBuffer, TextEdit, TextSource};
use crate::language::LanguageDefinition;
use crate::metrics::{TimingGuard, metrics};

use super::classify::classify;
use super::token::{Token, TokenType};
use super::token_list::TokenList;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognitionError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Tokens whose classification changed during one operation, keyed by start.
#[derive(Debug, Default)]
struct Changes {
    by_start: BTreeMap<usize, Arc<Token>>,
}

impl Changes {
    fn record(&mut self, token: Arc<Token>) {
        self.by_start.insert(token.start(), token);
    }

    /// Changed tokens still present in `tokens`, in list order.
    fn into_vec(self, tokens: &TokenList) -> Vec<Arc<Token>> {
        self.by_start
            .into_values()
            .filter(|token| {
                tokens
                    .index_of(token.start())
                    .and_then(|index| tokens.get(index))
                    .is_some_and(|current| Arc::ptr_eq(current, token))
            })
            .collect()
    }
}

/// Keeps a [`TokenList`] in step with its text under one language.
///
/// The engine holds no state of its own: callers own the buffer and the
/// list and pass them in, which lets a session swap languages or run
/// whole-document passes over copies.
#[derive(Debug, Clone, Copy)]
pub struct RecognitionEngine<'a> {
    language: &'a LanguageDefinition,
}

impl<'a> RecognitionEngine<'a> {
    pub fn new(language: &'a LanguageDefinition) -> Self {
        Self { language }
    }

    pub fn language(&self) -> &'a LanguageDefinition {
        self.language
    }

    /// Re-extracts and re-classifies the word at `offset`, propagating the
    /// change to following tokens. Returns every token whose classification
    /// changed, the recognised token first among equals by position.
    pub fn recognize_at<S: TextSource + ?Sized>(
        &self,
        source: &S,
        tokens: &mut TokenList,
        offset: usize,
    ) -> Result<Vec<Arc<Token>>, RecognitionError> {
        let _timer = TimingGuard::new("recognize");
        let word = Token::extract(source, offset)?;
        if word.is_empty() {
            trace!(offset, "no word at offset");
            return Ok(Vec::new());
        }

        let mut changes = Changes::default();
        self.settle(source, tokens, word, &mut changes);
        Ok(changes.into_vec(tokens))
    }

    /// Applies `edit` to `buffer` and updates `tokens` to match.
    ///
    /// Nothing is touched when the edit is out of bounds. Tokens touching
    /// the replaced range are dropped, later tokens are shifted, and every
    /// word intersecting the inserted text is recognised. An edit that
    /// empties the buffer clears the list.
    pub fn apply_edit(
        &self,
        buffer: &mut TextBuffer,
        tokens: &mut TokenList,
        edit: &TextEdit,
    ) -> Result<Vec<Arc<Token>>, RecognitionError> {
        buffer.check(edit)?;
        if edit.is_noop() {
            return Ok(Vec::new());
        }
        let _timer = TimingGuard::new("apply_edit");

        tokens.remove_touching(edit.offset, edit.removed_end());
        tokens.shift_from(edit.removed_end(), edit.delta());
        buffer.apply(edit)?;

        if buffer.is_empty() {
            debug!("buffer emptied, clearing token list");
            tokens.clear();
            return Ok(Vec::new());
        }

        let mut changes = Changes::default();
        let inserted_end = edit.inserted_end();
        let len = buffer.len_chars();
        let mut cursor = edit.offset;
        loop {
            let word = Token::extract(&*buffer, cursor)?;
            let next = if word.is_empty() {
                cursor
            } else {
                let end = word.end();
                self.settle(&*buffer, tokens, word, &mut changes);
                end
            };
            cursor = buffer.skip_whitespace(next);
            if cursor > inserted_end || cursor >= len {
                break;
            }
        }

        // Followers of a removed or whitespace-split word may depend on it.
        let from = tokens.first_index_from(edit.offset);
        self.propagate(&*buffer, tokens, from, &mut changes);

        debug_assert!(tokens.is_consistent());
        Ok(changes.into_vec(tokens))
    }

    /// Builds the token list for `source` from scratch, word by word.
    pub fn scan_document<S: TextSource + ?Sized>(
        &self,
        source: &S,
        cancel: &CancelFlag,
    ) -> Result<TokenList, Cancelled> {
        let _timer = TimingGuard::new("scan_document");
        let mut tokens = TokenList::new();
        let len = source.len_chars();
        let mut cursor = source.skip_whitespace(0);

        while cursor < len {
            cancel.check()?;
            let end = source.word_end(cursor);
            let word = Token::unclassified(cursor, end, source.text_between(cursor, end));
            let previous = tokens.as_slice().last().map(|t| t.as_ref());
            let classification = classify(self.language, &tokens, source, &word, previous);
            tokens.push(Arc::new(word.with_classification(classification)));
            metrics().record_token_recognized();
            cursor = source.skip_whitespace(end);
        }

        debug!(tokens = tokens.len(), "scanned document");
        Ok(tokens)
    }

    /// Re-classifies every token of `tokens` in order under this engine's
    /// language. Returns the new list and the tokens whose classification
    /// changed.
    pub fn reclassify_all<S: TextSource + ?Sized>(
        &self,
        source: &S,
        tokens: &TokenList,
        cancel: &CancelFlag,
    ) -> Result<(TokenList, Vec<Arc<Token>>), Cancelled> {
        let _timer = TimingGuard::new("reclassify_all");
        let mut reclassified = TokenList::new();
        let mut changed = Vec::new();

        for token in tokens {
            cancel.check()?;
            let previous = reclassified.as_slice().last().map(|t| t.as_ref());
            let classification = classify(self.language, &reclassified, source, token, previous);
            if classification == token.classification() {
                reclassified.push(Arc::clone(token));
            } else {
                let updated = Arc::new(token.with_classification(classification));
                changed.push(Arc::clone(&updated));
                reclassified.push(updated);
            }
        }

        debug!(
            language = self.language.name(),
            tokens = reclassified.len(),
            changed = changed.len(),
            "re-classified token list"
        );
        Ok((reclassified, changed))
    }

    /// Inserts a freshly extracted word, classifies it, and propagates.
    fn settle<S: TextSource + ?Sized>(
        &self,
        source: &S,
        tokens: &mut TokenList,
        word: Token,
        changes: &mut Changes,
    ) {
        let word = Arc::new(word);
        let (index, removed) = tokens.insert(Arc::clone(&word));
        if !removed.is_empty() {
            trace!(removed = removed.len(), start = word.start(), "dropped stale tokens");
        }

        let previous = index.checked_sub(1).and_then(|i| tokens.get(i)).map(|t| t.as_ref());
        let classification = classify(self.language, tokens, source, &word, previous);
        let token = Arc::new(word.with_classification(classification));
        tokens.replace_at(index, Arc::clone(&token));
        changes.record(token);
        metrics().record_token_recognized();

        self.propagate(source, tokens, index + 1, changes);
    }

    /// Re-classifies tokens from `from` onwards. Every token inside the span
    /// opened by an earlier token is revisited; past it, the walk stops at
    /// the first token whose classification did not change.
    fn propagate<S: TextSource + ?Sized>(
        &self,
        source: &S,
        tokens: &mut TokenList,
        from: usize,
        changes: &mut Changes,
    ) {
        let mut boundary = from
            .checked_sub(1)
            .map_or(0, |previous| self.span_end(source, tokens, previous));
        let mut index = from;

        while let Some(current) = tokens.get(index).cloned() {
            let previous = index.checked_sub(1).and_then(|i| tokens.get(i)).map(|t| t.as_ref());
            let classification = classify(self.language, tokens, source, &current, previous);

            if classification != current.classification() {
                let updated = Arc::new(current.with_classification(classification));
                tokens.replace_at(index, Arc::clone(&updated));
                changes.record(updated);
                metrics().record_propagated();
            } else if current.start() >= boundary {
                break;
            }

            if current.end() >= boundary {
                boundary = boundary.max(self.span_end(source, tokens, index));
            }
            index += 1;
        }

        if index > from {
            debug!(from, to = index, boundary, "propagated re-classification");
        }
    }

    /// Offset up to which the classification of followers depends on the
    /// token at `index`.
    fn span_end<S: TextSource + ?Sized>(
        &self,
        source: &S,
        tokens: &TokenList,
        index: usize,
    ) -> usize {
        let Some(token) = tokens.get(index) else {
            return 0;
        };
        let delimiters = self.language.delimiters();

        let closer = if token.is_open_block() {
            &delimiters.block_commentary.end
        } else if token.is_open_string() {
            &delimiters.string.end
        } else if token.token_type() == TokenType::LineCommentary {
            return source.line_end(token.start());
        } else {
            return token.end();
        };

        tokens.as_slice()[index + 1..]
            .iter()
            .find(|t| t.content().ends_with(closer.as_str()))
            .map_or(source.len_chars(), |t| t.end())
    }
}
