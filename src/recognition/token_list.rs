use std::sync::Arc;

use super::token::{Token, TokenType};

/// The ordered token list of one open document.
///
/// Tokens are kept strictly ordered by start offset with no overlapping
/// spans. Cloning is O(1): the backing vector is shared until one of the
/// copies is mutated, so snapshots handed to background passes never see a
/// half-applied edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: Arc<Vec<Arc<Token>>>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Token>> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Token>> {
        self.tokens.iter()
    }

    pub fn as_slice(&self) -> &[Arc<Token>] {
        &self.tokens
    }

    fn tokens_mut(&mut self) -> &mut Vec<Arc<Token>> {
        Arc::make_mut(&mut self.tokens)
    }

    /// Inserts `token` at its sorted position, removing every stale token
    /// that overlaps it or touches one of its ends. Returns the insertion
    /// index and the removed tokens.
    pub fn insert(&mut self, token: Arc<Token>) -> (usize, Vec<Arc<Token>>) {
        let lo = self.tokens.partition_point(|t| t.end() < token.start());
        let hi = self.tokens.partition_point(|t| t.start() <= token.end());
        let tokens = self.tokens_mut();
        if lo >= hi {
            tokens.insert(lo, token);
            return (lo, Vec::new());
        }
        let removed = tokens.splice(lo..hi, std::iter::once(token)).collect();
        (lo, removed)
    }

    /// Appends a token that starts after the current last one.
    pub(crate) fn push(&mut self, token: Arc<Token>) {
        debug_assert!(self.tokens.last().is_none_or(|last| last.end() <= token.start()));
        self.tokens_mut().push(token);
    }

    /// Swaps the token at `index` for a re-classified copy of itself.
    pub(crate) fn replace_at(&mut self, index: usize, token: Arc<Token>) {
        if let Some(slot) = self.tokens_mut().get_mut(index) {
            debug_assert_eq!(slot.span(), token.span());
            *slot = token;
        }
    }

    /// Removes every token intersecting or touching `start..=end`.
    pub fn remove_touching(&mut self, start: usize, end: usize) -> Vec<Arc<Token>> {
        let lo = self.tokens.partition_point(|t| t.end() < start);
        let hi = self.tokens.partition_point(|t| t.start() <= end);
        if lo >= hi {
            return Vec::new();
        }
        self.tokens_mut().drain(lo..hi).collect()
    }

    /// Moves every token starting at or after `offset` by `delta` chars.
    pub fn shift_from(&mut self, offset: usize, delta: isize) {
        if delta == 0 {
            return;
        }
        let from = self.first_index_from(offset);
        if from == self.tokens.len() {
            return;
        }
        for slot in &mut self.tokens_mut()[from..] {
            *slot = Arc::new(slot.shifted(delta));
        }
    }

    pub fn clear(&mut self) {
        if !self.tokens.is_empty() {
            self.tokens = Arc::default();
        }
    }

    /// Index of the first token starting at or after `offset`.
    pub fn first_index_from(&self, offset: usize) -> usize {
        self.tokens.partition_point(|t| t.start() < offset)
    }

    /// Index of the token starting exactly at `start`.
    pub fn index_of(&self, start: usize) -> Option<usize> {
        self.tokens.binary_search_by_key(&start, |t| t.start()).ok()
    }

    /// Nearest token starting before `start`.
    pub fn preceding(&self, start: usize) -> Option<&Arc<Token>> {
        self.first_index_from(start)
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
    }

    /// Token containing `offset`, or touching it at either edge.
    pub fn token_at(&self, offset: usize) -> Option<&Arc<Token>> {
        let index = self.tokens.partition_point(|t| t.end() < offset);
        self.tokens.get(index).filter(|t| t.touches(offset))
    }

    /// Some other Variable token with the given content.
    pub fn variable_named(&self, content: &str, excluding_start: usize) -> Option<&Arc<Token>> {
        self.tokens.iter().find(|t| {
            t.token_type() == TokenType::Variable
                && t.start() != excluding_start
                && t.content() == content
        })
    }

    /// True when starts strictly increase and no two spans overlap.
    pub fn is_consistent(&self) -> bool {
        self.tokens
            .windows(2)
            .all(|pair| pair[0].start() < pair[1].start() && pair[0].end() <= pair[1].start())
            && self.tokens.iter().all(|t| t.start() < t.end())
    }

    /// True when `other` shares this list's storage, i.e. neither has been
    /// mutated since one was cloned from the other.
    pub fn shares_storage_with(&self, other: &TokenList) -> bool {
        Arc::ptr_eq(&self.tokens, &other.tokens)
    }
}

impl<'a> IntoIterator for &'a TokenList {
    type Item = &'a Arc<Token>;
    type IntoIter = std::slice::Iter<'a, Arc<Token>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
