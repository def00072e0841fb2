use std::sync::Arc;

use ropey::Rope;

use crate::document::TextSource;
use crate::language::LanguageDefinition;
use crate::recognition::{Token, TokenList};

/// Immutable view of the document after one committed mutation.
///
/// Text and tokens share storage with the writer's copies until the writer
/// mutates them, so taking a snapshot is O(1).
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    /// Incremented by every committed mutation.
    pub version: u64,
    pub language: Arc<LanguageDefinition>,
    pub text: Rope,
    pub tokens: TokenList,
}

impl DocumentSnapshot {
    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    /// Token at or touching `offset`.
    pub fn token_at(&self, offset: usize) -> Option<&Arc<Token>> {
        self.tokens.token_at(offset)
    }

    /// 1-based line and column of `offset`.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        self.text.line_column(offset)
    }
}
