use std::fmt;
use std::sync::Arc;

use crate::recognition::Token;

/// Mistake severity. Recognition only raises `Error`, for undefined tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MistakeCategory {
    Error,
    Warning,
    Info,
}

impl MistakeCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            MistakeCategory::Error => "Error",
            MistakeCategory::Warning => "Warning",
            MistakeCategory::Info => "Info",
        }
    }
}

impl fmt::Display for MistakeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reported mistake.
///
/// The token is shared with the token list snapshot the search ran over;
/// a mistake never outlives the relevance of that snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mistake {
    /// 1-based, in token order.
    pub sequence: usize,
    /// 1-based line of the token start.
    pub line: usize,
    /// 1-based column of the token start, in chars.
    pub column: usize,
    pub category: MistakeCategory,
    pub description: String,
    pub token: Arc<Token>,
}

impl Mistake {
    /// `(line, column)` position of the mistake.
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

impl fmt::Display for Mistake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} {} {}",
            self.sequence, self.line, self.column, self.category, self.description
        )
    }
}
