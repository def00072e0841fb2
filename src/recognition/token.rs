//! Classified spans of document text
//!
//! A [`Token`] is one maximal run of non-whitespace chars together with the
//! classification it received. Tokens are immutable: re-classification and
//! offset shifts produce new values, and the token list swaps them in.

use std::fmt;
use std::ops::Range;

use crate::document::{DocumentError, TextSource};

/// Semantic kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TokenType {
    #[default]
    NotDefined,
    Keyword,
    Command,
    ValueType,
    Variable,
    Value,
    BlockCommentary,
    LineCommentary,
    Operator,
    SpecialSyntax,
}

impl TokenType {
    pub const ALL: [TokenType; 10] = [
        TokenType::NotDefined,
        TokenType::Keyword,
        TokenType::Command,
        TokenType::ValueType,
        TokenType::Variable,
        TokenType::Value,
        TokenType::BlockCommentary,
        TokenType::LineCommentary,
        TokenType::Operator,
        TokenType::SpecialSyntax,
    ];

    /// Classification name, as used by the `colors` table.
    pub const fn as_str(self) -> &'static str {
        match self {
            TokenType::NotDefined => "NotDefined",
            TokenType::Keyword => "Keyword",
            TokenType::Command => "Command",
            TokenType::ValueType => "ValueType",
            TokenType::Variable => "Variable",
            TokenType::Value => "Value",
            TokenType::BlockCommentary => "BlockCommentary",
            TokenType::LineCommentary => "LineCommentary",
            TokenType::Operator => "Operator",
            TokenType::SpecialSyntax => "SpecialSyntax",
        }
    }

    pub fn is_commentary(self) -> bool {
        matches!(self, TokenType::BlockCommentary | TokenType::LineCommentary)
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value category of a `Value` or `Variable` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    #[default]
    None,
    Boolean,
    Character,
    Float,
    Integer,
    String,
    UserDefined,
}

impl ValueKind {
    /// Maps a `valueTypes` canonical key to the kind its values have.
    pub fn from_type_key(key: &str) -> Self {
        match key.to_ascii_lowercase().as_str() {
            "boolean" | "bool" => ValueKind::Boolean,
            "character" | "char" => ValueKind::Character,
            "float" | "real" | "double" | "decimal" => ValueKind::Float,
            "integer" | "int" => ValueKind::Integer,
            "string" | "text" => ValueKind::String,
            _ => ValueKind::UserDefined,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ValueKind::None => "None",
            ValueKind::Boolean => "Boolean",
            ValueKind::Character => "Character",
            ValueKind::Float => "Float",
            ValueKind::Integer => "Integer",
            ValueKind::String => "String",
            ValueKind::UserDefined => "UserDefined",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub token_type: TokenType,
    pub value_kind: ValueKind,
    /// Set on string and block commentary tokens whose span continues past them.
    pub unterminated: bool,
}

impl Classification {
    pub const fn of(token_type: TokenType) -> Self {
        Self {
            token_type,
            value_kind: ValueKind::None,
            unterminated: false,
        }
    }

    pub const fn value(value_kind: ValueKind) -> Self {
        Self {
            token_type: TokenType::Value,
            value_kind,
            unterminated: false,
        }
    }
}

/// A classified word of the document. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    start: usize,
    end: usize,
    content: String,
    classification: Classification,
}

impl Token {
    /// Extracts the word around `offset`: the non-whitespace run ending at
    /// `offset` joined with the one starting there. Yields the empty
    /// "no word" token when `offset` is surrounded by whitespace.
    pub fn extract<S: TextSource + ?Sized>(
        source: &S,
        offset: usize,
    ) -> Result<Token, DocumentError> {
        let len = source.len_chars();
        if offset > len {
            return Err(DocumentError::OffsetOutOfBounds { offset, len });
        }

        let start = source.word_start(offset);
        let end = source.word_end(offset);
        if start == end {
            return Ok(Token::empty(offset));
        }
        Ok(Token::unclassified(start, end, source.text_between(start, end)))
    }

    /// The "no word" sentinel.
    pub fn empty(at: usize) -> Token {
        Token {
            start: at,
            end: at,
            content: String::new(),
            classification: Classification::default(),
        }
    }

    pub(crate) fn unclassified(start: usize, end: usize, content: String) -> Token {
        debug_assert!(start < end, "tokens must not be empty");
        Token {
            start,
            end,
            content,
            classification: Classification::default(),
        }
    }

    pub fn with_classification(&self, classification: Classification) -> Token {
        Token {
            classification,
            ..self.clone()
        }
    }

    /// Same token moved by `delta` chars.
    pub fn shifted(&self, delta: isize) -> Token {
        Token {
            start: self.start.saturating_add_signed(delta),
            end: self.end.saturating_add_signed(delta),
            ..self.clone()
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn token_type(&self) -> TokenType {
        self.classification.token_type
    }

    pub fn value_kind(&self) -> ValueKind {
        self.classification.value_kind
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn is_unterminated(&self) -> bool {
        self.classification.unterminated
    }

    /// A string value whose closing delimiter has not been reached yet.
    pub fn is_open_string(&self) -> bool {
        self.token_type() == TokenType::Value
            && self.value_kind() == ValueKind::String
            && self.is_unterminated()
    }

    /// A block commentary whose closing delimiter has not been reached yet.
    pub fn is_open_block(&self) -> bool {
        self.token_type() == TokenType::BlockCommentary && self.is_unterminated()
    }

    /// True when `offset` lies inside the token or directly at either edge,
    /// which is where a caret sits while the word is being typed.
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} {}", self.start, self.end, self.token_type())?;
        if self.value_kind() != ValueKind::None {
            write!(f, "/{}", self.value_kind())?;
        }
        write!(f, " {:?}", self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ropey::Rope;

    #[test]
    fn test_extract_joins_both_sides_of_offset() {
        let text = Rope::from_str("if counter > 10");
        let token = Token::extract(&text, 5).unwrap();

        assert_eq!(token.span(), 3..10);
        assert_eq!(token.content(), "counter");
        assert_eq!(token.token_type(), TokenType::NotDefined);
    }

    #[test]
    fn test_extract_at_word_edges() {
        let text = Rope::from_str("a bc d");

        assert_eq!(Token::extract(&text, 2).unwrap().content(), "bc");
        assert_eq!(Token::extract(&text, 4).unwrap().content(), "bc");
        assert_eq!(Token::extract(&text, 6).unwrap().content(), "d");
    }

    #[test]
    fn test_extract_in_whitespace_yields_empty_token() {
        let text = Rope::from_str("a   b");
        let token = Token::extract(&text, 2).unwrap();

        assert!(token.is_empty());
        assert_eq!(token.start(), token.end());
        assert!(Token::extract(&Rope::new(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_extract_rejects_offset_past_end() {
        let text = Rope::from_str("abc");
        assert_eq!(
            Token::extract(&text, 4),
            Err(DocumentError::OffsetOutOfBounds { offset: 4, len: 3 })
        );
    }

    #[test]
    fn test_shifted_keeps_classification() {
        let token = Token::unclassified(4, 7, "abc".to_string())
            .with_classification(Classification::value(ValueKind::Integer));
        let moved = token.shifted(-2);

        assert_eq!(moved.span(), 2..5);
        assert_eq!(moved.value_kind(), ValueKind::Integer);
    }

    #[test]
    fn test_value_kind_from_type_key() {
        assert_eq!(ValueKind::from_type_key("Integer"), ValueKind::Integer);
        assert_eq!(ValueKind::from_type_key("REAL"), ValueKind::Float);
        assert_eq!(ValueKind::from_type_key("Matrix"), ValueKind::UserDefined);
    }
}
