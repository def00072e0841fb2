//! Token classification
//!
//! A token's classification depends on its own content, the language
//! tables, and the nearest preceding token already in the list. Rules are
//! applied in priority order and the first match wins:
//!
//! 1. line commentary (same-line continuation or a line-comment opener),
//!    then block commentary (open block continuation or a block opener)
//! 2. value literals: continuation of an open string, then string,
//!    character, integer, float, boolean
//! 3. exact keyword, value type, or command surface
//! 4. variables: known by name, or declared after a value type
//! 5. operators
//! 6. special syntax, re-tagged when it aliases another category
//! 7. otherwise `NotDefined`
//!
//! A line-comment opener therefore wins even inside an open block or string.

use tracing::trace;

use crate::document::TextSource;
use crate::language::LanguageDefinition;

use super::token::{Classification, Token, TokenType, ValueKind};
use super::token_list::TokenList;

/// Character literals are at most a quoted char: `'a'`.
const MAX_CHARACTER_LITERAL_LEN: usize = 4;

/// Classifies `token` against `previous`, the nearest token before it.
///
/// `tokens` is consulted only for Variable lookups; `token` itself may or
/// may not be in it.
pub fn classify<S: TextSource + ?Sized>(
    language: &LanguageDefinition,
    tokens: &TokenList,
    source: &S,
    token: &Token,
    previous: Option<&Token>,
) -> Classification {
    let classification = classify_content(language, tokens, source, token, previous);
    trace!(
        start = token.start(),
        content = token.content(),
        token_type = %classification.token_type,
        value_kind = %classification.value_kind,
        "classified token"
    );
    classification
}

fn classify_content<S: TextSource + ?Sized>(
    language: &LanguageDefinition,
    tokens: &TokenList,
    source: &S,
    token: &Token,
    previous: Option<&Token>,
) -> Classification {
    let delimiters = language.delimiters();
    let content = token.content();

    let continues_line = previous.is_some_and(|p| {
        p.token_type() == TokenType::LineCommentary && source.line_start(token.start()) <= p.start()
    });
    if continues_line || content.starts_with(&delimiters.line_commentary.start) {
        return Classification::of(TokenType::LineCommentary);
    }

    if previous.is_some_and(Token::is_open_block) {
        return Classification {
            unterminated: !content.ends_with(&delimiters.block_commentary.end),
            ..Classification::of(TokenType::BlockCommentary)
        };
    }
    if content.starts_with(&delimiters.block_commentary.start) {
        return Classification {
            unterminated: !delimiters.block_commentary.encloses(content),
            ..Classification::of(TokenType::BlockCommentary)
        };
    }

    if previous.is_some_and(Token::is_open_string) {
        return Classification {
            unterminated: !content.ends_with(&delimiters.string.end),
            ..Classification::value(ValueKind::String)
        };
    }
    if let Some(value) = classify_literal(language, content) {
        return value;
    }

    if language.keywords().contains_surface(content) {
        return Classification::of(TokenType::Keyword);
    }
    if let Some(key) = language.value_types().key_of(content) {
        return Classification {
            value_kind: ValueKind::from_type_key(key),
            ..Classification::of(TokenType::ValueType)
        };
    }
    if language.commands().contains_surface(content) {
        return Classification::of(TokenType::Command);
    }

    if let Some(known) = tokens.variable_named(content, token.start()) {
        return Classification {
            value_kind: known.value_kind(),
            ..Classification::of(TokenType::Variable)
        };
    }
    if let Some(type_key) = previous.and_then(|p| language.value_types().key_of(p.content())) {
        return Classification {
            value_kind: ValueKind::from_type_key(type_key),
            ..Classification::of(TokenType::Variable)
        };
    }

    if language.operators().contains_surface(content) {
        return Classification::of(TokenType::Operator);
    }

    if let Some(key) = language.special_syntax().key_of(content) {
        let token_type = if language.keywords().contains_key(key) {
            TokenType::Keyword
        } else if language.commands().contains_key(key) {
            TokenType::Command
        } else if language.operators().contains_key(key) {
            TokenType::Operator
        } else {
            TokenType::SpecialSyntax
        };
        return Classification::of(token_type);
    }

    Classification::of(TokenType::NotDefined)
}

fn classify_literal(language: &LanguageDefinition, content: &str) -> Option<Classification> {
    let delimiters = language.delimiters();

    if content.starts_with(&delimiters.string.start) {
        return Some(Classification {
            unterminated: !delimiters.string.encloses(content),
            ..Classification::value(ValueKind::String)
        });
    }
    if content.starts_with(&delimiters.character.start)
        && content.chars().count() < MAX_CHARACTER_LITERAL_LEN
    {
        return Some(Classification::value(ValueKind::Character));
    }
    if content.parse::<i64>().is_ok() {
        return Some(Classification::value(ValueKind::Integer));
    }
    if is_float_literal(content) {
        return Some(Classification::value(ValueKind::Float));
    }
    if content.eq_ignore_ascii_case("true") || content.eq_ignore_ascii_case("false") {
        return Some(Classification::value(ValueKind::Boolean));
    }
    None
}

/// Plain decimal notation only: `inf`, `NaN` and friends are words, not numbers.
fn is_float_literal(content: &str) -> bool {
    content.chars().any(|c| c.is_ascii_digit())
        && content
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        && content.parse::<f64>().is_ok()
}
