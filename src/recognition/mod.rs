//! Incremental lexical recognition
//!
//! Words (maximal non-whitespace runs) are extracted at edit sites,
//! classified against a [`LanguageDefinition`](crate::language::LanguageDefinition)
//! and kept in one ordered [`TokenList`]. Classification of a token can
//! depend on the token before it (comment and string spans), so the
//! [`RecognitionEngine`] re-classifies followers after every change.

pub mod classify;
pub mod engine;
pub mod token;
pub mod token_list;

pub use classify::classify;
pub use engine::{RecognitionEngine, RecognitionError};
pub use token::{Classification, Token, TokenType, ValueKind};
pub use token_list::TokenList;
