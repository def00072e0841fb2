//! Table-driven pseudocode dialects
//!
//! - [`LanguageDefinition`]: validated vocabulary, delimiter, color and
//!   mistake-description tables for one dialect
//! - [`Vocabulary`]: ordered canonical-key to surface-string table
//! - [`LanguageCatalog`]: the definitions available in a directory

pub mod catalog;
pub mod definition;
pub mod vocabulary;

pub use catalog::LanguageCatalog;
pub use definition::{
    Delimiter, DelimiterCategory, DelimiterSide, Delimiters, LanguageDefinition, LanguageError,
    NOT_DEFINED_MISTAKE,
};
pub use vocabulary::Vocabulary;
