//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use indoc::indoc;
use pseudocode_editor::cancel::CancelFlag;
use pseudocode_editor::document::TextBuffer;
use pseudocode_editor::language::LanguageDefinition;
use pseudocode_editor::recognition::{RecognitionEngine, TokenList, TokenType};

pub const TEST_LANGUAGE: &str = indoc! {r#"
    {
        "name": "Test",
        "keywords": { "If": "if", "Then": "then", "Continue": "continue" },
        "valueTypes": { "Integer": "integer", "String": "string", "Boolean": "boolean" },
        "commands": { "Print": "print", "Console": "console" },
        "operators": { "Assign": "=", "Plus": "+", "Less": "<" },
        "specialSyntax": { "Print": "!", "Arrow": "->" },
        "startTokens": { "String": "\"", "Character": "'", "LineCommentary": "//", "BlockCommentary": "/*" },
        "endTokens": { "String": "\"", "Character": "'", "LineCommentary": "\n", "BlockCommentary": "*/" },
        "mistakeDescriptions": { "NotDefined": "'{0}' is not defined." },
        "colors": { "Keyword": "blue", "NotDefined": "red" }
    }
"#};

pub fn test_language() -> Arc<LanguageDefinition> {
    Arc::new(LanguageDefinition::from_json_str(TEST_LANGUAGE).unwrap())
}

pub fn languages_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("languages")
}

pub fn shipped_language(file: &str) -> Arc<LanguageDefinition> {
    Arc::new(LanguageDefinition::from_path(languages_dir().join(file)).unwrap())
}

pub fn scan(language: &LanguageDefinition, buffer: &TextBuffer) -> TokenList {
    RecognitionEngine::new(language)
        .scan_document(buffer, &CancelFlag::new())
        .unwrap()
}

/// `(content, type)` of every token, for compact assertions.
pub fn classified(tokens: &TokenList) -> Vec<(String, TokenType)> {
    tokens
        .iter()
        .map(|t| (t.content().to_string(), t.token_type()))
        .collect()
}
