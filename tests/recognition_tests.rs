//! Integration tests for incremental recognition
//!
//! Drives the engine through the public API the way an editor does: a
//! buffer, a token list, and a stream of edits.

mod common;

use indoc::indoc;
use pseudocode_editor::cancel::CancelFlag;
use pseudocode_editor::completion::{SuggestionProvider, SuggestionSource};
use pseudocode_editor::diagnostics::find_mistakes;
use pseudocode_editor::document::{TextBuffer, TextEdit, TextSource};
use pseudocode_editor::recognition::{RecognitionEngine, TokenList, TokenType, ValueKind};

use common::{classified, scan, shipped_language, test_language};

fn owned(expected: &[(&str, TokenType)]) -> Vec<(String, TokenType)> {
    expected
        .iter()
        .map(|(content, token_type)| (content.to_string(), *token_type))
        .collect()
}

#[test]
fn test_line_commentary_propagates_to_end_of_line() {
    let language = test_language();
    let engine = RecognitionEngine::new(&language);
    let mut buffer = TextBuffer::new("hello world\nx = 1");
    let mut tokens = scan(&language, &buffer);

    let changed = engine
        .apply_edit(&mut buffer, &mut tokens, &TextEdit::insert(0, "//"))
        .unwrap();

    let changed: Vec<_> = changed.iter().map(|t| t.content().to_string()).collect();
    assert_eq!(changed, vec!["//hello", "world"]);
    assert_eq!(
        classified(&tokens),
        owned(&[
            ("//hello", TokenType::LineCommentary),
            ("world", TokenType::LineCommentary),
            ("x", TokenType::NotDefined),
            ("=", TokenType::Operator),
            ("1", TokenType::Value),
        ])
    );
}

#[test]
fn test_removing_line_comment_opener_restores_the_line() {
    let language = test_language();
    let engine = RecognitionEngine::new(&language);
    let mut buffer = TextBuffer::new("// if then\nprint");
    let mut tokens = scan(&language, &buffer);

    engine
        .apply_edit(&mut buffer, &mut tokens, &TextEdit::delete(0, 3))
        .unwrap();

    assert_eq!(buffer.to_string(), "if then\nprint");
    assert_eq!(
        classified(&tokens),
        owned(&[
            ("if", TokenType::Keyword),
            ("then", TokenType::Keyword),
            ("print", TokenType::Command),
        ])
    );
}

#[test]
fn test_line_opener_inside_string_comments_out_the_rest_of_the_line() {
    let language = test_language();
    let engine = RecognitionEngine::new(&language);
    let mut buffer = TextBuffer::new("\"a b c\" if\nthen");
    let mut tokens = scan(&language, &buffer);

    engine
        .apply_edit(&mut buffer, &mut tokens, &TextEdit::insert(3, "//"))
        .unwrap();

    assert_eq!(
        classified(&tokens),
        owned(&[
            ("\"a", TokenType::Value),
            ("//b", TokenType::LineCommentary),
            ("c\"", TokenType::LineCommentary),
            ("if", TokenType::LineCommentary),
            ("then", TokenType::Keyword),
        ])
    );
    assert_eq!(tokens, scan(&language, &buffer));

    engine
        .apply_edit(&mut buffer, &mut tokens, &TextEdit::delete(3, 2))
        .unwrap();

    assert_eq!(tokens, scan(&language, &buffer));
    assert_eq!(tokens.get(3).map(|t| t.token_type()), Some(TokenType::Keyword));
}

#[test]
fn test_string_span_while_typing() {
    let language = test_language();
    let engine = RecognitionEngine::new(&language);
    let mut buffer = TextBuffer::default();
    let mut tokens = TokenList::new();

    for c in "\"abc def\" + x".chars() {
        let edit = TextEdit::insert(buffer.len_chars(), c.to_string());
        engine.apply_edit(&mut buffer, &mut tokens, &edit).unwrap();
    }

    let kinds: Vec<_> = tokens
        .iter()
        .map(|t| (t.content().to_string(), t.token_type(), t.value_kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("\"abc".to_string(), TokenType::Value, ValueKind::String),
            ("def\"".to_string(), TokenType::Value, ValueKind::String),
            ("+".to_string(), TokenType::Operator, ValueKind::None),
            ("x".to_string(), TokenType::NotDefined, ValueKind::None),
        ]
    );
    assert!(!tokens.get(1).unwrap().is_unterminated());
}

#[test]
fn test_variable_inherits_kind_from_declaration() {
    let language = test_language();
    let buffer = TextBuffer::new(indoc! {"
        integer count = 1
        print count
    "});
    let tokens = scan(&language, &buffer);

    let counts: Vec<_> = tokens.iter().filter(|t| t.content() == "count").collect();
    assert_eq!(counts.len(), 2);
    for token in counts {
        assert_eq!(token.token_type(), TokenType::Variable);
        assert_eq!(token.value_kind(), ValueKind::Integer);
    }
}

#[test]
fn test_declaration_inserted_before_use_makes_it_a_variable() {
    let language = test_language();
    let engine = RecognitionEngine::new(&language);
    let mut buffer = TextBuffer::new("print total");
    let mut tokens = scan(&language, &buffer);
    assert_eq!(tokens.get(1).unwrap().token_type(), TokenType::NotDefined);

    engine
        .apply_edit(&mut buffer, &mut tokens, &TextEdit::insert(0, "string total\n"))
        .unwrap();
    // Revisiting the use with the caret keeps it a Variable.
    let offset = buffer.to_string().rfind("total").unwrap();
    engine.recognize_at(&buffer, &mut tokens, offset).unwrap();

    let last = tokens.iter().last().unwrap();
    assert_eq!(last.content(), "total");
    assert_eq!(last.token_type(), TokenType::Variable);
    assert_eq!(last.value_kind(), ValueKind::String);
}

#[test]
fn test_rerun_mistake_search_reports_each_position_once() {
    let language = test_language();
    let buffer = TextBuffer::new("if foo then\n  bar");
    let tokens = scan(&language, &buffer);

    // The same tokens seen twice, as after a re-run over an unchanged list.
    let mistakes = find_mistakes(
        &language,
        &buffer,
        tokens.iter().chain(tokens.iter()),
        &CancelFlag::new(),
    )
    .unwrap();

    let rendered: Vec<_> = mistakes.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "1 1:4 Error 'foo' is not defined.",
            "2 2:3 Error 'bar' is not defined.",
        ]
    );
}

#[test]
fn test_variables_are_suggested_before_vocabulary() {
    let language = test_language();
    let buffer = TextBuffer::new("integer count = 1\nco");
    let tokens = scan(&language, &buffer);
    let edited = tokens.iter().last().unwrap();
    assert_eq!(edited.token_type(), TokenType::NotDefined);

    let suggestions = SuggestionProvider::new(&language)
        .suggest(edited, &tokens, &CancelFlag::new())
        .unwrap();

    let texts: Vec<_> = suggestions.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["count", "continue", "console"]);
    assert_eq!(suggestions[0].source, SuggestionSource::Variable);
    assert_eq!(suggestions[2].source, SuggestionSource::Command);
}

#[test]
fn test_classification_rerun_is_idempotent() {
    let language = shipped_language("english.json");
    let engine = RecognitionEngine::new(&language);
    let buffer = TextBuffer::new(indoc! {r#"
        // greet the user
        string name = "World"
        if name != "" then
            print "Hello" + name /* shout
            later */
        endif
    "#});
    let tokens = scan(&language, &buffer);

    let (first, _) = engine.reclassify_all(&buffer, &tokens, &CancelFlag::new()).unwrap();
    let (second, changed) = engine.reclassify_all(&buffer, &first, &CancelFlag::new()).unwrap();

    assert!(changed.is_empty());
    assert_eq!(first, second);
    assert_eq!(first, tokens);
}

#[test]
fn test_switching_to_german_reclassifies_vocabulary() {
    let english = shipped_language("english.json");
    let german = shipped_language("german.json");
    let buffer = TextBuffer::new("wenn x dann ausgabe x");
    let tokens = scan(&english, &buffer);
    assert!(tokens.iter().all(|t| t.token_type() == TokenType::NotDefined));

    let (tokens, changed) = RecognitionEngine::new(&german)
        .reclassify_all(&buffer, &tokens, &CancelFlag::new())
        .unwrap();

    assert_eq!(changed.len(), 3);
    assert_eq!(
        classified(&tokens),
        owned(&[
            ("wenn", TokenType::Keyword),
            ("x", TokenType::NotDefined),
            ("dann", TokenType::Keyword),
            ("ausgabe", TokenType::Command),
            ("x", TokenType::NotDefined),
        ])
    );
}
