use bindex::lexer::{Lexer, Literal};
use bindex::{tokenize, LexerOptions, TokenKind};
use std::sync::Arc;

fn texts(src: &str) -> Vec<String> {
    tokenize(src).unwrap().into_iter().map(|t| t.text).collect()
}

#[test]
fn test_token_kinds() {
    let tokens = tokenize("a.b(1, 'x') | f").unwrap();
    let kinds: Vec<&TokenKind> = tokens.iter().map(|t| &t.kind).collect();
    assert_eq!(tokens.len(), 10);
    assert_eq!(*kinds[0], TokenKind::Identifier);
    assert_eq!(*kinds[1], TokenKind::Punctuation);
    assert_eq!(*kinds[4], TokenKind::Constant(Literal::Number(1.0)));
    assert_eq!(*kinds[6], TokenKind::Constant(Literal::String("x".to_string())));
    assert_eq!(*kinds[8], TokenKind::Operator);
    assert!(tokens[9].is_identifier());
}

#[test]
fn test_token_indexes() {
    let tokens = tokenize("  foo  + 12").unwrap();
    let indexes: Vec<usize> = tokens.iter().map(|t| t.index).collect();
    assert_eq!(indexes, vec![2, 7, 9]);
}

#[test]
fn test_longest_operator_wins() {
    assert_eq!(texts("a!==b"), vec!["a", "!==", "b"]);
    assert_eq!(texts("a<=b"), vec!["a", "<=", "b"]);
    assert_eq!(texts("!!a"), vec!["!", "!", "a"]);
    assert_eq!(texts("a||b"), vec!["a", "||", "b"]);
}

#[test]
fn test_numbers() {
    let tokens = tokenize("3E2 1e+3 .5 0.5E-10").unwrap();
    let values: Vec<&Literal> = tokens.iter().filter_map(|t| t.literal_value()).collect();
    assert_eq!(*values[0], Literal::Number(300.0));
    assert_eq!(*values[1], Literal::Number(1000.0));
    assert_eq!(*values[2], Literal::Number(0.5));
    assert_eq!(*values[3], Literal::Number(5e-11));
    assert_eq!(tokens[0].text, "3e2");
}

#[test]
fn test_invalid_exponent() {
    let err = tokenize("0.5E-").unwrap_err();
    assert_eq!(err.message, "Invalid exponent");
    assert_eq!(
        err.to_string(),
        "Lexer Error: Invalid exponent at columns 0-5 [0.5E-] in expression [0.5E-]."
    );
}

#[test]
fn test_strings_and_escapes() {
    let tokens = tokenize(r#"'a\'c' "x\ty" 'éA'"#).unwrap();
    let values: Vec<&Literal> = tokens.iter().filter_map(|t| t.literal_value()).collect();
    assert_eq!(*values[0], Literal::String("a'c".to_string()));
    assert_eq!(*values[1], Literal::String("x\ty".to_string()));
    assert_eq!(*values[2], Literal::String("éA".to_string()));
    assert_eq!(tokens[0].text, r#"'a\'c'"#);
}

#[test]
fn test_surrogate_pair_escape() {
    let tokens = tokenize(r#"'\uD83D\uDE00'"#).unwrap();
    assert_eq!(
        tokens[0].literal_value(),
        Some(&Literal::String("😀".to_string()))
    );
}

#[test]
fn test_lexer_errors() {
    let unterminated = tokenize("'abc").unwrap_err();
    assert_eq!(unterminated.message, "Unterminated quote");
    assert_eq!((unterminated.start, unterminated.end), (0, 4));

    let bad_escape = tokenize(r#"'\u12G4'"#).unwrap_err();
    assert!(bad_escape.message.starts_with("Invalid unicode escape"));

    let unexpected = tokenize("a # b").unwrap_err();
    assert_eq!(unexpected.message, "Unexpected next character");
    assert_eq!(unexpected.fragment, "#");
    assert_eq!(unexpected.start, 2);
}

#[test]
fn test_default_identifiers() {
    assert_eq!(texts("$scope _x a1"), vec!["$scope", "_x", "a1"]);
    assert!(tokenize("été").is_err());
}

#[test]
fn test_custom_identifier_predicates() {
    let start: bindex::IdentifierPredicate =
        Arc::new(|ch: &str, _cp: u32| ch.chars().all(|c| c.is_alphabetic() || c == '_'));
    let cont: bindex::IdentifierPredicate =
        Arc::new(|ch: &str, _cp: u32| ch.chars().all(|c| c.is_alphanumeric() || c == '_'));
    let options = LexerOptions {
        is_identifier_start: Some(start),
        is_identifier_continue: Some(cont),
    };
    let tokens = Lexer::new("été + x2", &options).tokenize().unwrap();
    assert_eq!(tokens[0].text, "été");
    assert!(tokens[0].is_identifier());
    assert_eq!(tokens[2].text, "x2");
}
