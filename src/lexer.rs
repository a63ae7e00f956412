use crate::error::LexerError;
use std::fmt;
use std::sync::Arc;

/// Value carried by a constant token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Identifier,
    Operator,
    Punctuation,
    Constant(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Character offset of the first character of the token.
    pub index: usize,
    /// Source text of the token. Numbers are lowercased, strings keep their quotes.
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn is_operator(&self) -> bool {
        self.kind == TokenKind::Operator
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, TokenKind::Constant(_))
    }

    pub fn literal_value(&self) -> Option<&Literal> {
        match &self.kind {
            TokenKind::Constant(lit) => Some(lit),
            _ => None,
        }
    }
}

/// Identifier predicate: receives the character as a string and its code point.
pub type IdentifierPredicate = Arc<dyn Fn(&str, u32) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct LexerOptions {
    pub is_identifier_start: Option<IdentifierPredicate>,
    pub is_identifier_continue: Option<IdentifierPredicate>,
}

impl fmt::Debug for LexerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LexerOptions")
            .field("is_identifier_start", &self.is_identifier_start.is_some())
            .field("is_identifier_continue", &self.is_identifier_continue.is_some())
            .finish()
    }
}

const OPERATORS: &[&str] = &[
    "+", "-", "*", "/", "%", "===", "!==", "==", "!=", "<", ">", "<=", ">=", "&&", "||", "!",
    "=", "|",
];

fn is_punctuation(c: char) -> bool {
    matches!(c, '(' | ')' | '{' | '}' | '[' | ']' | '.' | ',' | ';' | ':' | '?')
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\r' | '\t' | '\n' | '\u{000B}' | '\u{00A0}')
}

fn is_exp_operator(c: Option<char>) -> bool {
    matches!(c, Some('-' | '+' | '0'..='9'))
}

fn default_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn escape(c: char) -> Option<char> {
    Some(match c {
        'n' => '\n',
        'f' => '\u{000C}',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{000B}',
        '\'' => '\'',
        '"' => '"',
        _ => return None,
    })
}

pub struct Lexer<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
    options: &'a LexerOptions,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str, options: &'a LexerOptions) -> Self {
        Self {
            text,
            chars: text.chars().collect(),
            pos: 0,
            options,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>, start: usize, end: usize) -> LexerError {
        LexerError::new(message, start, end, self.text)
    }

    fn slice(&self, start: usize, end: usize) -> String {
        self.chars[start..end.min(self.chars.len())].iter().collect()
    }

    fn is_identifier_start(&self, c: char) -> bool {
        match &self.options.is_identifier_start {
            Some(pred) => pred(c.encode_utf8(&mut [0; 4]), c as u32),
            None => default_identifier_start(c),
        }
    }

    fn is_identifier_continue(&self, c: char) -> bool {
        match &self.options.is_identifier_continue {
            Some(pred) => pred(c.encode_utf8(&mut [0; 4]), c as u32),
            None => default_identifier_start(c) || c.is_ascii_digit(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexerError> {
        while let Some(ch) = self.peek() {
            if ch == '"' || ch == '\'' {
                self.string(ch)?;
            } else if ch.is_ascii_digit()
                || (ch == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            {
                self.number()?;
            } else if self.is_identifier_start(ch) {
                self.identifier();
            } else if is_punctuation(ch) {
                self.tokens.push(Token {
                    index: self.pos,
                    text: ch.to_string(),
                    kind: TokenKind::Punctuation,
                });
                self.pos += 1;
            } else if is_whitespace(ch) {
                self.pos += 1;
            } else {
                self.operator()?;
            }
        }
        Ok(self.tokens)
    }

    fn operator(&mut self) -> Result<(), LexerError> {
        for width in [3, 2, 1] {
            if self.pos + width > self.chars.len() {
                continue;
            }
            let candidate = self.slice(self.pos, self.pos + width);
            if OPERATORS.contains(&candidate.as_str()) {
                self.tokens.push(Token {
                    index: self.pos,
                    text: candidate,
                    kind: TokenKind::Operator,
                });
                self.pos += width;
                return Ok(());
            }
        }
        Err(self.error("Unexpected next character", self.pos, self.pos + 1))
    }

    fn number(&mut self) -> Result<(), LexerError> {
        let start = self.pos;
        let mut text = String::new();
        while let Some(raw) = self.peek() {
            let ch = raw.to_ascii_lowercase();
            let next = self.peek_at(1);
            if ch == '.' || ch.is_ascii_digit() {
                text.push(ch);
            } else if ch == 'e' && is_exp_operator(next) {
                text.push(ch);
            } else if is_exp_operator(Some(ch)) && text.ends_with('e') {
                // sign right after the exponent marker needs a digit behind it
                if next.is_some_and(|c| c.is_ascii_digit()) {
                    text.push(ch);
                } else {
                    return Err(self.error("Invalid exponent", start, self.pos + 1));
                }
            } else {
                break;
            }
            self.pos += 1;
        }
        let value = text.parse::<f64>().unwrap_or(f64::NAN);
        self.tokens.push(Token {
            index: start,
            text,
            kind: TokenKind::Constant(Literal::Number(value)),
        });
        Ok(())
    }

    fn identifier(&mut self) {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            if !self.is_identifier_continue(c) {
                break;
            }
            self.pos += 1;
        }
        self.tokens.push(Token {
            index: start,
            text: self.slice(start, self.pos),
            kind: TokenKind::Identifier,
        });
    }

    fn string(&mut self, quote: char) -> Result<(), LexerError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        // UTF-16 units from \u escapes, decoded together so surrogate pairs combine
        let mut units: Vec<u16> = Vec::new();
        let mut escaping = false;
        while let Some(ch) = self.peek() {
            if escaping {
                escaping = false;
                if ch == 'u' {
                    let hex = self.slice(self.pos + 1, self.pos + 5);
                    let unit = (hex.chars().count() == 4)
                        .then(|| u16::from_str_radix(&hex, 16).ok())
                        .flatten()
                        .filter(|_| hex.chars().all(|c| c.is_ascii_hexdigit()));
                    match unit {
                        Some(unit) => units.push(unit),
                        None => {
                            return Err(self.error(
                                format!("Invalid unicode escape [\\u{hex}]"),
                                start,
                                self.pos + 1,
                            ))
                        }
                    }
                    self.pos += 5;
                    continue;
                }
                flush_units(&mut units, &mut value);
                value.push(escape(ch).unwrap_or(ch));
            } else if ch == '\\' {
                escaping = true;
            } else if ch == quote {
                flush_units(&mut units, &mut value);
                self.pos += 1;
                self.tokens.push(Token {
                    index: start,
                    text: self.slice(start, self.pos),
                    kind: TokenKind::Constant(Literal::String(value)),
                });
                return Ok(());
            } else {
                flush_units(&mut units, &mut value);
                value.push(ch);
            }
            self.pos += 1;
        }
        Err(self.error("Unterminated quote", start, self.chars.len()))
    }
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    if !units.is_empty() {
        out.push_str(&String::from_utf16_lossy(units));
        units.clear();
    }
}

/// Tokenize `text` with the built-in identifier rules.
pub fn tokenize(text: &str) -> Result<Vec<Token>, LexerError> {
    let options = LexerOptions::default();
    Lexer::new(text, &options).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(src: &str) -> Vec<String> {
        tokenize(src).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn operators_are_greedy() {
        assert_eq!(texts("a!==b"), vec!["a", "!==", "b"]);
        assert_eq!(texts("a==b"), vec!["a", "==", "b"]);
        assert_eq!(texts("a<=b|c"), vec!["a", "<=", "b", "|", "c"]);
        assert_eq!(texts("!!a"), vec!["!", "!", "a"]);
    }

    #[test]
    fn numbers_and_exponents() {
        let toks = tokenize("0.5E-10").unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].text, "0.5e-10");
        assert_eq!(toks[0].literal_value(), Some(&Literal::Number(5e-11)));
        assert_eq!(
            tokenize(".5")
                .unwrap()
                .first()
                .and_then(|t| t.literal_value().cloned()),
            Some(Literal::Number(0.5))
        );
        let err = tokenize("0.5E-").unwrap_err();
        assert_eq!(err.message, "Invalid exponent");
        assert_eq!(texts("1e"), vec!["1", "e"]);
    }

    #[test]
    fn string_escapes() {
        let toks = tokenize(r#"'a\'c'"#).unwrap();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].literal_value(), Some(&Literal::String("a'c".into())));
        assert_eq!(toks[0].text, r#"'a\'c'"#);

        let toks = tokenize(r#""\u00A0\n\q""#).unwrap();
        assert_eq!(
            toks[0].literal_value(),
            Some(&Literal::String("\u{00A0}\nq".into()))
        );
    }

    #[test]
    fn surrogate_pairs_combine() {
        let toks = tokenize(r#""\uD83D\uDE00""#).unwrap();
        assert_eq!(toks[0].literal_value(), Some(&Literal::String("😀".into())));
        let toks = tokenize(r#""\uD83Dx""#).unwrap();
        assert_eq!(toks[0].literal_value(), Some(&Literal::String("\u{FFFD}x".into())));
    }

    #[test]
    fn string_errors() {
        let err = tokenize("'abc").unwrap_err();
        assert_eq!(err.message, "Unterminated quote");
        assert_eq!(err.start, 0);
        let err = tokenize(r#""\u12G4""#).unwrap_err();
        assert_eq!(err.message, "Invalid unicode escape [\\u12G4]");
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.message, "Unexpected next character");
        assert_eq!(err.fragment, "#");
        assert_eq!((err.start, err.end), (2, 3));
    }

    #[test]
    fn whitespace_includes_nbsp_and_vertical_tab() {
        assert_eq!(texts("a\u{00A0}+\u{000B}b"), vec!["a", "+", "b"]);
    }

    #[test]
    fn custom_identifier_predicates() {
        let options = LexerOptions {
            is_identifier_start: Some(Arc::new(|s: &str, _cp: u32| {
                s.chars().all(|c| c.is_alphabetic() || c == '_')
            })),
            is_identifier_continue: Some(Arc::new(|s: &str, cp: u32| {
                cp > 0x7f || s.chars().all(|c| c.is_alphanumeric())
            })),
        };
        assert!(Lexer::new("😀x", &options).tokenize().is_err());
        let toks = Lexer::new("été+x1", &options).tokenize().unwrap();
        let names: Vec<_> = toks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(names, vec!["été", "+", "x1"]);
    }
}
