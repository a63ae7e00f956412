use thiserror::Error;

/// Raised while turning expression text into tokens.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexer Error: {message} at columns {start}-{end} [{fragment}] in expression [{expression}].")]
pub struct LexerError {
    pub message: String,
    /// Character offset where the offending range starts.
    pub start: usize,
    /// Character offset one past the offending range.
    pub end: usize,
    /// The offending slice of the expression.
    pub fragment: String,
    /// The full expression text.
    pub expression: String,
}

impl LexerError {
    pub fn new<M: Into<String>>(message: M, start: usize, end: usize, expression: &str) -> Self {
        let end = end.max(start);
        let fragment = expression.chars().skip(start).take(end - start).collect();
        Self {
            message: message.into(),
            start,
            end,
            fragment,
            expression: expression.to_string(),
        }
    }
}

/// Raised while building the syntax tree from a token queue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxError {
    #[error("Syntax Error: Token '{token}' {message} at column {column} of the expression [{expression}] starting at [{remainder}].")]
    Unexpected {
        token: String,
        message: String,
        /// 1-based column of the offending token.
        column: usize,
        expression: String,
        remainder: String,
    },

    #[error("Unexpected end of expression: {expression}")]
    UnexpectedEnd { expression: String },

    #[error("Trying to assign a value to a non l-value at column {column} of the expression [{expression}].")]
    NonAssignable { column: usize, expression: String },
}

/// Raised while invoking a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{callee} is not a function")]
    NotAFunction { callee: String },

    #[error("Cannot assign to '{name}': {reason}")]
    NonAssignable { name: String, reason: String },

    #[error("Unknown filter: {name}")]
    UnknownFilter { name: String },

    /// Error produced by a host function, filter or interceptor.
    #[error("{0}")]
    Host(String),
}

impl EvalError {
    pub fn host<M: Into<String>>(message: M) -> Self {
        EvalError::Host(message.into())
    }
}

/// Crate-level error returned by the front door and the convenience functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(#[from] LexerError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Invalid filter name: '{0}'")]
    InvalidFilterName(String),

    #[error("Invalid JSON context: {0}")]
    Json(String),
}

impl Error {
    pub fn is_lexer(&self) -> bool {
        matches!(self, Error::Lexer(_))
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax(_))
    }
}
