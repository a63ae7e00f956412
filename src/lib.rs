pub mod ast;
pub mod cache;
pub mod compiled;
pub mod error;
pub mod filters;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod service;
pub mod types;
pub mod watch;

pub use ast::Node;
pub use cache::{CacheStats, ExpressionCache, DEFAULT_CACHE_CAPACITY};
pub use compiled::{CompiledExpression, Input, Interceptor, Purity, WatchStrategy};
pub use error::{Error, EvalError, LexerError, SyntaxError};
pub use filters::{Filter, FilterRegistry, FnFilter};
pub use lexer::{tokenize, IdentifierPredicate, LexerOptions, Token, TokenKind};
pub use parser::{parse_program, ParseOptions};
pub use service::{add_interceptor, ParseService, ParseSource};
pub use types::{HostFunction, Value};
pub use watch::Watcher;
use std::sync::Arc;

// Process-wide service backing the free functions below
lazy_static::lazy_static! {
    static ref DEFAULT_SERVICE: ParseService = ParseService::new();
}

/// The process-wide service used by the free functions.
pub fn default_service() -> &'static ParseService {
    &DEFAULT_SERVICE
}

/// Compile `source` with the default service (cached by trimmed text).
pub fn parse(source: &str) -> Result<Arc<CompiledExpression>, Error> {
    DEFAULT_SERVICE.parse(source)
}

/// Compile and evaluate `source` against `context`.
pub fn evaluate(source: &str, context: &Value) -> Result<Value, Error> {
    DEFAULT_SERVICE.evaluate(source, context)
}

/// Evaluate with the context provided as a JSON object.
/// JSON format: {"user": {"name": "Ada"}, "count": 3}
pub fn evaluate_with_json(source: &str, json_context: &str) -> Result<Value, Error> {
    let json: serde_json::Value =
        serde_json::from_str(json_context).map_err(|e| Error::Json(e.to_string()))?;
    if !json.is_object() {
        return Err(Error::Json("context must be a JSON object".to_string()));
    }
    evaluate(source, &Value::from_json(json))
}

/// Register a filter with the default service.
pub fn register_filter(filter: Box<dyn Filter>) -> Result<(), Error> {
    DEFAULT_SERVICE.register_filter(filter)
}

/// Replace the identifier rules of the default service. Already compiled
/// expressions are unaffected.
pub fn configure_identifiers(
    is_identifier_start: Option<IdentifierPredicate>,
    is_identifier_continue: Option<IdentifierPredicate>,
) {
    DEFAULT_SERVICE.configure_identifiers(is_identifier_start, is_identifier_continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_context() {
        let value = evaluate_with_json("user.name + '!'", r#"{"user": {"name": "Ada"}}"#).unwrap();
        assert_eq!(value, Value::from("Ada!"));
        assert!(matches!(evaluate_with_json("a", "[1]"), Err(Error::Json(_))));
        assert!(matches!(evaluate_with_json("a", "{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_default_service_caches() {
        let a = parse("lib_cache_key + 1").unwrap();
        let b = parse("  lib_cache_key + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
