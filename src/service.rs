use crate::cache::{ExpressionCache, DEFAULT_CACHE_CAPACITY};
use crate::compiled::{
    eval_fn, Body, CompiledExpression, Input, Interceptor, WatchStrategy,
};
use crate::error::{Error, EvalError};
use crate::filters::{FilterRegistry, FnFilter};
use crate::lexer::IdentifierPredicate;
use crate::parser::{parse_program, ParseOptions};
use crate::runtime::Interpreter;
use crate::types::{HostFunction, Value};
use parking_lot::RwLock;
use std::sync::Arc;

/// What can be handed to the front door.
#[derive(Debug, Clone)]
pub enum ParseSource {
    Text(String),
    /// Already executable; called with `(context, locals)` and never parsed.
    Function(HostFunction),
    /// Yields a constant no-op expression.
    None,
}

impl From<&str> for ParseSource {
    fn from(text: &str) -> Self {
        ParseSource::Text(text.to_string())
    }
}

impl From<String> for ParseSource {
    fn from(text: String) -> Self {
        ParseSource::Text(text)
    }
}

impl From<&String> for ParseSource {
    fn from(text: &String) -> Self {
        ParseSource::Text(text.clone())
    }
}

impl From<HostFunction> for ParseSource {
    fn from(func: HostFunction) -> Self {
        ParseSource::Function(func)
    }
}

impl<T: Into<ParseSource>> From<Option<T>> for ParseSource {
    fn from(source: Option<T>) -> Self {
        source.map(Into::into).unwrap_or(ParseSource::None)
    }
}

/// Compilation front door: lexes, parses and compiles source text once per distinct
/// (trimmed) text, and attaches interceptors and watch strategies.
pub struct ParseService {
    options: RwLock<ParseOptions>,
    filters: Arc<FilterRegistry>,
    cache: ExpressionCache,
}

impl ParseService {
    pub fn new() -> Self {
        Self::with_cache(ExpressionCache::bounded(DEFAULT_CACHE_CAPACITY))
    }

    pub fn with_cache(cache: ExpressionCache) -> Self {
        Self::with_parts(cache, Arc::new(FilterRegistry::new()))
    }

    /// Share a filter registry between several services.
    pub fn with_parts(cache: ExpressionCache, filters: Arc<FilterRegistry>) -> Self {
        Self {
            options: RwLock::new(ParseOptions::default()),
            filters,
            cache,
        }
    }

    /// Replace the identifier rules used for expressions compiled from now on.
    pub fn configure_identifiers(
        &self,
        is_identifier_start: Option<IdentifierPredicate>,
        is_identifier_continue: Option<IdentifierPredicate>,
    ) {
        let mut options = self.options.write();
        options.lexer.is_identifier_start = is_identifier_start;
        options.lexer.is_identifier_continue = is_identifier_continue;
    }

    /// Reserve `name` as a literal that compiles to `value`.
    pub fn add_literal(&self, name: impl Into<String>, value: Value) {
        self.options.write().literals.insert(name.into(), value);
    }

    pub fn register_filter(&self, filter: Box<dyn crate::filters::Filter>) -> Result<(), Error> {
        self.filters.register(filter)
    }

    pub fn register_filter_fn<F>(&self, name: &str, func: F) -> Result<(), Error>
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.filters.register(Box::new(FnFilter::new(name, func)))
    }

    pub fn filters(&self) -> &Arc<FilterRegistry> {
        &self.filters
    }

    pub fn cache(&self) -> &ExpressionCache {
        &self.cache
    }

    /// Compile `source`, reusing the cached expression for text seen before.
    ///
    /// Parsing the same text twice returns the identical `Arc` only while its entry is
    /// still cached. A bounded cache (the default for [`ParseService::new`]) may evict it,
    /// after which the text is compiled again; use [`ExpressionCache::unbounded`] to keep
    /// identity for the lifetime of the service.
    pub fn parse(&self, source: impl Into<ParseSource>) -> Result<Arc<CompiledExpression>, Error> {
        match source.into() {
            ParseSource::Text(text) => self.compile_text(&text),
            ParseSource::Function(func) => Ok(Arc::new(finish(CompiledExpression {
                source: String::new(),
                body: Body::Host(func),
                assign: None,
                inputs: None,
                constant: false,
                literal: false,
                one_time: false,
                strategy: WatchStrategy::None,
            }))),
            ParseSource::None => Ok(Arc::new(finish(CompiledExpression {
                source: String::new(),
                body: Body::Compiled(eval_fn(|_| Ok(Value::Undefined))),
                assign: None,
                inputs: None,
                constant: true,
                literal: false,
                one_time: false,
                strategy: WatchStrategy::None,
            }))),
        }
    }

    /// Parse, then pipe every result through `interceptor`.
    pub fn parse_with(
        &self,
        source: impl Into<ParseSource>,
        interceptor: Interceptor,
    ) -> Result<Arc<CompiledExpression>, Error> {
        let parsed = self.parse(source)?;
        Ok(add_interceptor(parsed, interceptor))
    }

    /// Parse (through the cache) and evaluate against `context`.
    pub fn evaluate(&self, source: &str, context: &Value) -> Result<Value, Error> {
        Ok(self.parse(source)?.evaluate(context)?)
    }

    fn compile_text(&self, text: &str) -> Result<Arc<CompiledExpression>, Error> {
        let key = text.trim();
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }
        let (one_time, body) = match key.strip_prefix("::") {
            Some(rest) => (true, rest),
            None => (false, key),
        };
        log::debug!("compiling expression [{}]", key);
        let program = {
            let options = self.options.read();
            parse_program(body, &options)?
        };
        let mut compiled = Interpreter::new(Arc::clone(&self.filters)).compile(&program, body);
        compiled.one_time = one_time;
        Ok(self.cache.insert(key.to_string(), Arc::new(finish(compiled))))
    }
}

impl Default for ParseService {
    fn default() -> Self {
        Self::new()
    }
}

fn select_strategy(expression: &CompiledExpression) -> WatchStrategy {
    if expression.constant {
        WatchStrategy::Constant
    } else if expression.one_time {
        WatchStrategy::OneTime
    } else {
        match expression.inputs.as_deref() {
            Some([_]) => WatchStrategy::SingleInput,
            Some(_) => WatchStrategy::MultiInput,
            None => WatchStrategy::None,
        }
    }
}

fn finish(mut expression: CompiledExpression) -> CompiledExpression {
    expression.strategy = select_strategy(&expression);
    expression
}

/// Wrap `parsed` so its results pass through `interceptor`. Intercepting an already
/// intercepted expression chains the two interceptors around the original expression.
pub fn add_interceptor(
    parsed: Arc<CompiledExpression>,
    interceptor: Interceptor,
) -> Arc<CompiledExpression> {
    let (inner, interceptor) = match &parsed.body {
        Body::Intercepted {
            inner,
            interceptor: existing,
            ..
        } => (Arc::clone(inner), Interceptor::chain(existing, &interceptor)),
        _ => (parsed, interceptor),
    };

    let (use_inputs, inputs) = if interceptor.is_stateful() {
        (false, None)
    } else {
        let base = match &inner.inputs {
            Some(inputs) => inputs.clone(),
            None => vec![Input::whole(Arc::clone(&inner))],
        };
        let inputs = if interceptor.is_pure() {
            base
        } else {
            base.iter().map(Input::depurified).collect()
        };
        (inner.inputs.is_none(), Some(inputs))
    };

    Arc::new(finish(CompiledExpression {
        source: inner.source.clone(),
        assign: inner.assign.clone(),
        inputs,
        constant: inner.constant,
        literal: inner.literal,
        one_time: inner.one_time,
        strategy: WatchStrategy::None,
        body: Body::Intercepted {
            inner,
            interceptor,
            use_inputs,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies() {
        let service = ParseService::new();
        let strategy = |src: &str| service.parse(src).unwrap().watch_strategy();
        assert_eq!(strategy("1 + 2"), WatchStrategy::Constant);
        assert_eq!(strategy("::a"), WatchStrategy::OneTime);
        assert_eq!(strategy("::1"), WatchStrategy::Constant);
        assert_eq!(strategy("a"), WatchStrategy::None);
        assert_eq!(strategy("-a"), WatchStrategy::SingleInput);
        assert_eq!(strategy("a + b"), WatchStrategy::MultiInput);
        assert_eq!(
            service.parse(None::<&str>).unwrap().watch_strategy(),
            WatchStrategy::Constant
        );
    }

    #[test]
    fn one_time_prefix_is_stripped() {
        let service = ParseService::new();
        let expr = service.parse("  ::name ").unwrap();
        assert!(expr.is_one_time());
        assert_eq!(expr.source(), "name");
        let ctx = Value::object([("name", Value::from("x"))]);
        assert_eq!(expr.evaluate(&ctx).unwrap(), Value::from("x"));
        assert!(!Arc::ptr_eq(&expr, &service.parse("name").unwrap()));
    }

    #[test]
    fn failures_are_not_cached() {
        let service = ParseService::with_cache(ExpressionCache::unbounded());
        assert!(service.parse("a +").is_err());
        assert!(service.parse("'x").is_err());
        assert_eq!(service.cache().len(), 0);
    }

    #[test]
    fn custom_literals_apply_to_new_compilations() {
        let service = ParseService::new();
        let ctx = Value::object([("NaN", Value::from("shadowed"))]);
        assert_eq!(service.evaluate("NaN", &ctx).unwrap(), Value::from("shadowed"));
        service.add_literal("Infinity", Value::Number(f64::INFINITY));
        assert_eq!(
            service.evaluate("Infinity", &Value::empty_object()).unwrap(),
            Value::Number(f64::INFINITY)
        );
        assert!(service.parse("Infinity").unwrap().is_constant());
    }
}
