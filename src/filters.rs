use crate::error::{Error, EvalError};
use crate::types::Value;
use dashmap::DashMap;
use std::sync::Arc;

/// A named transform invoked with the pipe syntax: `input | name:arg1:arg2`.
///
/// # Example
/// ```rust
/// use bindex::filters::Filter;
/// use bindex::{EvalError, Value};
///
/// struct Double;
///
/// impl Filter for Double {
///     fn name(&self) -> &str { "double" }
///
///     fn apply(&self, input: &Value, _args: &[Value]) -> Result<Value, EvalError> {
///         Ok(Value::Number(input.to_number() * 2.0))
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Name used after the pipe (case-sensitive)
    fn name(&self) -> &str;

    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, EvalError>;

    /// Stateful filters may return different output for the same input, so calls to them
    /// are never folded into constants or reduced to their arguments when dirty-checking.
    fn is_stateful(&self) -> bool {
        false
    }
}

type FilterFn = dyn Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync;

/// Closure-backed filter.
pub struct FnFilter {
    name: String,
    func: Box<FilterFn>,
    stateful: bool,
}

impl FnFilter {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
            stateful: false,
        }
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, EvalError> {
        (self.func)(input, args)
    }

    fn is_stateful(&self) -> bool {
        self.stateful
    }
}

/// Concurrent filter registry, shared by the compiler and every compiled expression.
pub struct FilterRegistry {
    filters: DashMap<String, Arc<dyn Filter>>,
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self {
            filters: DashMap::new(),
        }
    }

    /// Register (or replace) a filter. The name must be a plain identifier.
    pub fn register(&self, filter: Box<dyn Filter>) -> Result<(), Error> {
        let name = filter.name().to_string();
        if !is_valid_name(&name) {
            return Err(Error::InvalidFilterName(name));
        }
        log::debug!("registering filter '{}'", name);
        self.filters.insert(name, Arc::from(filter));
        Ok(())
    }

    pub fn register_fn<F>(&self, name: &str, func: F) -> Result<(), Error>
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.register(Box::new(FnFilter::new(name, func)))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Filter>> {
        self.filters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Unregistered names count as stateless.
    pub fn is_stateful(&self, name: &str) -> bool {
        self.filters
            .get(name)
            .map(|entry| entry.value().is_stateful())
            .unwrap_or(false)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.filters.remove(name).is_some()
    }

    pub fn list_filters(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = FilterRegistry::new();
        registry
            .register_fn("double", |input, _| Ok(Value::Number(input.to_number() * 2.0)))
            .unwrap();
        assert!(registry.has_filter("double"));
        assert!(!registry.has_filter("Double"));
        let filter = registry.get("double").unwrap();
        assert_eq!(filter.apply(&Value::from(4), &[]).unwrap(), Value::Number(8.0));
        assert_eq!(registry.list_filters(), vec!["double".to_string()]);
        assert!(registry.unregister("double"));
        assert!(registry.is_empty());
    }

    #[test]
    fn rejects_bad_names() {
        let registry = FilterRegistry::new();
        let err = registry.register_fn("1abc", |v, _| Ok(v.clone())).unwrap_err();
        assert_eq!(err, Error::InvalidFilterName("1abc".into()));
        assert!(registry.register_fn("a-b", |v, _| Ok(v.clone())).is_err());
        assert!(registry.register_fn("", |v, _| Ok(v.clone())).is_err());
    }

    #[test]
    fn statefulness() {
        let registry = FilterRegistry::new();
        registry
            .register(Box::new(FnFilter::new("now", |_, _| Ok(Value::Null)).stateful()))
            .unwrap();
        assert!(registry.is_stateful("now"));
        assert!(!registry.is_stateful("missing"));
    }
}
