//! Reference consumer of the dirty-check metadata attached to compiled expressions.

use crate::compiled::{CompiledExpression, WatchStrategy};
use crate::error::EvalError;
use crate::runtime::operators::strict_equals;
use crate::types::Value;
use std::sync::Arc;

fn is_nan(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_nan())
}

/// Strict identity, except that NaN equals NaN.
pub fn identical(a: &Value, b: &Value) -> bool {
    strict_equals(a, b) || (is_nan(a) && is_nan(b))
}

/// Whether an input changed since the last check. `None` means it was never read.
pub fn input_changed(new: &Value, old: Option<&Value>, compare_identity: bool) -> bool {
    let old = match old {
        Some(old) => old,
        None => return true,
    };
    if new.is_nullish() || old.is_nullish() {
        return !strict_equals(new, old);
    }
    if matches!(new, Value::Array(_) | Value::Object(_)) && !compare_identity {
        return true;
    }
    !identical(new, old)
}

/// A one-time binding is settled once its value is defined; for literals every
/// element or property must be defined.
pub fn is_settled(value: &Value, literal: bool) -> bool {
    if !literal {
        return value.is_defined();
    }
    match value {
        Value::Array(items) => items.read().iter().all(Value::is_defined),
        Value::Object(map) => map.read().values().all(Value::is_defined),
        other => other.is_defined(),
    }
}

/// Watches one expression, re-evaluating only as much as its strategy requires.
pub struct Watcher {
    expression: Arc<CompiledExpression>,
    last: Option<Value>,
    last_inputs: Vec<Option<Value>>,
    evaluations: usize,
    finished: bool,
}

impl Watcher {
    pub fn new(expression: Arc<CompiledExpression>) -> Self {
        let inputs = expression.inputs().map(<[_]>::len).unwrap_or(0);
        Self {
            expression,
            last: None,
            last_inputs: vec![None; inputs],
            evaluations: 0,
            finished: false,
        }
    }

    /// Run one check. Returns the new value when the listener should fire.
    pub fn check(
        &mut self,
        context: &Value,
        locals: Option<&Value>,
    ) -> Result<Option<Value>, EvalError> {
        if self.finished {
            return Ok(None);
        }
        match self.expression.watch_strategy() {
            WatchStrategy::Constant => {
                let value = self.evaluate(context, locals, None)?;
                self.finished = true;
                Ok(self.record(value))
            }
            WatchStrategy::OneTime => {
                let value = self.evaluate(context, locals, None)?;
                if is_settled(&value, self.expression.is_literal()) {
                    self.finished = true;
                }
                Ok(self.record(value))
            }
            WatchStrategy::SingleInput | WatchStrategy::MultiInput => {
                let inputs = self.expression.inputs().unwrap_or(&[]);
                let mut changed = false;
                let mut values = Vec::with_capacity(inputs.len());
                for (input, old) in inputs.iter().zip(&self.last_inputs) {
                    let value = input.evaluate(context, locals)?;
                    changed |= input_changed(&value, old.as_ref(), input.compares_identity());
                    values.push(value);
                }
                if !changed {
                    return Ok(None);
                }
                let result = self.evaluate(context, locals, Some(&values))?;
                self.last_inputs = values.into_iter().map(Some).collect();
                Ok(self.record(result))
            }
            WatchStrategy::None => {
                let value = self.evaluate(context, locals, None)?;
                Ok(self.record(value))
            }
        }
    }

    fn evaluate(
        &mut self,
        context: &Value,
        locals: Option<&Value>,
        inputs: Option<&[Value]>,
    ) -> Result<Value, EvalError> {
        self.evaluations += 1;
        match inputs {
            Some(values) => self.expression.evaluate_with_inputs(context, locals, values),
            None => self.expression.evaluate_with_locals(context, locals),
        }
    }

    fn record(&mut self, value: Value) -> Option<Value> {
        let changed = match &self.last {
            None => true,
            // literals build a fresh container on every evaluation
            Some(last) if self.expression.is_literal() => *last != value,
            Some(last) => !identical(last, &value),
        };
        if changed {
            self.last = Some(value.clone());
            Some(value)
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn last_value(&self) -> Option<&Value> {
        self.last.as_ref()
    }

    /// How many times the full expression has been evaluated.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn expression(&self) -> &Arc<CompiledExpression> {
        &self.expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_check_rule() {
        let obj = Value::empty_object();
        assert!(input_changed(&1.into(), None, true));
        assert!(!input_changed(&1.into(), Some(&1.into()), true));
        assert!(!input_changed(&f64::NAN.into(), Some(&f64::NAN.into()), true));
        assert!(input_changed(&Value::Null, Some(&Value::Undefined), true));
        assert!(!input_changed(&obj, Some(&obj.clone()), true));
        assert!(input_changed(&obj, Some(&obj.clone()), false));
        assert!(!input_changed(&"a".into(), Some(&"a".into()), false));
    }

    #[test]
    fn settled_values() {
        assert!(!is_settled(&Value::Undefined, false));
        assert!(is_settled(&Value::Null, false));
        let partial = Value::array(vec![1.into(), Value::Undefined]);
        assert!(is_settled(&partial, false));
        assert!(!is_settled(&partial, true));
    }
}
