use crate::error::EvalError;
use crate::types::{HostFunction, Value};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Call-time environment: `context` resolves identifiers, `locals` shadows it.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a Value,
    pub locals: Option<&'a Value>,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a Value, locals: Option<&'a Value>) -> Self {
        Self { context, locals }
    }
}

pub type EvalFn = Arc<dyn Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync>;
pub type AssignFn = Arc<dyn Fn(&Scope<'_>, Value) -> Result<Value, EvalError> + Send + Sync>;

pub(crate) fn eval_fn<F>(f: F) -> EvalFn
where
    F: Fn(&Scope<'_>) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn assign_fn<F>(f: F) -> AssignFn
where
    F: Fn(&Scope<'_>, Value) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How an input's values may be compared between checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purity {
    /// Reference values must be treated as changed on every check.
    Impure,
    /// Identity comparison is enough as long as nothing impure sits above.
    Relative,
    /// Produces primitives only; identity comparison is always enough.
    Absolute,
}

/// Strategy the dirty-checking loop uses to watch an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStrategy {
    /// Plain evaluation and comparison every check.
    None,
    /// Evaluate once, then stop watching.
    Constant,
    /// Watch until the value settles, then stop.
    OneTime,
    SingleInput,
    MultiInput,
}

/// A sub-expression whose value the whole expression depends on.
#[derive(Clone)]
pub struct Input {
    eval: EvalFn,
    purity: Purity,
}

impl Input {
    pub(crate) fn new(eval: EvalFn, purity: Purity) -> Self {
        Self { eval, purity }
    }

    pub fn evaluate(&self, context: &Value, locals: Option<&Value>) -> Result<Value, EvalError> {
        (self.eval)(&Scope::new(context, locals))
    }

    pub fn purity(&self) -> Purity {
        self.purity
    }

    /// Whether an unchanged identity means an unchanged value.
    pub fn compares_identity(&self) -> bool {
        self.purity != Purity::Impure
    }

    /// The whole expression as its own, impure, input.
    pub(crate) fn whole(expression: Arc<CompiledExpression>) -> Input {
        Input::new(
            eval_fn(move |scope| expression.run(scope, None)),
            Purity::Impure,
        )
    }

    pub(crate) fn depurified(&self) -> Input {
        match self.purity {
            Purity::Relative => Input::new(Arc::clone(&self.eval), Purity::Impure),
            _ => self.clone(),
        }
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input").field("purity", &self.purity).finish()
    }
}

type InterceptFn = dyn Fn(Value) -> Result<Value, EvalError> + Send + Sync;

/// Post-processing step applied to an expression's result.
#[derive(Clone)]
pub struct Interceptor {
    apply: Arc<InterceptFn>,
    stateful: bool,
    pure: bool,
}

impl Interceptor {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            apply: Arc::new(f),
            stateful: false,
            pure: false,
        }
    }

    /// Output may change without the input changing.
    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }

    /// Output is a function of the input's value alone.
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    pub fn is_stateful(&self) -> bool {
        self.stateful
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }

    pub fn apply(&self, value: Value) -> Result<Value, EvalError> {
        (self.apply)(value)
    }

    /// Applies `first`, then `second`.
    pub fn chain(first: &Interceptor, second: &Interceptor) -> Interceptor {
        let (a, b) = (Arc::clone(&first.apply), Arc::clone(&second.apply));
        Interceptor {
            apply: Arc::new(move |value| b(a(value)?)),
            stateful: first.stateful || second.stateful,
            pure: first.pure && second.pure,
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("stateful", &self.stateful)
            .field("pure", &self.pure)
            .finish()
    }
}

pub(crate) enum Body {
    Compiled(EvalFn),
    Host(HostFunction),
    Intercepted {
        inner: Arc<CompiledExpression>,
        interceptor: Interceptor,
        use_inputs: bool,
    },
}

/// A compiled, immutable, shareable expression plus its dirty-check metadata.
pub struct CompiledExpression {
    pub(crate) source: String,
    pub(crate) body: Body,
    pub(crate) assign: Option<AssignFn>,
    pub(crate) inputs: Option<Vec<Input>>,
    pub(crate) constant: bool,
    pub(crate) literal: bool,
    pub(crate) one_time: bool,
    pub(crate) strategy: WatchStrategy,
}

impl CompiledExpression {
    pub fn evaluate(&self, context: &Value) -> Result<Value, EvalError> {
        self.evaluate_with_locals(context, None)
    }

    pub fn evaluate_with_locals(
        &self,
        context: &Value,
        locals: Option<&Value>,
    ) -> Result<Value, EvalError> {
        self.run(&Scope::new(context, locals), None)
    }

    /// Evaluate with input values already computed by the caller, in `inputs()` order.
    pub fn evaluate_with_inputs(
        &self,
        context: &Value,
        locals: Option<&Value>,
        inputs: &[Value],
    ) -> Result<Value, EvalError> {
        self.run(&Scope::new(context, locals), Some(inputs))
    }

    pub(crate) fn run(&self, scope: &Scope<'_>, inputs: Option<&[Value]>) -> Result<Value, EvalError> {
        match &self.body {
            Body::Compiled(eval) => eval(scope),
            Body::Host(func) => func.call(
                scope.context,
                &[
                    scope.context.clone(),
                    scope.locals.cloned().unwrap_or(Value::Undefined),
                ],
            ),
            Body::Intercepted {
                inner,
                interceptor,
                use_inputs,
            } => {
                let value = match inputs.and_then(|values| values.first()) {
                    Some(value) if *use_inputs => value.clone(),
                    _ => inner.run(scope, inputs)?,
                };
                interceptor.apply(value)
            }
        }
    }

    pub fn is_assignable(&self) -> bool {
        self.assign.is_some()
    }

    /// Write `value` through the expression's target path, creating missing
    /// intermediate objects. Returns the written value.
    pub fn assign(&self, context: &Value, value: Value) -> Result<Value, EvalError> {
        self.assign_with_locals(context, None, value)
    }

    pub fn assign_with_locals(
        &self,
        context: &Value,
        locals: Option<&Value>,
        value: Value,
    ) -> Result<Value, EvalError> {
        match &self.assign {
            Some(setter) => setter(&Scope::new(context, locals), value),
            None => Err(EvalError::NonAssignable {
                name: self.source.clone(),
                reason: "expression is not assignable".to_string(),
            }),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn is_literal(&self) -> bool {
        self.literal
    }

    pub fn is_one_time(&self) -> bool {
        self.one_time
    }

    pub fn inputs(&self) -> Option<&[Input]> {
        self.inputs.as_deref()
    }

    pub fn watch_strategy(&self) -> WatchStrategy {
        self.strategy
    }

    pub fn is_intercepted(&self) -> bool {
        matches!(self.body, Body::Intercepted { .. })
    }

    /// Summary of the dirty-check metadata, as printed by the CLI.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "source": self.source,
            "constant": self.constant,
            "literal": self.literal,
            "one_time": self.one_time,
            "assignable": self.is_assignable(),
            "inputs": self.inputs().map(|inputs| inputs.iter().map(Input::purity).collect::<Vec<_>>()),
            "watch_strategy": self.strategy,
        })
    }
}

impl fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("source", &self.source)
            .field("constant", &self.constant)
            .field("literal", &self.literal)
            .field("one_time", &self.one_time)
            .field("inputs", &self.inputs)
            .field("strategy", &self.strategy)
            .finish()
    }
}
