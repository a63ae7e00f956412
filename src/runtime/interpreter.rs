//! Turns a syntax tree into a tree of evaluator closures, walking it once.

use crate::ast::{LogicalOp, Node};
use crate::compiled::{
    assign_fn, eval_fn, Body, CompiledExpression, EvalFn, Input, Scope, WatchStrategy,
};
use crate::error::EvalError;
use crate::filters::FilterRegistry;
use crate::runtime::analysis;
use crate::runtime::operators;
use crate::types::Value;
use std::sync::Arc;

/// Result of evaluating something that may be written to or called as a method.
struct Reference {
    base: Value,
    name: Option<String>,
    value: Value,
}

impl Reference {
    fn value(value: Value) -> Self {
        Self {
            base: Value::Undefined,
            name: None,
            value,
        }
    }
}

type RefFn = Arc<dyn Fn(&Scope<'_>) -> Result<Reference, EvalError> + Send + Sync>;

fn ref_fn<F>(f: F) -> RefFn
where
    F: Fn(&Scope<'_>) -> Result<Reference, EvalError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Whether evaluation should create missing objects along the way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Create {
    No,
    /// Missing segments become `{}`.
    Vivify,
    /// Root of an assignment target: the segments below it are vivified, the target itself is not.
    Target,
}

impl Create {
    fn for_object(self) -> Create {
        match self {
            Create::No => Create::No,
            _ => Create::Vivify,
        }
    }
}

fn vivify(base: &Value, name: &str) -> Result<(), EvalError> {
    match base {
        Value::Object(_) if base.get(name).is_nullish() => base.set(name, Value::empty_object()),
        Value::Array(_) if name.parse::<usize>().is_ok() && base.get(name).is_nullish() => {
            base.set(name, Value::empty_object())
        }
        _ => Ok(()),
    }
}

fn write(target: Reference, value: Value) -> Result<Value, EvalError> {
    let name = target.name.ok_or_else(|| EvalError::NonAssignable {
        name: String::new(),
        reason: "target is not a property".to_string(),
    })?;
    target.base.set(&name, value.clone())?;
    Ok(value)
}

pub struct Interpreter {
    filters: Arc<FilterRegistry>,
}

impl Interpreter {
    pub fn new(filters: Arc<FilterRegistry>) -> Self {
        Self { filters }
    }

    /// Compile a `Program` node into an executable expression with its metadata.
    /// The returned expression has no watch strategy attached yet.
    pub fn compile(&self, program: &Node, source: &str) -> CompiledExpression {
        let analysis = analysis::analyze(program, &self.filters);
        let eval = self.compile_node(program, Create::No);

        let inputs = analysis.inputs.map(|targets| {
            targets
                .iter()
                .map(|target| Input::new(self.compile_node(target.node, Create::No), target.purity))
                .collect()
        });

        let assign = match program.statements() {
            [statement] if statement.expression().is_assignable() => {
                let target = self.compile_ref(statement.expression(), Create::Target);
                Some(assign_fn(move |scope, value| write(target(scope)?, value)))
            }
            _ => None,
        };

        CompiledExpression {
            source: source.to_string(),
            body: Body::Compiled(eval),
            assign,
            inputs,
            constant: analysis.constant,
            literal: analysis.literal,
            one_time: false,
            strategy: WatchStrategy::None,
        }
    }

    fn compile_node(&self, node: &Node, create: Create) -> EvalFn {
        match node {
            Node::Program { body } => {
                let statements: Vec<EvalFn> = body
                    .iter()
                    .map(|statement| self.compile_node(statement.expression(), Create::No))
                    .collect();
                eval_fn(move |scope| {
                    let mut last = Value::Undefined;
                    for statement in &statements {
                        last = statement(scope)?;
                    }
                    Ok(last)
                })
            }
            Node::ExpressionStatement { expression } => self.compile_node(expression, create),
            Node::Literal { value } => {
                let value = value.clone();
                eval_fn(move |_| Ok(value.clone()))
            }
            Node::This => eval_fn(|scope| Ok(scope.context.clone())),
            Node::Locals => eval_fn(|scope| Ok(scope.locals.cloned().unwrap_or(Value::Undefined))),
            Node::Identifier { .. } | Node::Member { .. } => {
                let reference = self.compile_ref(node, create);
                eval_fn(move |scope| Ok(reference(scope)?.value))
            }
            Node::Unary { operator, argument } => {
                let operator = *operator;
                let argument = self.compile_node(argument, Create::No);
                eval_fn(move |scope| Ok(operators::unary(operator, &argument(scope)?)))
            }
            Node::Binary {
                operator,
                left,
                right,
            } => {
                let operator = *operator;
                let left = self.compile_node(left, Create::No);
                let right = self.compile_node(right, Create::No);
                eval_fn(move |scope| {
                    let l = left(scope)?;
                    let r = right(scope)?;
                    Ok(operators::binary(operator, &l, &r))
                })
            }
            Node::Logical {
                operator,
                left,
                right,
            } => {
                let operator = *operator;
                let left = self.compile_node(left, Create::No);
                let right = self.compile_node(right, Create::No);
                eval_fn(move |scope| {
                    let l = left(scope)?;
                    match (operator, l.is_truthy()) {
                        (LogicalOp::And, true) | (LogicalOp::Or, false) => right(scope),
                        _ => Ok(l),
                    }
                })
            }
            Node::Conditional {
                test,
                when_true,
                when_false,
            } => {
                let test = self.compile_node(test, Create::No);
                let when_true = self.compile_node(when_true, create);
                let when_false = self.compile_node(when_false, create);
                eval_fn(move |scope| {
                    if test(scope)?.is_truthy() {
                        when_true(scope)
                    } else {
                        when_false(scope)
                    }
                })
            }
            Node::Call {
                callee,
                arguments,
                filter,
            } => {
                let args: Vec<EvalFn> = arguments
                    .iter()
                    .map(|arg| self.compile_node(arg, Create::No))
                    .collect();
                if *filter {
                    self.compile_filter(callee, args)
                } else {
                    self.compile_call(callee, args)
                }
            }
            Node::Assignment { left, right } => {
                let target = self.compile_ref(left, Create::Target);
                let right = self.compile_node(right, Create::No);
                eval_fn(move |scope| {
                    let target = target(scope)?;
                    let value = right(scope)?;
                    write(target, value)
                })
            }
            Node::Array { elements } => {
                let elements: Vec<EvalFn> = elements
                    .iter()
                    .map(|e| self.compile_node(e, Create::No))
                    .collect();
                eval_fn(move |scope| {
                    let values = elements
                        .iter()
                        .map(|element| element(scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::array(values))
                })
            }
            Node::Object { properties } => {
                let entries: Vec<(PropertyKey, EvalFn)> = properties
                    .iter()
                    .map(|property| {
                        let key = if property.computed {
                            PropertyKey::Computed(self.compile_node(&property.key, Create::No))
                        } else {
                            PropertyKey::Static(match &property.key {
                                Node::Identifier { name } => name.clone(),
                                Node::Literal { value } => value.to_js_string(),
                                other => other.to_string(),
                            })
                        };
                        (key, self.compile_node(&property.value, Create::No))
                    })
                    .collect();
                eval_fn(move |scope| {
                    let object = Value::empty_object();
                    for (key, value) in &entries {
                        let key = match key {
                            PropertyKey::Static(name) => name.clone(),
                            PropertyKey::Computed(eval) => eval(scope)?.to_js_string(),
                        };
                        object.set(&key, value(scope)?)?;
                    }
                    Ok(object)
                })
            }
        }
    }

    fn compile_ref(&self, node: &Node, create: Create) -> RefFn {
        match node {
            Node::Identifier { name } => {
                let name = name.clone();
                ref_fn(move |scope| {
                    let base = match scope.locals {
                        Some(locals) if locals.has_own(&name) => locals.clone(),
                        _ => scope.context.clone(),
                    };
                    if create == Create::Vivify {
                        vivify(&base, &name)?;
                    }
                    let value = base.get(&name);
                    Ok(Reference {
                        base,
                        name: Some(name.clone()),
                        value,
                    })
                })
            }
            Node::Member {
                object,
                property,
                computed: false,
            } => {
                let object = self.compile_node(object, create.for_object());
                let name = match property.as_ref() {
                    Node::Identifier { name } => name.clone(),
                    other => other.to_string(),
                };
                ref_fn(move |scope| {
                    let base = object(scope)?;
                    if create == Create::Vivify {
                        vivify(&base, &name)?;
                    }
                    let value = base.get(&name);
                    Ok(Reference {
                        base,
                        name: Some(name.clone()),
                        value,
                    })
                })
            }
            Node::Member {
                object,
                property,
                computed: true,
            } => {
                let object = self.compile_node(object, create.for_object());
                let property = self.compile_node(property, Create::No);
                ref_fn(move |scope| {
                    let base = object(scope)?;
                    if base.is_nullish() {
                        return Ok(Reference {
                            base,
                            name: None,
                            value: Value::Undefined,
                        });
                    }
                    let name = property(scope)?.to_js_string();
                    if create == Create::Vivify {
                        vivify(&base, &name)?;
                    }
                    let value = base.get(&name);
                    Ok(Reference {
                        base,
                        name: Some(name),
                        value,
                    })
                })
            }
            other => {
                let eval = self.compile_node(other, create);
                ref_fn(move |scope| Ok(Reference::value(eval(scope)?)))
            }
        }
    }

    fn compile_call(&self, callee: &Node, args: Vec<EvalFn>) -> EvalFn {
        let target = self.compile_ref(callee, Create::No);
        let callee_text = callee.to_string();
        eval_fn(move |scope| {
            let reference = target(scope)?;
            match &reference.value {
                Value::Undefined | Value::Null => Ok(Value::Undefined),
                Value::Function(func) => {
                    let values = args
                        .iter()
                        .map(|arg| arg(scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    func.call(&reference.base, &values)
                }
                _ => Err(EvalError::NotAFunction {
                    callee: callee_text.clone(),
                }),
            }
        })
    }

    fn compile_filter(&self, callee: &Node, args: Vec<EvalFn>) -> EvalFn {
        let name = match callee {
            Node::Identifier { name } => name.clone(),
            other => other.to_string(),
        };
        let filters = Arc::clone(&self.filters);
        eval_fn(move |scope| {
            let filter = filters
                .get(&name)
                .ok_or_else(|| EvalError::UnknownFilter { name: name.clone() })?;
            log::trace!("applying filter '{}'", name);
            let values = args
                .iter()
                .map(|arg| arg(scope))
                .collect::<Result<Vec<_>, _>>()?;
            match values.split_first() {
                Some((input, rest)) => filter.apply(input, rest),
                None => filter.apply(&Value::Undefined, &[]),
            }
        })
    }
}

enum PropertyKey {
    Static(String),
    Computed(EvalFn),
}
