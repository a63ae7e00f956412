use bindex::{add_interceptor, EvalError, Interceptor, ParseService, Purity, Value, WatchStrategy};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ctx(json: serde_json::Value) -> Value {
    Value::from_json(json)
}

fn add_one() -> Interceptor {
    Interceptor::new(|value| Ok(Value::Number(value.to_number() + 1.0)))
}

fn times_ten() -> Interceptor {
    Interceptor::new(|value| Ok(Value::Number(value.to_number() * 10.0)))
}

#[test]
fn test_interceptor_transforms_result() {
    let service = ParseService::new();
    let expr = service
        .parse_with("a", Interceptor::new(|value| Ok(Value::String(value.to_js_string()))))
        .unwrap();
    assert!(expr.is_intercepted());
    assert_eq!(expr.evaluate(&ctx(json!({"a": 1}))).unwrap(), Value::from("1"));
}

#[test]
fn test_intercepted_expressions_are_not_cached() {
    let service = ParseService::new();
    let plain = service.parse("a").unwrap();
    let a = service.parse_with("a", add_one()).unwrap();
    let b = service.parse_with("a", add_one()).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &plain));
    assert!(Arc::ptr_eq(&plain, &service.parse("a").unwrap()));
    assert_eq!(service.cache().len(), 1);
}

#[test]
fn test_flags_are_copied_from_the_inner_expression() {
    let service = ParseService::new();
    let literal = service.parse_with("[1, 2]", add_one()).unwrap();
    assert!(literal.is_constant());
    assert!(literal.is_literal());
    assert_eq!(literal.watch_strategy(), WatchStrategy::Constant);

    let once = service.parse_with("::a", add_one()).unwrap();
    assert!(once.is_one_time());
    assert_eq!(once.watch_strategy(), WatchStrategy::OneTime);
    assert_eq!(once.source(), "a");
}

#[test]
fn test_whole_expression_becomes_the_input() {
    let service = ParseService::new();
    let expr = service.parse_with("a", add_one()).unwrap();
    let inputs = expr.inputs().unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].purity(), Purity::Impure);
    assert_eq!(expr.watch_strategy(), WatchStrategy::SingleInput);

    let c = ctx(json!({"a": 1}));
    // the input is the raw, un-intercepted value
    assert_eq!(inputs[0].evaluate(&c, None).unwrap(), Value::from(1));
    // a precomputed input replaces the inner evaluation
    assert_eq!(
        expr.evaluate_with_inputs(&c, None, &[Value::from(5)]).unwrap(),
        Value::from(6)
    );
    assert_eq!(expr.evaluate(&c).unwrap(), Value::from(2));
}

#[test]
fn test_inner_inputs_are_reused() {
    let service = ParseService::new();
    let expr = service.parse_with("a * b", add_one()).unwrap();
    let purities: Vec<Purity> = expr.inputs().unwrap().iter().map(|i| i.purity()).collect();
    assert_eq!(purities, vec![Purity::Absolute, Purity::Absolute]);
    assert_eq!(expr.watch_strategy(), WatchStrategy::MultiInput);

    let c = ctx(json!({"a": 2, "b": 3}));
    // inputs only feed the inner expression, which still reads the context
    assert_eq!(
        expr.evaluate_with_inputs(&c, None, &[Value::from(100), Value::from(100)])
            .unwrap(),
        Value::from(7)
    );
}

#[test]
fn test_impure_interceptor_depurifies_relative_inputs() {
    let service = ParseService::new();
    let plain = service.parse("[a]").unwrap();
    assert_eq!(plain.inputs().unwrap()[0].purity(), Purity::Relative);

    let impure = service.parse_with("[a]", add_one()).unwrap();
    assert_eq!(impure.inputs().unwrap()[0].purity(), Purity::Impure);

    let pure = service.parse_with("[a]", add_one().pure()).unwrap();
    assert_eq!(pure.inputs().unwrap()[0].purity(), Purity::Relative);
}

#[test]
fn test_stateful_interceptor_drops_inputs() {
    let service = ParseService::new();
    let expr = service.parse_with("a + b", add_one().stateful()).unwrap();
    assert!(expr.inputs().is_none());
    assert_eq!(expr.watch_strategy(), WatchStrategy::None);

    let constant = service.parse_with("1 + 2", add_one().stateful()).unwrap();
    assert_eq!(constant.watch_strategy(), WatchStrategy::Constant);
}

#[test]
fn test_re_interception_chains_interceptors() {
    let service = ParseService::new();
    let first = service.parse_with("a", add_one()).unwrap();
    let second = add_interceptor(Arc::clone(&first), times_ten());
    let c = ctx(json!({"a": 1}));
    assert_eq!(first.evaluate(&c).unwrap(), Value::from(2));
    assert_eq!(second.evaluate(&c).unwrap(), Value::from(20));
    assert_eq!(second.inputs().unwrap().len(), 1);
    assert_eq!(
        second.evaluate_with_inputs(&c, None, &[Value::from(4)]).unwrap(),
        Value::from(50)
    );
}

#[test]
fn test_chained_flags_combine() {
    let service = ParseService::new();
    let stateful = service.parse_with("a", add_one().stateful()).unwrap();
    let chained = add_interceptor(stateful, times_ten().pure());
    assert!(chained.inputs().is_none());

    let pure = service.parse_with("[a]", add_one().pure()).unwrap();
    let mixed = add_interceptor(pure, times_ten());
    assert_eq!(mixed.inputs().unwrap()[0].purity(), Purity::Impure);
}

#[test]
fn test_interceptor_errors_propagate() {
    let service = ParseService::new();
    let expr = service
        .parse_with("a", Interceptor::new(|_| Err(EvalError::host("rejected"))))
        .unwrap();
    assert_eq!(
        expr.evaluate(&ctx(json!({"a": 1}))),
        Err(EvalError::Host("rejected".to_string()))
    );
}

#[test]
fn test_intercepted_expression_stays_assignable() {
    let service = ParseService::new();
    let expr = service.parse_with("a.b", add_one()).unwrap();
    assert!(expr.is_assignable());
    let c = ctx(json!({}));
    expr.assign(&c, Value::from(4)).unwrap();
    assert_eq!(expr.evaluate(&c).unwrap(), Value::from(5));
}

#[test]
fn test_interceptor_runs_once_per_evaluation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = ParseService::new();
    let expr = service
        .parse_with(
            "a",
            Interceptor::new(move |value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            }),
        )
        .unwrap();
    let c = ctx(json!({"a": 1}));
    expr.evaluate(&c).unwrap();
    expr.evaluate(&c).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
