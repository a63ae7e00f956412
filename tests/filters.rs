use bindex::{
    Error, EvalError, Filter, FnFilter, ParseService, Purity, Value, WatchStrategy,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Suffix;

impl Filter for Suffix {
    fn name(&self) -> &str {
        "suffix"
    }

    fn apply(&self, input: &Value, args: &[Value]) -> Result<Value, EvalError> {
        let suffix = args.first().map(Value::to_js_string).unwrap_or_default();
        Ok(Value::String(input.to_js_string() + &suffix))
    }
}

fn service() -> ParseService {
    let service = ParseService::new();
    service
        .register_filter_fn("add", |input, args| {
            let extra = args.first().map(Value::to_number).unwrap_or(0.0);
            Ok(Value::Number(input.to_number() + extra))
        })
        .unwrap();
    service
        .register_filter_fn("times10", |input, _| Ok(Value::Number(input.to_number() * 10.0)))
        .unwrap();
    service
        .register_filter_fn("double", |input, _| Ok(Value::Number(input.to_number() * 2.0)))
        .unwrap();
    service.register_filter(Box::new(Suffix)).unwrap();
    service
}

fn ctx(json: serde_json::Value) -> Value {
    Value::from_json(json)
}

#[test]
fn test_filter_chain() {
    let service = service();
    let result = service.evaluate("a | add:b | times10", &ctx(json!({"a": 1, "b": 2})));
    assert_eq!(result.unwrap(), Value::from(30));
}

#[test]
fn test_filter_arguments_are_expressions() {
    let service = service();
    let c = ctx(json!({"name": "Ada", "mark": "?"}));
    assert_eq!(service.evaluate("name | suffix:'!'", &c).unwrap(), Value::from("Ada!"));
    assert_eq!(service.evaluate("name | suffix:mark + mark", &c).unwrap(), Value::from("Ada??"));
}

#[test]
fn test_filters_inside_expressions() {
    let service = service();
    let c = Value::object([
        ("a", Value::from(4)),
        ("id", Value::function(|_, args| Ok(args.first().cloned().unwrap_or_default()))),
    ]);
    assert_eq!(service.evaluate("(a | double) + 1", &c).unwrap(), Value::from(9));
    assert_eq!(service.evaluate("id(a | double)", &c).unwrap(), Value::from(8));
    assert_eq!(service.evaluate("[(a | double), a]", &c).unwrap().to_json(), json!([8.0, 4.0]));
}

#[test]
fn test_unknown_filter_fails_at_evaluation() {
    let service = service();
    let expr = service.parse("a | nope").unwrap();
    assert_eq!(
        expr.evaluate(&ctx(json!({"a": 1}))),
        Err(EvalError::UnknownFilter { name: "nope".to_string() })
    );
}

#[test]
fn test_filter_registered_after_compilation() {
    let service = ParseService::new();
    let expr = service.parse("v | late").unwrap();
    service
        .register_filter_fn("late", |input, _| Ok(Value::String(format!("<{input}>"))))
        .unwrap();
    assert_eq!(expr.evaluate(&ctx(json!({"v": "x"}))).unwrap(), Value::from("<x>"));
}

#[test]
fn test_stateless_filter_metadata() {
    let service = service();
    let expr = service.parse("a | double").unwrap();
    assert!(!expr.is_constant());
    assert_eq!(expr.watch_strategy(), WatchStrategy::SingleInput);
    let inputs = expr.inputs().unwrap();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].purity(), Purity::Impure);
    assert_eq!(inputs[0].evaluate(&ctx(json!({"a": 3})), None).unwrap(), Value::from(3));

    let constant_argument = service.parse("2 | double").unwrap();
    assert!(!constant_argument.is_constant());
    assert!(constant_argument.inputs().is_none());
    assert_eq!(constant_argument.watch_strategy(), WatchStrategy::None);
    assert_eq!(
        constant_argument.evaluate(&ctx(json!({}))).unwrap(),
        Value::from(4)
    );
}

#[test]
fn test_stateful_filter_metadata() {
    let service = ParseService::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    service
        .register_filter(Box::new(
            FnFilter::new("tick", move |_, _| {
                Ok(Value::from(counter.fetch_add(1, Ordering::SeqCst) as f64))
            })
            .stateful(),
        ))
        .unwrap();
    assert!(service.filters().is_stateful("tick"));

    let constant_input = service.parse("2 | tick").unwrap();
    assert!(!constant_input.is_constant());
    assert_eq!(constant_input.watch_strategy(), WatchStrategy::None);

    let expr = service.parse("a | tick").unwrap();
    assert!(expr.inputs().is_none());
    let c = ctx(json!({"a": 1}));
    assert_eq!(expr.evaluate(&c).unwrap(), Value::from(0));
    assert_eq!(expr.evaluate(&c).unwrap(), Value::from(1));
}

#[test]
fn test_invalid_filter_names() {
    let service = ParseService::new();
    let result = service.register_filter_fn("not-valid", |input, _| Ok(input.clone()));
    assert_eq!(result, Err(Error::InvalidFilterName("not-valid".to_string())));
    assert!(service.register_filter_fn("", |input, _| Ok(input.clone())).is_err());
    assert!(service.filters().is_empty());
}

#[test]
fn test_registry_listing() {
    let service = service();
    assert_eq!(
        service.filters().list_filters(),
        vec!["add", "double", "suffix", "times10"]
    );
    assert!(service.filters().unregister("add"));
    assert!(!service.filters().has_filter("add"));
}

#[test]
fn test_filter_errors_propagate() {
    let service = ParseService::new();
    service
        .register_filter_fn("fail", |_, _| Err(EvalError::host("bad input")))
        .unwrap();
    assert_eq!(
        service.evaluate("1 | fail", &ctx(json!({}))),
        Err(Error::Eval(EvalError::Host("bad input".to_string())))
    );
}

#[test]
fn test_default_service_filters() {
    bindex::register_filter(Box::new(FnFilter::new("integration_shout", |input, _| {
        Ok(Value::String(input.to_js_string().to_uppercase()))
    })))
    .unwrap();
    let result = bindex::evaluate("'hey' | integration_shout", &Value::empty_object());
    assert_eq!(result.unwrap(), Value::from("HEY"));
}
