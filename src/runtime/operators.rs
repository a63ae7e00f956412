//! Coercion rules for each operator of the expression language.

use crate::ast::{BinaryOp, UnaryOp};
use crate::types::Value;
use std::cmp::Ordering;

/// `+`: an undefined operand is skipped, otherwise string concatenation wins over addition.
pub fn plus(left: &Value, right: &Value) -> Value {
    if left.is_undefined() {
        return right.clone();
    }
    if right.is_undefined() {
        return left.clone();
    }
    let (l, r) = (left.to_primitive(), right.to_primitive());
    if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) {
        Value::String(l.to_js_string() + &r.to_js_string())
    } else {
        Value::Number(l.to_number() + r.to_number())
    }
}

/// `-`: undefined operands count as zero.
pub fn minus(left: &Value, right: &Value) -> Value {
    let l = if left.is_defined() { left.to_number() } else { 0.0 };
    let r = if right.is_defined() { right.to_number() } else { 0.0 };
    Value::Number(l - r)
}

pub fn strict_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => std::sync::Arc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => std::sync::Arc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
        _ => false,
    }
}

pub fn loose_equals(left: &Value, right: &Value) -> bool {
    if std::mem::discriminant(left) == std::mem::discriminant(right) {
        return strict_equals(left, right);
    }
    match (left, right) {
        (l, r) if l.is_nullish() || r.is_nullish() => l.is_nullish() && r.is_nullish(),
        (Value::Number(n), Value::String(_)) => *n == right.to_number(),
        (Value::String(_), Value::Number(n)) => left.to_number() == *n,
        (Value::Boolean(_), _) => loose_equals(&Value::Number(left.to_number()), right),
        (_, Value::Boolean(_)) => loose_equals(left, &Value::Number(right.to_number())),
        (l, r) if l.is_reference() && !r.is_reference() => loose_equals(&l.to_primitive(), r),
        (l, r) if !l.is_reference() && r.is_reference() => loose_equals(l, &r.to_primitive()),
        _ => false,
    }
}

/// Abstract relational comparison. `None` when the operands are not comparable (NaN).
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    let (l, r) = (left.to_primitive(), right.to_primitive());
    if let (Value::String(a), Value::String(b)) = (&l, &r) {
        return Some(a.encode_utf16().cmp(b.encode_utf16()));
    }
    l.to_number().partial_cmp(&r.to_number())
}

pub fn unary(operator: UnaryOp, argument: &Value) -> Value {
    match operator {
        UnaryOp::Plus => Value::Number(if argument.is_defined() {
            argument.to_number()
        } else {
            0.0
        }),
        UnaryOp::Minus => Value::Number(if argument.is_defined() {
            -argument.to_number()
        } else {
            -0.0
        }),
        UnaryOp::Not => Value::Boolean(!argument.is_truthy()),
    }
}

pub fn binary(operator: BinaryOp, left: &Value, right: &Value) -> Value {
    match operator {
        BinaryOp::Add => plus(left, right),
        BinaryOp::Sub => minus(left, right),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Boolean(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Gt => Value::Boolean(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Le => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Ge => Value::Boolean(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Boolean(loose_equals(left, right)),
        BinaryOp::Ne => Value::Boolean(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Boolean(strict_equals(left, right)),
        BinaryOp::StrictNe => Value::Boolean(!strict_equals(left, right)),
    }
}
