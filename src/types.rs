use crate::error::EvalError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

pub type Object = HashMap<String, Value>;
pub type ObjectRef = Arc<RwLock<Object>>;
pub type ArrayRef = Arc<RwLock<Vec<Value>>>;

/// How far past its end an array may be grown by a single index write.
pub const MAX_ARRAY_GAP: usize = 1 << 16;

type NativeFn = dyn Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync;

/// A callable host value. Receives the receiver (`this`) and the evaluated arguments.
#[derive(Clone)]
pub struct HostFunction(Arc<NativeFn>);

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(this, args)
    }

    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Dynamic value flowing through compiled expressions.
///
/// Arrays and objects have reference semantics: cloning a `Value::Object` shares the
/// underlying map, so writes made by an assignment are visible through every handle.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(HostFunction),
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(RwLock::new(items)))
    }

    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let map: Object = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Value::Object(Arc::new(RwLock::new(map)))
    }

    pub fn empty_object() -> Self {
        Value::Object(Arc::new(RwLock::new(Object::new())))
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Value::Function(HostFunction::new(f))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_defined(&self) -> bool {
        !self.is_undefined()
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Arrays, objects and functions: values compared by identity.
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Function(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Property read. Reading from anything that cannot hold `key` yields `undefined`.
    pub fn get(&self, key: &str) -> Value {
        match self {
            Value::Object(map) => map.read().get(key).cloned().unwrap_or(Value::Undefined),
            Value::Array(items) => {
                let items = items.read();
                if key == "length" {
                    return Value::Number(items.len() as f64);
                }
                array_index(key)
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined)
            }
            Value::String(s) => {
                if key == "length" {
                    return Value::Number(s.chars().count() as f64);
                }
                array_index(key)
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or(Value::Undefined)
            }
            _ => Value::Undefined,
        }
    }

    /// Whether `key` is an own property (`key in value`).
    pub fn has_own(&self, key: &str) -> bool {
        match self {
            Value::Object(map) => map.read().contains_key(key),
            Value::Array(items) => {
                key == "length" || array_index(key).is_some_and(|i| i < items.read().len())
            }
            _ => false,
        }
    }

    /// Property write. Only objects and arrays (index keys) are writable.
    pub fn set(&self, key: &str, value: Value) -> Result<(), EvalError> {
        match self {
            Value::Object(map) => {
                map.write().insert(key.to_string(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = array_index(key).ok_or_else(|| EvalError::NonAssignable {
                    name: key.to_string(),
                    reason: "arrays only accept index keys".to_string(),
                })?;
                let mut items = items.write();
                if index >= items.len() {
                    if index - items.len() >= MAX_ARRAY_GAP {
                        return Err(EvalError::NonAssignable {
                            name: key.to_string(),
                            reason: format!(
                                "index is more than {MAX_ARRAY_GAP} past the end of the array"
                            ),
                        });
                    }
                    items.resize(index + 1, Value::Undefined);
                }
                items[index] = value;
                Ok(())
            }
            other => Err(EvalError::NonAssignable {
                name: key.to_string(),
                reason: format!("cannot set a property on {}", other.type_name()),
            }),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Numeric conversion (`Number(value)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Array(_) | Value::Object(_) => string_to_number(&self.to_js_string()),
            Value::Function(_) => f64::NAN,
        }
    }

    /// String conversion (`String(value)`). An array nested inside itself renders as `""`.
    pub fn to_js_string(&self) -> String {
        self.js_string_in(&mut Vec::new())
    }

    fn js_string_in(&self, seen: &mut Vec<*const ()>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                let ptr = Arc::as_ptr(items) as *const ();
                if seen.contains(&ptr) {
                    return String::new();
                }
                seen.push(ptr);
                let joined = items
                    .read()
                    .iter()
                    .map(|item| {
                        if item.is_nullish() {
                            String::new()
                        } else {
                            item.js_string_in(seen)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                seen.pop();
                joined
            }
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function () { [native code] }".to_string(),
        }
    }

    /// Primitive conversion used by `+` and the relational operators.
    pub fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                Value::String(self.to_js_string())
            }
            other => other.clone(),
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from_json(v))))
            }
        }
    }

    /// JSON rendering. `undefined`, functions and non-finite numbers become `null`,
    /// and so does a container nested inside itself.
    pub fn to_json(&self) -> serde_json::Value {
        self.json_in(&mut Vec::new())
    }

    fn json_in(&self, seen: &mut Vec<*const ()>) -> serde_json::Value {
        let ptr = match self {
            Value::Array(items) => Arc::as_ptr(items) as *const (),
            Value::Object(map) => Arc::as_ptr(map) as *const (),
            Value::Undefined | Value::Null | Value::Function(_) => return serde_json::Value::Null,
            Value::Boolean(b) => return serde_json::Value::Bool(*b),
            Value::Number(n) => {
                return serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
            Value::String(s) => return serde_json::Value::String(s.clone()),
        };
        if seen.contains(&ptr) {
            return serde_json::Value::Null;
        }
        seen.push(ptr);
        let json = match self {
            Value::Array(items) => {
                serde_json::Value::Array(items.read().iter().map(|v| v.json_in(seen)).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.json_in(seen)))
                    .collect(),
            ),
            _ => serde_json::Value::Null,
        };
        seen.pop();
        json
    }
}

/// Structural equality, used by tests and literal comparison. Operator semantics
/// (`==`, `===`) live in `runtime::operators`. A pair of containers already under
/// comparison counts as equal, so cyclic values terminate.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structural_eq(self, other, &mut Vec::new())
    }
}

fn structural_eq(a: &Value, b: &Value, seen: &mut Vec<(*const (), *const ())>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x.ptr_eq(y),
        (Value::Array(x), Value::Array(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as *const (), Arc::as_ptr(y) as *const ());
            if seen.contains(&pair) {
                return true;
            }
            seen.push(pair);
            let (x, y) = (x.read(), y.read());
            let equal =
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| structural_eq(l, r, seen));
            seen.pop();
            equal
        }
        (Value::Object(x), Value::Object(y)) => {
            if Arc::ptr_eq(x, y) {
                return true;
            }
            let pair = (Arc::as_ptr(x) as *const (), Arc::as_ptr(y) as *const ());
            if seen.contains(&pair) {
                return true;
            }
            seen.push(pair);
            let (x, y) = (x.read(), y.read());
            let equal = x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| structural_eq(l, r, seen)));
            seen.pop();
            equal
        }
        _ => false,
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

fn array_index(key: &str) -> Option<usize> {
    let index: usize = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // f64::from_str also accepts "inf" and "nan", which are not numeric literals here
    if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if !(1e-6..1e21).contains(&abs) {
        let s = format!("{:e}", n);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    if n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}
