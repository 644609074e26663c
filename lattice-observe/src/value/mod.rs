//! Value Model
//!
//! Reactive state is expressed as a graph of [`Value`]s. The variant is
//! decided when a value is built, so every branch point in the observation
//! core (is it a keyed mapping, a sequence, or something we leave alone?)
//! is an exhaustive `match` rather than a runtime type probe.
//!
//! # Identity
//!
//! [`Object`] and [`Array`] are shared handles. Cloning a handle does not
//! copy the container, and two handles are equal only if they point at the
//! same container. Primitive values compare by content, except that `NaN`
//! never equals anything (including itself). This is the "strict equality"
//! used by reactive writes to decide whether anything changed.

mod array;
mod key;
mod object;

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub use array::Array;
pub use key::{Key, MAX_INDEX};
pub use object::{Getter, Object, PropertyFlags, Setter};

pub(crate) use object::{Property, Slot};

/// A dynamically-typed value that may participate in reactive state.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(Object),
    Array(Array),
    Opaque(Opaque),
}

impl Value {
    /// Strict equality: primitives by value, everything else by identity.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Keyed mappings and sequences; the only values that can be observed.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Take an untracked snapshot of this value as JSON.
    ///
    /// Reading through reactive properties here never links the active
    /// subscriber. Containers already on the current path are emitted as
    /// `null` so cyclic graphs terminate.
    pub fn to_json(&self) -> serde_json::Value {
        crate::reactive::ReactiveContext::untracked(|| self.to_json_inner(&mut HashSet::new()))
    }

    fn to_json_inner(&self, path: &mut HashSet<usize>) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null | Value::Opaque(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.to_string()),
            Value::Object(obj) => {
                if !path.insert(obj.addr()) {
                    return Json::Null;
                }
                let map = obj
                    .keys()
                    .into_iter()
                    .map(|key| {
                        let value = obj.get(&key).to_json_inner(path);
                        (key, value)
                    })
                    .collect();
                path.remove(&obj.addr());
                Json::Object(map)
            }
            Value::Array(arr) => {
                if !path.insert(arr.addr()) {
                    return Json::Null;
                }
                let items = arr.to_vec().iter().map(|v| v.to_json_inner(path)).collect();
                path.remove(&arr.addr());
                Json::Array(items)
            }
        }
    }

    fn fmt_display(&self, f: &mut fmt::Formatter<'_>, path: &mut Vec<usize>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Opaque(_) => f.write_str("[opaque]"),
            Value::Array(arr) => {
                if path.contains(&arr.addr()) {
                    return Ok(());
                }
                path.push(arr.addr());
                for (i, item) in arr.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    // Holes and nulls render as empty, like a joined list.
                    if !matches!(item, Value::Undefined | Value::Null) {
                        item.fmt_display(f, path)?;
                    }
                }
                path.pop();
                Ok(())
            }
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == 0.0 {
        f.write_str("0")
    } else {
        fmt_finite(n, f)
    }
}

/// Shortest round-trip digits, laid out positionally for decimal exponents
/// in `-6..21` and in `d.ddde±x` form outside it.
fn fmt_finite(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let sci = format!("{:e}", n.abs());
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return write!(f, "{n}");
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return write!(f, "{n}");
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit.
    let point = exp + 1;

    if n < 0.0 {
        f.write_str("-")?;
    }
    if k <= point && point <= 21 {
        f.write_str(&digits)?;
        f.write_str(&"0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        write!(f, "{int}.{frac}")
    } else if -6 < point && point <= 0 {
        write!(f, "0.{}{digits}", "0".repeat(-point as usize))
    } else {
        let (lead, rest) = digits.split_at(1);
        f.write_str(lead)?;
        if !rest.is_empty() {
            write!(f, ".{rest}")?;
        }
        let sign = if exp >= 0 { '+' } else { '-' };
        write!(f, "e{sign}{}", exp.abs())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_eq(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_display(f, &mut Vec::new())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(o) => fmt::Debug::fmt(o, f),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Opaque(o) => fmt::Debug::fmt(o, f),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_int!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Opaque> for Value {
    fn from(o: Opaque) -> Self {
        Value::Opaque(o)
    }
}

impl From<serde_json::Value> for Value {
    /// Build a fresh, unobserved graph from JSON.
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                let obj = Object::new();
                for (key, value) in map {
                    obj.set(&key, Value::from(value));
                }
                Value::Object(obj)
            }
        }
    }
}

/// A shared reference the reactive core never looks inside.
///
/// Useful for host handles (render nodes, component instances) that are
/// stored in reactive state but must not be observed.
#[derive(Clone)]
pub struct Opaque(Arc<dyn Any + Send + Sync>);

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Opaque(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_equality_of_primitives() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::from("a"), Value::from(String::from("a")));
        assert_ne!(Value::from(1), Value::from("1"));
        assert_ne!(Value::Undefined, Value::Null);
    }

    #[test]
    fn nan_is_not_strictly_equal_to_itself() {
        let nan = Value::from(f64::NAN);
        assert!(!nan.strict_eq(&nan));
        assert!(nan.is_nan());
    }

    #[test]
    fn composites_compare_by_identity() {
        let a = Object::new();
        let b = Object::new();
        assert_eq!(Value::from(a.clone()), Value::from(a));
        assert_ne!(Value::from(b), Value::from(Object::new()));

        let opaque = Opaque::new(5_u32);
        assert_eq!(Value::from(opaque.clone()), Value::from(opaque.clone()));
        assert_eq!(opaque.downcast_ref::<u32>(), Some(&5));
    }

    #[test]
    fn json_conversion_preserves_shape() {
        let source = json!({ "name": "lattice", "tags": ["a", "b"], "nested": { "n": 1.5 } });
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn cyclic_graphs_snapshot_as_null() {
        let obj = Object::new();
        obj.set("me", obj.clone());
        assert_eq!(Value::from(obj).to_json(), json!({ "me": null }));
    }

    #[test]
    fn display_follows_joined_rendering() {
        let arr = Array::from_vec(vec![1.into(), Value::Null, "x".into(), 2.5.into()]);
        assert_eq!(Value::from(arr).to_string(), "1,,x,2.5");
        assert_eq!(Value::from(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(Object::new()).to_string(), "[object Object]");
    }

    #[test]
    fn numbers_switch_to_exponent_form_at_the_edges() {
        let render = |n: f64| Value::from(n).to_string();
        assert_eq!(render(42.0), "42");
        assert_eq!(render(-123.456), "-123.456");
        assert_eq!(render(1e20), "100000000000000000000");
        assert_eq!(render(1e21), "1e+21");
        assert_eq!(render(-2.5e30), "-2.5e+30");
        assert_eq!(render(0.000001), "0.000001");
        assert_eq!(render(1e-7), "1e-7");
        assert_eq!(render(1.5e-7), "1.5e-7");
    }
}
