//! Sequence Interception
//!
//! Writes to a sequence by index or length cannot be intercepted the way a
//! keyed property can. Observation therefore works at two levels:
//!
//! - The seven mutating methods report themselves to the array's
//!   [`ArrayInterceptor`] (the observer), which observes newly inserted
//!   elements and notifies the array's container-level dep.
//! - Reading a property that holds an array links the reader to every
//!   observed element as well ([`depend_array`]), so mutations through those
//!   elements reach subscribers that only ever touched the outer property.

use super::observer::ObserverHandle;
use crate::value::{Array, Value};

/// The seven intercepted sequence methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
}

impl ArrayMethod {
    pub const ALL: [ArrayMethod; 7] = [
        ArrayMethod::Push,
        ArrayMethod::Pop,
        ArrayMethod::Shift,
        ArrayMethod::Unshift,
        ArrayMethod::Splice,
        ArrayMethod::Sort,
        ArrayMethod::Reverse,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArrayMethod::Push => "push",
            ArrayMethod::Pop => "pop",
            ArrayMethod::Shift => "shift",
            ArrayMethod::Unshift => "unshift",
            ArrayMethod::Splice => "splice",
            ArrayMethod::Sort => "sort",
            ArrayMethod::Reverse => "reverse",
        }
    }

    /// Whether calls to this method can insert elements.
    pub fn inserts(self) -> bool {
        matches!(
            self,
            ArrayMethod::Push | ArrayMethod::Unshift | ArrayMethod::Splice
        )
    }
}

/// Receives every intercepted method call after the mutation is applied.
pub trait ArrayInterceptor: Send + Sync {
    /// `inserted` holds the elements the call added, in order.
    fn intercept(&self, method: ArrayMethod, inserted: &[Value]);
}

/// Link the active subscriber to every observed element of `arr`,
/// recursing into nested arrays.
pub(crate) fn depend_array(arr: &Array) {
    for item in arr.to_vec() {
        let observer: Option<ObserverHandle> = match &item {
            Value::Object(obj) => obj.observer(),
            Value::Array(inner) => inner.observer(),
            _ => None,
        };
        if let Some(observer) = observer {
            observer.dep().depend();
        }
        if let Value::Array(inner) = &item {
            depend_array(inner);
        }
    }
}
