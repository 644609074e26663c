//! Reactive Property Accessor
//!
//! [`define_reactive`] replaces one property of an [`Object`] with a
//! tracked accessor:
//!
//! - **read**: links the active subscriber to the property's dep. If the
//!   value is itself observed, the subscriber is also linked to that value's
//!   container-level dep, and for arrays to every observed element inside.
//! - **write**: ignored if the new value is strictly equal to the old one
//!   (or both are NaN). Otherwise the value is stored, observed if it is a
//!   container, and the property's dep is notified.
//!
//! An accessor pair already present on the property is kept: reads delegate
//! to its getter and writes to its setter. A getter without a setter makes
//! the property read-only, and writes are silently dropped.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::array::depend_array;
use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{observe, ObserverHandle};
use crate::config;
use crate::value::{Getter, Object, Property, PropertyFlags, Setter, Slot, Value};

/// Diagnostic hook run before a reactive write is applied.
///
/// Only called outside production mode, and never for no-op writes.
pub type CustomSetter = Arc<dyn Fn(&Value) + Send + Sync>;

/// Options for [`define_reactive`].
#[derive(Clone, Default)]
pub struct DefineOptions {
    pub custom_setter: Option<CustomSetter>,
    /// Do not observe the stored value.
    pub shallow: bool,
}

impl fmt::Debug for DefineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefineOptions")
            .field("custom_setter", &self.custom_setter.is_some())
            .field("shallow", &self.shallow)
            .finish()
    }
}

/// Install a reactive accessor for `key` on `obj`.
///
/// With `value` omitted, the property's current value is kept (read through
/// any existing accessor). Non-configurable properties cannot be redefined
/// and are left untouched, as are new keys on non-extensible objects.
pub fn define_reactive(obj: &Object, key: &str, value: Option<Value>, options: DefineOptions) {
    let existing = obj.property(key);
    match &existing {
        Some(property) if !property.flags.configurable => return,
        None if !obj.is_extensible() => return,
        _ => {}
    }

    let (getter, setter) = match existing.as_ref().map(|p| &p.slot) {
        Some(Slot::Accessor { get, set }) => (get.clone(), set.clone()),
        Some(Slot::Reactive(previous)) => previous.accessor_pair(),
        Some(Slot::Data(_)) | None => (None, None),
    };

    let value = match value {
        Some(value) => value,
        None if getter.is_none() || setter.is_some() => existing
            .as_ref()
            .map(|p| ReactiveContext::untracked(|| p.read()))
            .unwrap_or_default(),
        None => Value::Undefined,
    };

    let enumerable = existing.as_ref().map_or(true, |p| p.flags.enumerable);
    let child = if options.shallow {
        None
    } else {
        observe(&value, false)
    };

    let property = ReactiveProperty {
        dep: Arc::new(Dep::new()),
        getter,
        setter,
        value: Mutex::new(value),
        child: Mutex::new(child),
        shallow: options.shallow,
        custom_setter: options.custom_setter,
    };

    obj.install(
        key,
        Property {
            slot: Slot::Reactive(Arc::new(property)),
            flags: PropertyFlags {
                enumerable,
                ..PropertyFlags::default()
            },
        },
    );
}

/// The getter/setter pair backing one reactive property.
pub struct ReactiveProperty {
    dep: Arc<Dep>,
    getter: Option<Getter>,
    setter: Option<Setter>,
    /// Storage when there is no getter to delegate to.
    value: Mutex<Value>,
    /// Observer of the current value, if it is an observed container.
    child: Mutex<Option<ObserverHandle>>,
    shallow: bool,
    custom_setter: Option<CustomSetter>,
}

impl ReactiveProperty {
    pub fn dep(&self) -> &Arc<Dep> {
        &self.dep
    }

    fn current(&self) -> Value {
        match &self.getter {
            Some(get) => get(),
            None => self.value.lock().clone(),
        }
    }

    pub fn get(&self) -> Value {
        let value = self.current();
        if ReactiveContext::is_active() {
            self.dep.depend();
            let child = self.child.lock().clone();
            if let Some(child) = child {
                child.dep().depend();
                if let Value::Array(arr) = &value {
                    depend_array(arr);
                }
            }
        }
        value
    }

    pub fn set(&self, new_value: Value) {
        let old = self.current();
        if new_value.strict_eq(&old) || (new_value.is_nan() && old.is_nan()) {
            return;
        }
        if let Some(hook) = &self.custom_setter {
            if !config::current().production {
                hook(&new_value);
            }
        }
        match (&self.getter, &self.setter) {
            (Some(_), None) => return,
            (_, Some(set)) => set(new_value.clone()),
            (None, None) => *self.value.lock() = new_value.clone(),
        }
        *self.child.lock() = if self.shallow {
            None
        } else {
            observe(&new_value, false)
        };
        self.dep.notify();
    }

    /// This property as a plain accessor pair, for redefinition on top of it.
    fn accessor_pair(self: &Arc<Self>) -> (Option<Getter>, Option<Setter>) {
        let reader = Arc::clone(self);
        let writer = Arc::clone(self);
        (
            Some(Arc::new(move || reader.get())),
            Some(Arc::new(move |value| writer.set(value))),
        )
    }
}
