//! Observable record with per-field and any-change subscribers

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::observer::{Observers, Subscription};

/// A record whose fields can be read and written by name
pub trait Model: Clone + Send + Sync + 'static {
    type Field: Copy + Eq + Hash + Debug + Send + Sync + 'static;
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    fn get(&self, field: Self::Field) -> Self::Value;

    /// Write `value` into `field`. Returns false when the value variant does
    /// not belong to that field; the record is left untouched in that case.
    fn set(&mut self, field: Self::Field, value: Self::Value) -> bool;
}

/// One field change, handed to field subscribers
#[derive(Debug)]
pub struct Change<'a, M: Model> {
    pub field: M::Field,
    pub old: M::Value,
    pub new: M::Value,
    pub model: &'a M,
}

pub type FieldHandler<M> = dyn Fn(&Change<'_, M>) + Send + Sync;
pub type AnyHandler<M> = dyn Fn(&M) + Send + Sync;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("value {value} does not fit field {field}")]
    ValueMismatch { field: String, value: String },
}

/// Reactive state container
///
/// `set_field` updates the record, then notifies the field's subscribers
/// followed by the any-change subscribers, all synchronously and with no
/// lock held.
pub struct Reactive<M: Model> {
    model: RwLock<M>,
    by_field: Mutex<HashMap<M::Field, Observers<FieldHandler<M>>>>,
    any: Observers<AnyHandler<M>>,
}

impl<M: Model> Reactive<M> {
    pub fn new(model: M) -> Self {
        Self {
            model: RwLock::new(model),
            by_field: Mutex::new(HashMap::new()),
            any: Observers::new(),
        }
    }

    pub fn get_field(&self, field: M::Field) -> M::Value {
        self.model.read().get(field)
    }

    /// Snapshot of the whole record
    pub fn get_all(&self) -> M {
        self.model.read().clone()
    }

    /// Read through the record without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&M) -> R) -> R {
        f(&self.model.read())
    }

    pub fn set_field(&self, field: M::Field, value: M::Value) -> Result<(), StateError> {
        let (old, snapshot) = {
            let mut model = self.model.write();
            let old = model.get(field);
            if !model.set(field, value.clone()) {
                return Err(StateError::ValueMismatch {
                    field: format!("{field:?}"),
                    value: format!("{value:?}"),
                });
            }
            (old, model.clone())
        };

        let field_handlers = self
            .by_field
            .lock()
            .get(&field)
            .map(Observers::snapshot)
            .unwrap_or_default();

        let change = Change {
            field,
            old,
            new: value,
            model: &snapshot,
        };
        for handler in field_handlers {
            handler(&change);
        }
        for handler in self.any.snapshot() {
            handler(&snapshot);
        }
        Ok(())
    }

    pub fn on_field_change(
        &self,
        field: M::Field,
        handler: Arc<FieldHandler<M>>,
    ) -> Subscription {
        self.by_field
            .lock()
            .entry(field)
            .or_default()
            .subscribe(handler)
    }

    pub fn on_change(&self, handler: Arc<AnyHandler<M>>) -> Subscription {
        self.any.subscribe(handler)
    }
}

impl<M: Model + Debug> Debug for Reactive<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactive")
            .field("model", &*self.model.read())
            .finish_non_exhaustive()
    }
}
