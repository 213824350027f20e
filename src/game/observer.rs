//! Observer registry shared by the grid, reactive state and the event bus

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Slots<T> = Mutex<Vec<Arc<T>>>;

/// Ordered list of handlers, registered at most once per handler identity
pub struct Observers<T: ?Sized> {
    slots: Arc<Slots<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Observers<T> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a handler. Registering the same `Arc` twice is a no-op, but
    /// both calls hand back a working [`Subscription`].
    pub fn subscribe(&self, handler: Arc<T>) -> Subscription {
        {
            let mut slots = self.slots.lock();
            if !slots.iter().any(|h| same_handler(h, &handler)) {
                slots.push(handler.clone());
            }
        }

        let slots: Weak<Slots<T>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                let mut slots = slots.lock();
                if let Some(pos) = slots.iter().position(|h| same_handler(h, &handler)) {
                    slots.remove(pos);
                }
            }
        })
    }

    /// Copy of the current handlers, taken so callers can invoke them
    /// without holding the registry lock
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.slots.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for Observers<T> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
        }
    }
}

fn same_handler<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Capability to remove one registered handler
///
/// Dropping it without calling [`Subscription::unsubscribe`] keeps the
/// handler registered.
pub struct Subscription {
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Box::new(cancel),
        }
    }

    pub fn unsubscribe(self) {
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
