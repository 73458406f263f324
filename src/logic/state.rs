use parking_lot::RwLock;
use std::sync::Arc;

/// Read/replace access to whatever holds a view's collection.
///
/// The coordinator only needs two things from the UI layer: a copy of the
/// current value, and a setter.
pub trait StateCell<T>: Send + Sync {
    fn snapshot(&self) -> T;
    fn apply(&self, next: T);
}

/// Shared, clonable state cell backed by a lock. Clones see the same value.
#[derive(Debug, Default)]
pub struct SharedState<T> {
    inner: Arc<RwLock<T>>,
}

impl<T> Clone for SharedState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedState<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.read())
    }
}

impl<T: Clone + Send + Sync> StateCell<T> for SharedState<T> {
    fn snapshot(&self) -> T {
        self.inner.read().clone()
    }

    fn apply(&self, next: T) {
        *self.inner.write() = next;
    }
}
