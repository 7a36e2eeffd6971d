use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Live subscription handle. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Explicit unsubscribe; same as dropping.
    pub fn cancel(mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

pub(crate) type Listener<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Registered callbacks for one feed.
pub(crate) struct Listeners<T> {
    inner: Arc<Mutex<ListenerSet<T>>>,
}

struct ListenerSet<T> {
    next_id: u64,
    map: BTreeMap<u64, Listener<T>>,
}

impl<T: Clone + Send + 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerSet {
                next_id: 0,
                map: BTreeMap::new(),
            })),
        }
    }

    pub(crate) fn add(&self, callback: Listener<T>) -> Subscription {
        let id = {
            let mut set = lock(&self.inner);
            let id = set.next_id;
            set.next_id += 1;
            set.map.insert(id, callback);
            id
        };
        let weak: Weak<Mutex<ListenerSet<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).map.remove(&id);
            }
        })
    }

    /// Deliver `value` to every listener. The lock is released before any
    /// callback runs.
    pub(crate) fn emit(&self, value: &T) {
        let targets: Vec<Listener<T>> = lock(&self.inner).map.values().cloned().collect();
        for cb in targets {
            cb(value.clone());
        }
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.inner).map.len()
    }
}

/// Poison-tolerant lock: a panicking callback must not wedge the store.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
