#![forbid(unsafe_code)]

//! Thread-safe recorders that hand out slot callbacks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Ordered record of which slot ran, shared by every callback it produced.
pub struct CallLog<T> {
    entries: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for CallLog<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for CallLog<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CallLog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.lock().iter()).finish()
    }
}

impl<T: Clone + Send + 'static> CallLog<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that appends `tag` each time it runs, ignoring the arguments.
    pub fn slot<A: ?Sized + 'static>(
        &self,
        tag: T,
    ) -> impl Fn(&A) + Send + Sync + 'static + use<T, A>
    where
        T: Sync,
    {
        let entries = Arc::clone(&self.entries);
        move |_: &A| entries.lock().push(tag.clone())
    }

    pub fn push(&self, entry: T) {
        self.entries.lock().push(entry);
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.lock().clone()
    }

    /// Return and clear everything recorded so far.
    pub fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.entries.lock())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Shared invocation counter.
#[derive(Clone, Default)]
pub struct HitCounter {
    hits: Arc<AtomicUsize>,
}

impl fmt::Debug for HitCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HitCounter").field(&self.get()).finish()
    }
}

impl HitCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback that counts one hit per invocation.
    pub fn slot<A: ?Sized + 'static>(&self) -> impl Fn(&A) + Send + Sync + 'static + use<A> {
        let hits = Arc::clone(&self.hits);
        move |_: &A| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[must_use]
    pub fn get(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn reset(&self) -> usize {
        self.hits.swap(0, Ordering::SeqCst)
    }
}
