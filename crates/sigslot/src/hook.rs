#![forbid(unsafe_code)]

//! One-shot teardown hooks.
//!
//! Every weakly tracked object (connection or signal) carries a
//! [`DetachHook`]. Whoever tracks it installs a closure that removes the
//! object from its collection; the object fires the hook from its `Drop`.
//! When the tracker goes away first it clears the hook, so a late fire is a
//! no-op instead of a call into released state.
//!
//! The closure is taken out of the slot before it runs, so the slot lock is
//! never held while the tracker's own lock is acquired.

use parking_lot::Mutex;

type HookFn<I> = Box<dyn FnOnce(I) + Send>;

pub(crate) struct DetachHook<I> {
    slot: Mutex<Option<HookFn<I>>>,
}

impl<I> DetachHook<I> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Install `hook`, replacing any previous one without running it.
    pub(crate) fn install(&self, hook: impl FnOnce(I) + Send + 'static) {
        *self.slot.lock() = Some(Box::new(hook));
    }

    /// Drop the installed hook without running it.
    pub(crate) fn clear(&self) {
        let previous = self.slot.lock().take();
        drop(previous);
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Run the installed hook, at most once.
    pub(crate) fn fire(&self, id: I) {
        let hook = self.slot.lock().take();
        if let Some(hook) = hook {
            hook(id);
        }
    }
}
