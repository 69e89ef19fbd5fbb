#![forbid(unsafe_code)]

//! Owning bag of handles for bulk enable/disable.
//!
//! A [`Container`] is the one place that *retains* connections or signals:
//! saving a handle keeps it alive until the container itself is dropped.
//! There is deliberately no removal; dropping the container releases
//! everything it saved.

use std::fmt;

use parking_lot::Mutex;

use crate::connection::{AnyConnection, Connection};
use crate::signal::{AnySignal, Signal};

/// Anything with an enable flag that a [`Container`] can toggle.
pub trait Switch {
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
}

impl<A: ?Sized + 'static> Switch for Connection<A> {
    fn set_enabled(&self, enabled: bool) {
        Connection::set_enabled(self, enabled);
    }

    fn is_enabled(&self) -> bool {
        Connection::is_enabled(self)
    }
}

impl<A: ?Sized + 'static> Switch for Signal<A> {
    fn set_enabled(&self, enabled: bool) {
        Signal::set_enabled(self, enabled);
    }

    fn is_enabled(&self) -> bool {
        Signal::is_enabled(self)
    }
}

impl Switch for AnyConnection {
    fn set_enabled(&self, enabled: bool) {
        AnyConnection::set_enabled(self, enabled);
    }

    fn is_enabled(&self) -> bool {
        AnyConnection::is_enabled(self)
    }
}

impl Switch for AnySignal {
    fn set_enabled(&self, enabled: bool) {
        AnySignal::set_enabled(self, enabled);
    }

    fn is_enabled(&self) -> bool {
        AnySignal::is_enabled(self)
    }
}

/// Thread-safe bag of owning handles.
///
/// The predicate passed to [`enable_if`](Container::enable_if) runs on a
/// snapshot of the saved handles, without the container lock held, so it may
/// freely call back into the container.
pub struct Container<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("items", &*self.items.lock())
            .finish()
    }
}

impl<T: Switch + Clone> Container<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain `item` for the lifetime of the container.
    pub fn save(&self, item: impl Into<T>) {
        self.items.lock().push(item.into());
    }

    /// Set the flag on every saved item.
    pub fn enable(&self, enabled: bool) {
        for item in self.snapshot() {
            item.set_enabled(enabled);
        }
    }

    /// Set the flag on items matching `predicate`. Returns how many matched.
    pub fn enable_if(&self, predicate: impl Fn(&T) -> bool, enabled: bool) -> usize {
        let mut matched = 0;
        for item in self.snapshot() {
            if predicate(&item) {
                item.set_enabled(enabled);
                matched += 1;
            }
        }
        matched
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn snapshot(&self) -> Vec<T> {
        self.items.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn enable_toggles_every_item() {
        let sig = Signal::<()>::new("bulk");
        let bag: Container<Connection<()>> = Container::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&count);
            bag.save(sig.connect(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(bag.len(), 3);

        sig.fire();
        assert_eq!(count.load(Ordering::SeqCst), 3);

        bag.enable(false);
        sig.fire();
        assert_eq!(count.load(Ordering::SeqCst), 3);

        bag.enable(true);
        sig.fire();
        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn saved_connections_stay_alive_until_container_drops() {
        let sig = Signal::<()>::new("keepalive");
        let bag: Container<Connection<()>> = Container::new();
        bag.save(sig.connect(|_| {}));
        assert_eq!(sig.connection_count(), 1);
        drop(bag);
        assert_eq!(sig.connection_count(), 0);
    }

    #[test]
    fn enable_if_filters_by_name() {
        let sig = Signal::<()>::new("filter");
        let bag: Container<AnyConnection> = Container::new();
        bag.save(sig.connect_named("ui.a", |_| {}));
        bag.save(sig.connect_named("ui.b", |_| {}));
        bag.save(sig.connect_named("net.a", |_| {}));

        let matched = bag.enable_if(|c| c.name().starts_with("ui."), false);
        assert_eq!(matched, 2);

        let disabled = bag.enable_if(|c| !c.is_enabled(), false);
        assert_eq!(disabled, 2);
    }

    #[test]
    fn mixed_shapes_in_one_container() {
        let ticks = Signal::<()>::new("tick");
        let sizes = Signal::<(u16, u16)>::new("resize");
        let bag: Container<AnySignal> = Container::new();
        bag.save(ticks.clone());
        bag.save(sizes.clone());

        bag.enable_if(|s| s.shape().is::<(u16, u16)>(), false);
        assert!(ticks.is_enabled());
        assert!(!sizes.is_enabled());
    }

    #[test]
    fn predicate_may_reenter_container() {
        let sig = Signal::<()>::new("reenter");
        let bag: Arc<Container<Connection<()>>> = Arc::new(Container::new());
        bag.save(sig.connect(|_| {}));
        let inner = Arc::clone(&bag);
        let matched = bag.enable_if(|_| inner.len() == 1, false);
        assert_eq!(matched, 1);
    }
}
