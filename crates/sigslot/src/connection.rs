#![forbid(unsafe_code)]

//! Connections: bound callbacks owned by whoever holds the handle.
//!
//! # Design
//!
//! A [`Connection<A>`] is a cheap handle around `Arc<ConnectionCore<A>>`.
//! Signals and the hub only ever keep a `Weak` to the core. When the last
//! handle is dropped the core fires its detach hook (see `hook.rs`) before
//! its storage is reclaimed, which removes the entry from whichever list
//! tracks it.
//!
//! # Failure Modes
//!
//! - **Signal dropped first**: the signal clears the hook during its own
//!   teardown. The connection stays valid to hold, toggle, and invoke, but
//!   `is_attached()` reports `false` and dropping it touches nothing.
//! - **Concurrent drop during emission**: the emitting thread may hold a
//!   temporary strong reference, in which case the teardown (and hook) runs
//!   on that thread once the callback returns.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::hook::DetachHook;
use crate::shape::Shape;

/// Process-unique identity of a connection. Names are labels only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

type SlotFn<A> = dyn Fn(&A) + Send + Sync;

pub(crate) struct ConnectionCore<A: ?Sized> {
    id: ConnectionId,
    enabled: AtomicBool,
    name: String,
    signal_name: String,
    slot: Box<SlotFn<A>>,
    pub(crate) detach: DetachHook<ConnectionId>,
}

impl<A: ?Sized + 'static> ConnectionCore<A> {
    pub(crate) fn new(
        signal_name: impl Into<String>,
        name: impl Into<String>,
        slot: impl Fn(&A) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            enabled: AtomicBool::new(true),
            name: name.into(),
            signal_name: signal_name.into(),
            slot: Box::new(slot),
            detach: DetachHook::new(),
        })
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, args: &A) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        (self.slot)(args);
    }
}

impl<A: ?Sized> Drop for ConnectionCore<A> {
    fn drop(&mut self) {
        self.detach.fire(self.id);
    }
}

/// Shape-erased view of a connection core, used by the hub's pending lists
/// and by [`AnyConnection`].
pub(crate) trait ErasedConnection: Any + Send + Sync {
    fn id(&self) -> ConnectionId;
    fn name(&self) -> &str;
    fn signal_name(&self) -> &str;
    fn shape(&self) -> Shape;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn hook(&self) -> &DetachHook<ConnectionId>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<A: ?Sized + 'static> ErasedConnection for ConnectionCore<A> {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn signal_name(&self) -> &str {
        &self.signal_name
    }

    fn shape(&self) -> Shape {
        Shape::of::<A>()
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn hook(&self) -> &DetachHook<ConnectionId> {
        &self.detach
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Checked downcast from an erased core to a concrete shape.
pub(crate) fn downcast_core<A: ?Sized + 'static>(
    erased: Arc<dyn ErasedConnection>,
) -> Option<Arc<ConnectionCore<A>>> {
    erased.into_any().downcast::<ConnectionCore<A>>().ok()
}

/// Owning handle to one bound callback.
///
/// Keep the handle alive for as long as the callback should stay connected.
/// Cloning shares the same connection; the callback is detached once every
/// clone has been dropped.
pub struct Connection<A: ?Sized + 'static = ()> {
    core: Arc<ConnectionCore<A>>,
}

impl<A: ?Sized + 'static> Clone for Connection<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Connection<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("signal", &self.core.signal_name)
            .field("enabled", &self.is_enabled())
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl<A: ?Sized + 'static> Connection<A> {
    pub(crate) fn from_core(core: Arc<ConnectionCore<A>>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<ConnectionCore<A>> {
        &self.core
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.core.id
    }

    /// Debug label given at connect time (may be empty).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Name of the signal this connection targets.
    #[must_use]
    pub fn signal_name(&self) -> &str {
        &self.core.signal_name
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        Shape::of::<A>()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.core.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.core.enabled.store(enabled, Ordering::Release);
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Call the callback directly, honouring the enable flag.
    pub fn invoke(&self, args: &A) {
        self.core.invoke(args);
    }

    /// Whether a signal or hub still tracks this connection.
    ///
    /// Turns `false` when the owning signal (or the hub holding it as an
    /// early connection) is torn down, or after an explicit disconnect.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.core.detach.is_armed()
    }

    /// Whether both handles refer to the same connection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Convert into a shape-erased handle. The connection stays alive.
    #[must_use]
    pub fn erase(self) -> AnyConnection {
        AnyConnection { core: self.core }
    }
}

impl<A: ?Sized + 'static> From<Connection<A>> for AnyConnection {
    fn from(conn: Connection<A>) -> Self {
        conn.erase()
    }
}

/// Shape-erased owning handle to a connection.
///
/// Useful for keeping connections of different argument types in one
/// [`Container`](crate::Container).
#[derive(Clone)]
pub struct AnyConnection {
    core: Arc<dyn ErasedConnection>,
}

impl fmt::Debug for AnyConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyConnection")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .field("signal", &self.core.signal_name())
            .field("shape", &self.core.shape())
            .field("enabled", &self.core.is_enabled())
            .finish()
    }
}

impl AnyConnection {
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.core.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
    }

    #[must_use]
    pub fn signal_name(&self) -> &str {
        self.core.signal_name()
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        self.core.shape()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.core.is_enabled()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled);
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.core.hook().is_armed()
    }

    /// Recover the typed handle if the shape matches.
    #[must_use]
    pub fn downcast<A: ?Sized + 'static>(&self) -> Option<Connection<A>> {
        downcast_core::<A>(Arc::clone(&self.core)).map(Connection::from_core)
    }
}
