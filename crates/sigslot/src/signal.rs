#![forbid(unsafe_code)]

//! Signals: ordered fan-out points with weak connection lists.
//!
//! # Design
//!
//! [`Signal<A>`] wraps `Arc<SignalCore<A>>`. The core keeps its dispatch
//! list behind a `parking_lot::ReentrantMutex<RefCell<..>>` so a callback
//! running inside [`emit`](Signal::emit) can connect, disconnect, drop its
//! own handle, or emit again on the same signal from the same thread. The
//! `RefCell` is only ever borrowed for short list edits; no borrow is held
//! while a callback runs or while an upgraded strong reference is dropped.
//!
//! # Invariants
//!
//! 1. Dispatch order is connection order at the start of the emission.
//! 2. Connections added during an emission are first invoked by the next one.
//! 3. A released connection is never invoked; its entry is removed by its
//!    detach hook, or at the latest by the next emission.
//! 4. A connection removed by `disconnect` or `disconnect_all` from inside a
//!    callback is skipped for the rest of that emission.
//! 5. Before a signal's storage is released, every connection still bound to
//!    it has its detach hook cleared.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Callback panics | Panic reaches the `emit` caller; stale entries are still pruned while unwinding |
//! | Duplicate slot name (check enabled) | `connect_named` panics |
//! | Signal dropped while connections are held | Connections become inert, `is_attached()` is `false` |

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::connection::{Connection, ConnectionCore, ConnectionId};
use crate::hook::DetachHook;
use crate::shape::Shape;

/// Process-unique identity of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalId(u64);

impl SignalId {
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

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "signal#{}", self.0)
    }
}

/// Per-signal options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalConfig {
    /// Panic when a non-empty slot name is connected while another alive
    /// connection on the same signal already uses it.
    pub check_duplicate_slot_names: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            check_duplicate_slot_names: cfg!(debug_assertions),
        }
    }
}

impl SignalConfig {
    /// Set whether duplicate slot names are checked.
    #[must_use]
    pub fn with_duplicate_slot_check(mut self, enabled: bool) -> Self {
        self.check_duplicate_slot_names = enabled;
        self
    }
}

struct Entry<A: ?Sized> {
    id: ConnectionId,
    conn: Weak<ConnectionCore<A>>,
}

type EntryList<A> = ReentrantMutex<RefCell<Vec<Entry<A>>>>;

pub(crate) struct SignalCore<A: ?Sized> {
    id: SignalId,
    name: String,
    enabled: AtomicBool,
    config: SignalConfig,
    entries: EntryList<A>,
    pub(crate) on_final: DetachHook<SignalId>,
}

impl<A: ?Sized + 'static> SignalCore<A> {
    fn new(name: String, config: SignalConfig) -> Arc<Self> {
        Arc::new(Self {
            id: SignalId::next(),
            name,
            enabled: AtomicBool::new(true),
            config,
            entries: ReentrantMutex::new(RefCell::new(Vec::new())),
            on_final: DetachHook::new(),
        })
    }

    pub(crate) fn id(&self) -> SignalId {
        self.id
    }

    /// Append `conn` to the dispatch list and make its teardown remove it.
    ///
    /// Replaces whatever hook the connection had before, which is how an
    /// early connection moves from the hub's pending list onto the signal.
    pub(crate) fn attach(this: &Arc<Self>, conn: &Arc<ConnectionCore<A>>) {
        let guard = this.entries.lock();
        if this.config.check_duplicate_slot_names && !conn.name().is_empty() {
            Self::assert_unique_name(this, &guard, conn);
        }
        guard.borrow_mut().push(Entry {
            id: conn.id(),
            conn: Arc::downgrade(conn),
        });

        let weak = Arc::downgrade(this);
        conn.detach.install(move |id| {
            if let Some(signal) = weak.upgrade() {
                signal.remove(id);
            }
        });
        trace!(signal = %this.name, conn = %conn.id(), slot = conn.name(), "connected");
    }

    fn assert_unique_name(
        this: &Self,
        entries: &RefCell<Vec<Entry<A>>>,
        conn: &ConnectionCore<A>,
    ) {
        let peers: Vec<Weak<ConnectionCore<A>>> =
            entries.borrow().iter().map(|e| e.conn.clone()).collect();
        let clash = peers
            .iter()
            .filter_map(Weak::upgrade)
            .any(|peer| peer.name() == conn.name());
        assert!(
            !clash,
            "slot name '{}' is already connected to signal '{}'",
            conn.name(),
            this.name
        );
    }

    fn remove(&self, id: ConnectionId) {
        let guard = self.entries.lock();
        let mut entries = guard.borrow_mut();
        if let Some(pos) = entries.iter().position(|e| e.id == id) {
            entries.remove(pos);
            trace!(signal = %self.name, conn = %id, "detached");
        }
    }

    pub(crate) fn emit(&self, args: &A) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let guard = self.entries.lock();
        let snapshot: Vec<Weak<ConnectionCore<A>>> =
            guard.borrow().iter().map(|e| e.conn.clone()).collect();
        trace!(signal = %self.name, slots = snapshot.len(), "emit");

        let _prune = PruneOnExit {
            signal: &self.name,
            entries: &guard,
        };
        for weak in &snapshot {
            let Some(conn) = weak.upgrade() else {
                continue;
            };
            // Disarmed: disconnected by an earlier callback of this pass.
            if conn.detach.is_armed() {
                conn.invoke(args);
            }
        }
    }

    fn live_count(&self) -> usize {
        let guard = self.entries.lock();
        let entries = guard.borrow();
        entries.iter().filter(|e| e.conn.strong_count() > 0).count()
    }
}

/// Removes stale entries when an emission pass ends, including by unwinding.
struct PruneOnExit<'a, A: ?Sized> {
    signal: &'a str,
    entries: &'a RefCell<Vec<Entry<A>>>,
}

impl<A: ?Sized> Drop for PruneOnExit<'_, A> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!(signal = self.signal, "callback panicked during emit");
        }
        if let Ok(mut entries) = self.entries.try_borrow_mut() {
            entries.retain(|e| e.conn.strong_count() > 0);
        }
    }
}

impl<A: ?Sized> Drop for SignalCore<A> {
    fn drop(&mut self) {
        let entries = std::mem::take(self.entries.get_mut().get_mut());
        let live: Vec<Arc<ConnectionCore<A>>> =
            entries.iter().filter_map(|e| e.conn.upgrade()).collect();
        for conn in &live {
            conn.detach.clear();
        }
        debug!(signal = %self.name, released = live.len(), "signal final");
        drop(live);
        self.on_final.fire(self.id);
    }
}

/// Shape-erased view of a signal core, used by the hub map and [`AnySignal`].
pub(crate) trait ErasedSignal: Any + Send + Sync {
    fn id(&self) -> SignalId;
    fn name(&self) -> &str;
    fn shape(&self) -> Shape;
    fn set_enabled(&self, enabled: bool);
    fn is_enabled(&self) -> bool;
    fn connection_count(&self) -> usize;
    fn hook(&self) -> &DetachHook<SignalId>;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<A: ?Sized + 'static> ErasedSignal for SignalCore<A> {
    fn id(&self) -> SignalId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
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

    fn connection_count(&self) -> usize {
        self.live_count()
    }

    fn hook(&self) -> &DetachHook<SignalId> {
        &self.on_final
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) fn downcast_signal<A: ?Sized + 'static>(
    erased: Arc<dyn ErasedSignal>,
) -> Option<Arc<SignalCore<A>>> {
    erased.into_any().downcast::<SignalCore<A>>().ok()
}

/// A named fan-out point invoking connected callbacks in connection order.
///
/// Keep the handle alive for as long as the signal should exist. Cloning
/// shares the same signal; it becomes final once every clone is dropped.
pub struct Signal<A: ?Sized + 'static = ()> {
    core: Arc<SignalCore<A>>,
}

impl<A: ?Sized + 'static> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<A: ?Sized + 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("shape", &self.shape())
            .field("enabled", &self.is_enabled())
            .field("connections", &self.connection_count())
            .finish()
    }
}

impl<A: ?Sized + 'static> Signal<A> {
    /// Create a standalone signal with default options.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, SignalConfig::default())
    }

    #[must_use]
    pub fn with_config(name: impl Into<String>, config: SignalConfig) -> Self {
        Self {
            core: SignalCore::new(name.into(), config),
        }
    }

    pub(crate) fn from_core(core: Arc<SignalCore<A>>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<SignalCore<A>> {
        &self.core
    }

    #[must_use]
    pub fn id(&self) -> SignalId {
        self.core.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        Shape::of::<A>()
    }

    #[must_use]
    pub fn config(&self) -> &SignalConfig {
        &self.core.config
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.core.enabled.load(Ordering::Acquire)
    }

    /// Enable or silence the whole signal. Per-connection flags are kept.
    pub fn set_enabled(&self, enabled: bool) {
        self.core.enabled.store(enabled, Ordering::Release);
    }

    pub fn enable(&self) {
        self.set_enabled(true);
    }

    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Connect an unnamed callback. Keep the returned handle to stay connected.
    #[must_use = "dropping the connection disconnects the callback"]
    pub fn connect(&self, slot: impl Fn(&A) + Send + Sync + 'static) -> Connection<A> {
        self.connect_named("", slot)
    }

    /// Connect a callback with a debug label.
    ///
    /// # Panics
    ///
    /// Panics when duplicate slot names are checked (see [`SignalConfig`])
    /// and an alive connection on this signal already uses `slot_name`.
    #[must_use = "dropping the connection disconnects the callback"]
    pub fn connect_named(
        &self,
        slot_name: impl Into<String>,
        slot: impl Fn(&A) + Send + Sync + 'static,
    ) -> Connection<A> {
        let core = ConnectionCore::new(self.core.name.clone(), slot_name, slot);
        SignalCore::attach(&self.core, &core);
        Connection::from_core(core)
    }

    /// Invoke every live, enabled connection in connection order.
    ///
    /// # Panics
    ///
    /// A panic raised by a callback propagates to the caller. Connections
    /// after the panicking one are not invoked for this emission.
    pub fn emit(&self, args: &A) {
        self.core.emit(args);
    }

    /// Remove `conn` from this signal without dropping it.
    ///
    /// Returns `false` if it was not bound here. Afterwards the connection is
    /// inert with respect to this signal and `is_attached()` is `false`.
    pub fn disconnect(&self, conn: &Connection<A>) -> bool {
        let guard = self.core.entries.lock();
        let removed = {
            let mut entries = guard.borrow_mut();
            match entries.iter().position(|e| e.id == conn.id()) {
                Some(pos) => {
                    entries.remove(pos);
                    true
                }
                None => false,
            }
        };
        if removed {
            conn.core().detach.clear();
            trace!(signal = %self.core.name, conn = %conn.id(), "disconnected");
        }
        removed
    }

    /// Remove every connection. Handles held elsewhere stay valid but inert.
    pub fn disconnect_all(&self) {
        let guard = self.core.entries.lock();
        let drained = std::mem::take(&mut *guard.borrow_mut());
        let live: Vec<Arc<ConnectionCore<A>>> =
            drained.iter().filter_map(|e| e.conn.upgrade()).collect();
        for conn in &live {
            conn.detach.clear();
        }
        debug!(signal = %self.core.name, released = live.len(), "disconnected all");
    }

    /// Number of connections whose handle is still held.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.core.live_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connection_count() == 0
    }

    /// Whether both handles refer to the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Convert into a shape-erased handle. The signal stays alive.
    #[must_use]
    pub fn erase(self) -> AnySignal {
        AnySignal { core: self.core }
    }
}

impl Signal<()> {
    /// Emit on an argument-less signal.
    pub fn fire(&self) {
        self.emit(&());
    }
}

impl<A: ?Sized + 'static> From<Signal<A>> for AnySignal {
    fn from(signal: Signal<A>) -> Self {
        signal.erase()
    }
}

/// Shape-erased owning handle to a signal.
#[derive(Clone)]
pub struct AnySignal {
    core: Arc<dyn ErasedSignal>,
}

impl fmt::Debug for AnySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnySignal")
            .field("id", &self.core.id())
            .field("name", &self.core.name())
            .field("shape", &self.core.shape())
            .field("enabled", &self.core.is_enabled())
            .finish()
    }
}

impl AnySignal {
    #[must_use]
    pub fn id(&self) -> SignalId {
        self.core.id()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.core.name()
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
    pub fn connection_count(&self) -> usize {
        self.core.connection_count()
    }

    /// Recover the typed handle if the shape matches.
    #[must_use]
    pub fn downcast<A: ?Sized + 'static>(&self) -> Option<Signal<A>> {
        downcast_signal::<A>(Arc::clone(&self.core)).map(Signal::from_core)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
