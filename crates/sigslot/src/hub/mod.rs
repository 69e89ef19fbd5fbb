#![forbid(unsafe_code)]

//! Name-indexed signal registry with deferred binding.
//!
//! # Design
//!
//! [`SignalHub`] decouples "who defines a signal" from "who connects to it".
//! Either side may come first:
//!
//! - `connect` against a live signal delegates to [`Signal::connect_named`];
//! - `connect` against an unknown (or dead) name parks the connection in a
//!   pending list for that name;
//! - `add_signal` migrates every still-alive parked connection onto the new
//!   signal, in request order, keeping each one's enable flag.
//!
//! The binding table sits behind a `parking_lot::ReentrantMutex`. The lock is
//! released before the hub emits on (or connects to) a live signal, so
//! callbacks may call back into the hub. The only signal lock taken under
//! the hub lock is that of a signal `add_signal` has just created.
//!
//! # Invariants
//!
//! 1. A name is either bound to one signal or has one pending list, never both.
//! 2. A signal's on-final hook removes its binding only while the binding
//!    still refers to that exact signal id.
//! 3. Migration of pending connections is atomic with respect to concurrent
//!    `connect` calls for the same name.
//! 4. On hub teardown every hook the hub installed is cleared first.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | No live signal | `emit` before `add_signal` or after the signal died | `Ok(())`, nothing happens |
//! | Shape mismatch | Caller's `A` differs from the bound or parked shape | [`SigslotError::ShapeMismatch`] |
//! | Duplicate live name | Second `add_signal` while the first lives | [`DuplicateSignalPolicy`] |

mod binding;
pub mod config;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::connection::{Connection, ConnectionCore, ConnectionId, ErasedConnection, downcast_core};
use crate::error::{Result, SigslotError};
use crate::shape::Shape;
use crate::signal::{ErasedSignal, Signal, SignalCore, SignalId, downcast_signal};

use binding::{Binding, BindingTable, BoundSignal, PendingConnections};
pub use config::{DuplicateSignalPolicy, HubConfig};

struct HubShared {
    config: HubConfig,
    table: ReentrantMutex<RefCell<BindingTable>>,
}

impl HubShared {
    /// Strong reference to the live signal bound to `name`, if any.
    ///
    /// The strong reference escapes the table borrow, so dropping it later
    /// cannot re-enter a borrowed table.
    fn live_signal(&self, name: &str) -> Option<Arc<dyn ErasedSignal>> {
        let guard = self.table.lock();
        let table = guard.borrow();
        match table.get(name) {
            Some(Binding::Bound(bound)) => bound.signal.upgrade(),
            _ => None,
        }
    }

    fn forget_signal(&self, name: &str, id: SignalId) {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        if matches!(table.get(name), Some(Binding::Bound(bound)) if bound.id == id) {
            table.remove(name);
            debug!(hub = %self.config.label, signal = name, "signal unregistered");
        }
    }

    fn forget_parked(&self, name: &str, id: ConnectionId) {
        let guard = self.table.lock();
        let mut table = guard.borrow_mut();
        if let Some(Binding::Pending(pending)) = table.get_mut(name) {
            if pending.unpark(id) {
                table.remove(name);
            }
            trace!(hub = %self.config.label, signal = name, conn = %id, "early connection released");
        }
    }
}

impl Drop for HubShared {
    fn drop(&mut self) {
        let table = std::mem::take(self.table.get_mut().get_mut());
        let mut signals: Vec<Arc<dyn ErasedSignal>> = Vec::new();
        let mut parked: Vec<Arc<dyn ErasedConnection>> = Vec::new();
        for binding in table.into_values() {
            match binding {
                Binding::Bound(bound) => signals.extend(bound.signal.upgrade()),
                Binding::Pending(pending) => {
                    parked.extend(pending.parked.iter().filter_map(|p| p.conn.upgrade()));
                }
            }
        }
        for signal in &signals {
            signal.hook().clear();
        }
        for conn in &parked {
            conn.hook().clear();
        }
        debug!(
            hub = %self.config.label,
            signals = signals.len(),
            parked = parked.len(),
            "hub teardown"
        );
    }
}

fn assert_distinct_slot_names<A: ?Sized + 'static>(signal: &str, conns: &[Arc<ConnectionCore<A>>]) {
    let mut seen = HashSet::new();
    for conn in conns {
        let slot = conn.name();
        assert!(
            slot.is_empty() || seen.insert(slot),
            "slot name '{slot}' is already connected to signal '{signal}'"
        );
    }
}

/// Registry mapping signal names to signals, tolerant of connect-before-create.
///
/// Cloning shares the same registry. The hub never keeps signals or
/// connections alive; callers hold the handles it returns.
#[derive(Clone)]
pub struct SignalHub {
    shared: Arc<HubShared>,
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub")
            .field("label", &self.shared.config.label)
            .field("signals", &self.signal_names())
            .finish_non_exhaustive()
    }
}

impl SignalHub {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            shared: Arc::new(HubShared {
                config,
                table: ReentrantMutex::new(RefCell::new(BindingTable::new())),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.shared.config.label
    }

    /// Create a signal registered under `name`.
    ///
    /// Connections parked for `name` are moved onto it in request order.
    /// Keep the returned handle: the signal (and its registration) lives
    /// exactly as long as some clone of it does.
    ///
    /// # Errors
    ///
    /// - [`SigslotError::ShapeMismatch`] if connections parked for `name`
    ///   expect a different argument type.
    /// - [`SigslotError::DuplicateSignal`] if a live signal already uses
    ///   `name` and the policy is [`DuplicateSignalPolicy::Reject`].
    ///
    /// # Panics
    ///
    /// Panics when duplicate slot names are checked and two alive parked
    /// connections share a slot name. The pending list is left as it was.
    pub fn add_signal<A: ?Sized + 'static>(&self, name: impl Into<String>) -> Result<Signal<A>> {
        let name = name.into();
        let shape = Shape::of::<A>();
        // Strong references taken under the hub lock are dropped after it.
        let mut adopted: Vec<Arc<ConnectionCore<A>>> = Vec::new();
        let mut retired: Vec<Arc<dyn ErasedSignal>> = Vec::new();
        let guard = self.shared.table.lock();

        // Validate the parked list before its entry leaves the table.
        let parked = match guard.borrow().get(&name) {
            Some(Binding::Pending(pending)) if pending.shape != shape => {
                return Err(SigslotError::mismatch(&name, shape, pending.shape));
            }
            Some(Binding::Pending(pending)) => pending.peers(),
            _ => Vec::new(),
        };
        let requested = parked.len();
        adopted.extend(
            parked
                .iter()
                .filter_map(Weak::upgrade)
                .filter_map(downcast_core::<A>),
        );
        if self.shared.config.check_duplicate_slot_names {
            assert_distinct_slot_names(&name, &adopted);
        }

        let previous = guard.borrow_mut().remove(&name);
        if let Some(Binding::Bound(bound)) = previous
            && bound.is_live()
        {
            match self.shared.config.duplicate_signal {
                DuplicateSignalPolicy::Reject => {
                    guard.borrow_mut().insert(name.clone(), Binding::Bound(bound));
                    return Err(SigslotError::DuplicateSignal { name });
                }
                DuplicateSignalPolicy::Replace => {
                    if let Some(old) = bound.signal.upgrade() {
                        old.hook().clear();
                        retired.push(old);
                    }
                    warn!(hub = %self.shared.config.label, signal = %name, "replacing live signal");
                }
            }
        }

        let signal = Signal::<A>::with_config(name.clone(), self.shared.config.signal_config());
        let core = signal.core();
        for conn in &adopted {
            SignalCore::attach(core, conn);
        }

        let hub = Arc::downgrade(&self.shared);
        let key = name.clone();
        core.on_final.install(move |id| {
            if let Some(hub) = hub.upgrade() {
                hub.forget_signal(&key, id);
            }
        });
        let erased: Arc<dyn ErasedSignal> = Arc::clone(core) as Arc<dyn ErasedSignal>;
        guard
            .borrow_mut()
            .insert(name.clone(), Binding::Bound(BoundSignal::new(&erased)));
        drop(guard);

        debug!(
            hub = %self.shared.config.label,
            signal = %name,
            shape = %shape,
            migrated = adopted.len(),
            requested,
            "signal registered"
        );
        Ok(signal)
    }

    /// Connect an unnamed callback to the signal called `name`.
    ///
    /// See [`connect_named`](Self::connect_named).
    #[must_use = "dropping the connection disconnects the callback"]
    pub fn connect<A: ?Sized + 'static>(
        &self,
        name: impl Into<String>,
        slot: impl Fn(&A) + Send + Sync + 'static,
    ) -> Result<Connection<A>> {
        self.connect_named(name, "", slot)
    }

    /// Connect a labelled callback to the signal called `name`.
    ///
    /// Binds immediately when the signal is live, otherwise parks the
    /// connection until [`add_signal`](Self::add_signal) creates it.
    /// Emissions that happen before that are not replayed.
    ///
    /// # Errors
    ///
    /// [`SigslotError::ShapeMismatch`] if the live signal, or connections
    /// already parked for `name`, use a different argument type.
    ///
    /// # Panics
    ///
    /// Panics when duplicate slot names are checked (see [`HubConfig`]) and
    /// an alive connection, bound or parked under `name`, already uses
    /// `slot_name`. Nothing is parked in that case.
    #[must_use = "dropping the connection disconnects the callback"]
    pub fn connect_named<A: ?Sized + 'static>(
        &self,
        name: impl Into<String>,
        slot_name: impl Into<String>,
        slot: impl Fn(&A) + Send + Sync + 'static,
    ) -> Result<Connection<A>> {
        let name = name.into();
        let slot_name = slot_name.into();
        let shape = Shape::of::<A>();
        let guard = self.shared.table.lock();

        let live = {
            let table = guard.borrow();
            match table.get(&name) {
                Some(Binding::Bound(bound)) => bound.signal.upgrade(),
                _ => None,
            }
        };
        if let Some(signal) = live {
            drop(guard);
            let found = signal.shape();
            let core = downcast_signal::<A>(signal)
                .ok_or_else(|| SigslotError::mismatch(&name, shape, found))?;
            return Ok(Signal::from_core(core).connect_named(slot_name, slot));
        }

        if self.shared.config.check_duplicate_slot_names && !slot_name.is_empty() {
            let peers = match guard.borrow().get(&name) {
                Some(Binding::Pending(pending)) if pending.shape == shape => pending.peers(),
                _ => Vec::new(),
            };
            let clash = peers
                .iter()
                .filter_map(Weak::upgrade)
                .any(|peer| peer.name() == slot_name);
            assert!(
                !clash,
                "slot name '{slot_name}' is already connected to signal '{name}'"
            );
        }

        let core = ConnectionCore::new(name.clone(), slot_name, slot);
        let erased: Arc<dyn ErasedConnection> = Arc::clone(&core) as Arc<dyn ErasedConnection>;
        {
            let mut table = guard.borrow_mut();
            match table.get_mut(&name) {
                Some(Binding::Pending(pending)) if pending.shape != shape => {
                    return Err(SigslotError::mismatch(&name, shape, pending.shape));
                }
                Some(Binding::Pending(pending)) => pending.park(&erased),
                _ => {
                    let mut pending = PendingConnections::new(shape);
                    pending.park(&erased);
                    table.insert(name.clone(), Binding::Pending(pending));
                }
            }
        }

        let hub = Arc::downgrade(&self.shared);
        let key = name.clone();
        core.detach.install(move |id| {
            if let Some(hub) = hub.upgrade() {
                hub.forget_parked(&key, id);
            }
        });
        drop(guard);

        trace!(
            hub = %self.shared.config.label,
            signal = %name,
            conn = %core.id(),
            "connection parked until signal exists"
        );
        Ok(Connection::from_core(core))
    }

    /// Emit on the signal called `name`.
    ///
    /// Without a live signal this is a silent no-op, repeatable any number
    /// of times. The hub lock is released before any callback runs.
    ///
    /// # Errors
    ///
    /// [`SigslotError::ShapeMismatch`] if the live signal has a different
    /// argument type.
    pub fn emit<A: ?Sized + 'static>(&self, name: &str, args: &A) -> Result<()> {
        let Some(signal) = self.shared.live_signal(name) else {
            trace!(hub = %self.shared.config.label, signal = name, "emit with no listener");
            return Ok(());
        };
        let found = signal.shape();
        let core = downcast_signal::<A>(signal)
            .ok_or_else(|| SigslotError::mismatch(name, Shape::of::<A>(), found))?;
        core.emit(args);
        Ok(())
    }

    /// Emit on an argument-less signal called `name`.
    ///
    /// # Errors
    ///
    /// Same as [`emit`](Self::emit).
    pub fn fire(&self, name: &str) -> Result<()> {
        self.emit::<()>(name, &())
    }

    /// Typed handle to the live signal called `name`, if any.
    ///
    /// # Errors
    ///
    /// [`SigslotError::ShapeMismatch`] if the live signal has a different
    /// argument type.
    pub fn signal<A: ?Sized + 'static>(&self, name: &str) -> Result<Option<Signal<A>>> {
        let Some(signal) = self.shared.live_signal(name) else {
            return Ok(None);
        };
        let found = signal.shape();
        let core = downcast_signal::<A>(signal)
            .ok_or_else(|| SigslotError::mismatch(name, Shape::of::<A>(), found))?;
        Ok(Some(Signal::from_core(core)))
    }

    /// Whether a live signal is registered under `name`.
    #[must_use]
    pub fn contains_signal(&self, name: &str) -> bool {
        let guard = self.shared.table.lock();
        let table = guard.borrow();
        matches!(table.get(name), Some(Binding::Bound(bound)) if bound.is_live())
    }

    /// Number of alive connections parked for `name`.
    #[must_use]
    pub fn pending_count(&self, name: &str) -> usize {
        let guard = self.shared.table.lock();
        let table = guard.borrow();
        match table.get(name) {
            Some(Binding::Pending(pending)) => pending.live_count(),
            _ => 0,
        }
    }

    /// Sorted names of every live registered signal.
    #[must_use]
    pub fn signal_names(&self) -> Vec<String> {
        let guard = self.shared.table.lock();
        let table = guard.borrow();
        let mut names: Vec<String> = table
            .iter()
            .filter_map(|(name, binding)| match binding {
                Binding::Bound(bound) if bound.is_live() => Some(name.clone()),
                _ => None,
            })
            .collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
