#![forbid(unsafe_code)]

//! Named, thread-safe signal/slot dispatch with weak bindings.
//!
//! # Role
//! `sigslot` lets independent components publish on named signals and attach
//! callbacks without either side holding a reference to the other. Both sides
//! are owned by whoever holds their handle; the other side only keeps a `Weak`
//! reference plus a one-shot detach hook.
//!
//! # Primary pieces
//! - [`Connection`]: one bound callback with an enable flag.
//! - [`Signal`]: an ordered fan-out point that owns the emission algorithm.
//! - [`SignalHub`]: name-indexed registry that also parks connections
//!   requested before their signal exists and migrates them on creation.
//! - [`Container`]: owning bag of handles for bulk enable/disable.
//!
//! # Invariants
//!
//! 1. Dispatch order equals connection order at the start of an emission.
//! 2. A released connection is never invoked by a later emission.
//! 3. Releasing a signal, a connection, or a hub in any order never touches
//!    freed state: each side clears the other side's hook before it goes away.
//! 4. Emitting to a name with no live signal is a silent no-op.
//!
//! # Example
//!
//! ```
//! use sigslot::SignalHub;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let hub = SignalHub::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&hits);
//!
//! // Consumer first: the connection is parked until "tick" exists.
//! let _conn = hub
//!     .connect::<()>("tick", move |_| {
//!         seen.fetch_add(1, Ordering::SeqCst);
//!     })
//!     .unwrap();
//!
//! let _tick = hub.add_signal::<()>("tick").unwrap();
//! hub.fire("tick").unwrap();
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

pub mod connection;
pub mod container;
pub mod error;
pub mod hub;
pub mod shape;
pub mod signal;

mod hook;

pub use connection::{AnyConnection, Connection, ConnectionId};
pub use container::{Container, Switch};
pub use error::{Result, SigslotError};
pub use hub::{DuplicateSignalPolicy, HubConfig, SignalHub};
pub use shape::Shape;
pub use signal::{AnySignal, Signal, SignalConfig, SignalId};
