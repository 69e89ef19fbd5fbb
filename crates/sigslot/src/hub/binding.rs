#![forbid(unsafe_code)]

//! Per-name binding table.
//!
//! Each signal name is in exactly one state: `Bound` to a signal (possibly
//! already dead, until its on-final hook removes it) or `Pending` with the
//! connections requested before the signal existed. Everything stored here
//! is weak; the table never keeps a participant alive.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::connection::{ConnectionId, ErasedConnection};
use crate::shape::Shape;
use crate::signal::{ErasedSignal, SignalId};

pub(super) type BindingTable = HashMap<String, Binding>;

pub(super) enum Binding {
    Bound(BoundSignal),
    Pending(PendingConnections),
}

pub(super) struct BoundSignal {
    pub(super) id: SignalId,
    pub(super) signal: Weak<dyn ErasedSignal>,
}

impl BoundSignal {
    pub(super) fn new(signal: &Arc<dyn ErasedSignal>) -> Self {
        Self {
            id: signal.id(),
            signal: Arc::downgrade(signal),
        }
    }

    pub(super) fn is_live(&self) -> bool {
        self.signal.strong_count() > 0
    }
}

pub(super) struct PendingConnections {
    pub(super) shape: Shape,
    pub(super) parked: Vec<Parked>,
}

pub(super) struct Parked {
    pub(super) id: ConnectionId,
    pub(super) conn: Weak<dyn ErasedConnection>,
}

impl PendingConnections {
    pub(super) fn new(shape: Shape) -> Self {
        Self {
            shape,
            parked: Vec::new(),
        }
    }

    pub(super) fn park(&mut self, conn: &Arc<dyn ErasedConnection>) {
        self.parked.push(Parked {
            id: conn.id(),
            conn: Arc::downgrade(conn),
        });
    }

    /// Remove the entry for `id`. Returns whether the list is now empty.
    pub(super) fn unpark(&mut self, id: ConnectionId) -> bool {
        self.parked.retain(|p| p.id != id);
        self.parked.is_empty()
    }

    /// Weak references to every parked connection, in request order.
    ///
    /// Upgrade them only after the table borrow is released: dropping the
    /// last strong reference runs a hook that edits the table.
    pub(super) fn peers(&self) -> Vec<Weak<dyn ErasedConnection>> {
        self.parked.iter().map(|p| p.conn.clone()).collect()
    }

    pub(super) fn live_count(&self) -> usize {
        self.parked
            .iter()
            .filter(|p| p.conn.strong_count() > 0)
            .count()
    }
}
