//! Property-based invariant tests for signal dispatch and the hub.
//!
//! Verifies structural guarantees that must hold for any connection set:
//!
//! 1. Dispatch order equals connection order.
//! 2. A disabled signal invokes nothing; per-connection flags survive.
//! 3. Released connections are never invoked and leave the list.
//! 4. Connections outliving their signal become inert, never dangling.
//! 5. Early connections migrate in request order with their enable state,
//!    and emissions before the signal existed are not replayed.
//! 6. Emitting to a name with no live signal is an idempotent no-op.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use sigslot::{Connection, Signal, SignalHub};

type Log = Arc<Mutex<Vec<usize>>>;

// ── Strategy helpers ──────────────────────────────────────────────────

/// One flag per connection, at least one connection.
fn arb_mask() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..24)
}

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(\\.[a-z]{1,8})?"
}

fn connect_tagged(sig: &Signal<()>, log: &Log, count: usize) -> Vec<Connection<()>> {
    (0..count)
        .map(|tag| {
            let log = Arc::clone(log);
            sig.connect(move |_| log.lock().push(tag))
        })
        .collect()
}

fn selected(mask: &[bool], want: bool) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter(|(_, flag)| **flag == want)
        .map(|(i, _)| i)
        .collect()
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Dispatch order
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn dispatch_follows_connection_order(count in 1usize..32, rounds in 1usize..4) {
        let sig = Signal::<()>::new("order");
        let log: Log = Arc::default();
        let _conns = connect_tagged(&sig, &log, count);

        for _ in 0..rounds {
            sig.fire();
        }
        let expected: Vec<usize> = (0..rounds).flat_map(|_| 0..count).collect();
        prop_assert_eq!(log.lock().clone(), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Disable cascade
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn signal_flag_gates_connection_flags(mask in arb_mask(), signal_on in any::<bool>()) {
        let sig = Signal::<()>::new("cascade");
        let log: Log = Arc::default();
        let conns = connect_tagged(&sig, &log, mask.len());
        for (conn, on) in conns.iter().zip(&mask) {
            conn.set_enabled(*on);
        }
        sig.set_enabled(signal_on);

        sig.fire();
        let expected = if signal_on { selected(&mask, true) } else { Vec::new() };
        prop_assert_eq!(log.lock().clone(), expected);

        for (conn, on) in conns.iter().zip(&mask) {
            prop_assert_eq!(conn.is_enabled(), *on);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Auto-detach
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn released_connections_are_never_invoked(drop_mask in arb_mask()) {
        let sig = Signal::<()>::new("detach");
        let log: Log = Arc::default();
        let conns = connect_tagged(&sig, &log, drop_mask.len());

        let kept: Vec<Connection<()>> = conns
            .into_iter()
            .zip(&drop_mask)
            .filter_map(|(conn, released)| (!released).then_some(conn))
            .collect();
        let survivors = selected(&drop_mask, false);
        prop_assert_eq!(sig.connection_count(), survivors.len());

        sig.fire();
        prop_assert_eq!(log.lock().clone(), survivors);
        prop_assert!(kept.iter().all(Connection::is_attached));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Signal death safety
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn connections_outliving_signal_are_inert(count in 1usize..16) {
        let sig = Signal::<()>::new("dying");
        let log: Log = Arc::default();
        let conns = connect_tagged(&sig, &log, count);

        drop(sig);
        prop_assert!(conns.iter().all(|c| !c.is_attached()));

        for conn in &conns {
            conn.invoke(&());
        }
        prop_assert_eq!(log.lock().clone(), (0..count).collect::<Vec<_>>());
        drop(conns);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Deferred binding
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn early_connections_migrate_in_order(
        name in arb_name(),
        enabled in arb_mask(),
        early_emits in 0usize..4,
    ) {
        let hub = SignalHub::new();
        let log: Log = Arc::default();
        let conns: Vec<Connection<()>> = (0..enabled.len())
            .map(|tag| {
                let log = Arc::clone(&log);
                hub.connect::<()>(name.as_str(), move |_| log.lock().push(tag))
                    .expect("first shape for this name")
            })
            .collect();
        for (conn, on) in conns.iter().zip(&enabled) {
            conn.set_enabled(*on);
        }
        for _ in 0..early_emits {
            prop_assert!(hub.fire(&name).is_ok());
        }
        prop_assert!(log.lock().is_empty());
        prop_assert_eq!(hub.pending_count(&name), enabled.len());

        let sig = hub.add_signal::<()>(name.as_str()).expect("no live signal yet");
        prop_assert_eq!(hub.pending_count(&name), 0);
        prop_assert_eq!(sig.connection_count(), enabled.len());

        hub.fire(&name).expect("shape matches");
        prop_assert_eq!(log.lock().clone(), selected(&enabled, true));
    }

    #[test]
    fn released_early_connections_are_not_migrated(
        name in arb_name(),
        drop_mask in arb_mask(),
    ) {
        let hub = SignalHub::new();
        let log: Log = Arc::default();
        let mut kept = Vec::new();
        for (tag, released) in drop_mask.iter().enumerate() {
            let log = Arc::clone(&log);
            let conn = hub
                .connect::<()>(name.as_str(), move |_| log.lock().push(tag))
                .expect("first shape for this name");
            if !released {
                kept.push(conn);
            }
        }
        let survivors = selected(&drop_mask, false);
        prop_assert_eq!(hub.pending_count(&name), survivors.len());

        let sig = hub.add_signal::<()>(name.as_str()).expect("no live signal yet");
        prop_assert_eq!(sig.connection_count(), survivors.len());
        sig.fire();
        prop_assert_eq!(log.lock().clone(), survivors);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Emit to nothing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn emit_without_signal_is_idempotent(
        names in prop::collection::vec(arb_name(), 1..8),
        repeats in 1usize..6,
    ) {
        let hub = SignalHub::new();
        for _ in 0..repeats {
            for name in &names {
                prop_assert!(hub.fire(name).is_ok());
                prop_assert!(hub.emit::<u64>(name, &7).is_ok());
            }
        }
        prop_assert!(hub.signal_names().is_empty());
        for name in &names {
            prop_assert!(!hub.contains_signal(name));
            prop_assert_eq!(hub.pending_count(name), 0);
        }
    }
}
