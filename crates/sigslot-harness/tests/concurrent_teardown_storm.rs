//! Concurrency storms: connections, signals, and hubs released from many
//! threads while emissions are in flight.
//!
//! ## Test Categories
//!
//! 1. **Delivery** - stable connections see every emission despite churn.
//! 2. **Connection churn** - connect/drop racing emit leaves no entries.
//! 3. **Signal churn** - signals created and dropped under concurrent
//!    connect and emit; the registry ends empty.
//! 4. **Hub teardown** - hub clones dropped from worker threads while
//!    connections are parked or bound.
//!
//! Failures print the storm seed; replay with `SIGSLOT_STORM_SEED=<seed>`.
//!
//! Run with: cargo test -p sigslot-harness --test concurrent_teardown_storm

use std::sync::Arc;

use sigslot::{Connection, SigslotError, SignalHub};
use sigslot_harness::{HitCounter, StormConfig, init_test_logging, run_storm};

// =============================================================================
// Delivery
// =============================================================================

#[test]
fn stable_connections_see_every_emission() {
    init_test_logging();
    let config = StormConfig::default().with_threads(8).with_rounds(500);
    let hub = SignalHub::new();
    let sig = hub.add_signal::<u64>("pulse").unwrap();
    let stable = HitCounter::new();
    let _keep = sig.connect(stable.slot::<u64>());

    let worker_hub = hub.clone();
    run_storm(&config, move |mut worker| {
        for round in 0..worker.rounds {
            // Churn a short-lived connection on some rounds.
            let churn = (worker.rng.below(3) == 0)
                .then(|| worker_hub.connect::<u64>("pulse", |_| {}).unwrap());
            worker_hub.emit("pulse", &(round as u64)).unwrap();
            drop(churn);
        }
    });

    assert_eq!(
        stable.get(),
        config.threads * config.rounds,
        "seed {}",
        config.seed
    );
    assert_eq!(sig.connection_count(), 1, "seed {}", config.seed);
}

// =============================================================================
// Connection churn
// =============================================================================

#[test]
fn connect_drop_emit_race_leaves_no_entries() {
    init_test_logging();
    let config = StormConfig::default().with_threads(6).with_rounds(300);
    let hub = SignalHub::new();
    let sig = hub.add_signal::<()>("churn").unwrap();

    let worker_hub = hub.clone();
    let held = run_storm(&config, move |mut worker| {
        let mut held: Vec<Connection<()>> = Vec::new();
        for _ in 0..worker.rounds {
            match worker.rng.below(4) {
                0 | 1 => held.push(worker_hub.connect::<()>("churn", |_| {}).unwrap()),
                2 if !held.is_empty() => {
                    let victim = worker.rng.below(held.len());
                    drop(held.swap_remove(victim));
                }
                _ => worker_hub.fire("churn").unwrap(),
            }
        }
        held
    });

    let expected: usize = held.iter().map(Vec::len).sum();
    assert_eq!(sig.connection_count(), expected, "seed {}", config.seed);
    drop(held);
    assert_eq!(sig.connection_count(), 0, "seed {}", config.seed);
    sig.fire();
}

// =============================================================================
// Signal churn
// =============================================================================

#[test]
fn signals_dropped_under_emit_and_connect() {
    init_test_logging();
    let config = StormConfig::default().with_threads(8).with_rounds(200);
    let hub = SignalHub::new();

    let worker_hub = hub.clone();
    run_storm(&config, move |mut worker| {
        let mut conns: Vec<Connection<u32>> = Vec::new();
        for round in 0..worker.rounds {
            let name = if worker.rng.below(2) == 0 { "left" } else { "right" };
            match worker.rng.below(5) {
                0 => match worker_hub.add_signal::<u32>(name) {
                    Ok(sig) => {
                        sig.emit(&(round as u32));
                        drop(sig);
                    }
                    Err(SigslotError::DuplicateSignal { .. }) => {}
                    Err(other) => panic!("unexpected: {other}"),
                },
                1 | 2 => conns.push(worker_hub.connect::<u32>(name, |_| {}).unwrap()),
                3 => {
                    conns.clear();
                }
                _ => worker_hub.emit(name, &(round as u32)).unwrap(),
            }
        }
    });

    assert!(hub.signal_names().is_empty(), "seed {}", config.seed);
    assert_eq!(hub.pending_count("left"), 0);
    assert_eq!(hub.pending_count("right"), 0);
}

#[test]
fn parked_connections_survive_concurrent_registration() {
    init_test_logging();
    let config = StormConfig::default().with_threads(8).with_rounds(50);
    let hub = SignalHub::new();
    let hits = HitCounter::new();

    let worker_hub = hub.clone();
    let worker_hits = hits.clone();
    let conns = run_storm(&config, move |worker| {
        (0..worker.rounds)
            .map(|_| {
                worker_hub
                    .connect::<()>("late", worker_hits.slot::<()>())
                    .unwrap()
            })
            .collect::<Vec<_>>()
    });
    let total = config.threads * config.rounds;

    let sig = hub.add_signal::<()>("late").unwrap();
    assert_eq!(sig.connection_count(), total, "seed {}", config.seed);
    sig.fire();
    assert_eq!(hits.get(), total);
    drop(conns);
    assert!(sig.is_empty());
}

// =============================================================================
// Hub teardown
// =============================================================================

#[test]
fn hub_dropped_from_worker_threads() {
    init_test_logging();
    let config = StormConfig::default().with_threads(8).with_rounds(100);
    let hub = SignalHub::new();
    let sig = hub.add_signal::<()>("bound").unwrap();
    let hits = HitCounter::new();

    let clones: Vec<SignalHub> = (0..config.threads).map(|_| hub.clone()).collect();
    let clones = Arc::new(parking_lot::Mutex::new(clones));
    drop(hub);

    let worker_hits = hits.clone();
    let results = run_storm(&config, move |worker| {
        let Some(hub) = clones.lock().pop() else {
            return (Vec::new(), Vec::new());
        };
        let mut bound = Vec::new();
        let mut parked = Vec::new();
        for _ in 0..worker.rounds {
            bound.push(hub.connect::<()>("bound", worker_hits.slot::<()>()).unwrap());
            parked.push(hub.connect::<()>("never", |_| {}).unwrap());
            hub.fire("bound").unwrap();
        }
        drop(hub);
        (bound, parked)
    });

    // Every clone is gone: parked connections are inert, bound ones still fire.
    let before = hits.get();
    sig.fire();
    let mut live = 0;
    for (bound, parked) in &results {
        assert!(parked.iter().all(|c| !c.is_attached()), "seed {}", config.seed);
        assert!(bound.iter().all(Connection::is_attached), "seed {}", config.seed);
        live += bound.len();
    }
    assert_eq!(hits.get() - before, live);
    drop(results);
    assert!(sig.is_empty());
}
