#![forbid(unsafe_code)]

//! Seeded multi-thread storm driver.
//!
//! Every worker waits on a shared barrier, then runs the same body with its
//! own index and a deterministic generator derived from the storm seed. The
//! seed is taken from `SIGSLOT_STORM_SEED` when set, so a failing run can be
//! replayed.

use std::sync::{Arc, Barrier};
use std::thread;

use tracing::debug;

pub const ENV_STORM_SEED: &str = "SIGSLOT_STORM_SEED";

/// Storm shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StormConfig {
    pub threads: usize,
    pub rounds: usize,
    pub seed: u64,
}

impl Default for StormConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            rounds: 200,
            seed: storm_seed(0x5167_5107),
        }
    }
}

impl StormConfig {
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Choose a seed from the environment or use the provided default.
#[must_use]
pub fn storm_seed(default_seed: u64) -> u64 {
    std::env::var(ENV_STORM_SEED)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default_seed)
}

/// Deterministic LCG for reproducible schedules.
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 11
    }

    /// Uniform-ish index in `0..bound`. `bound` must be non-zero.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

/// Per-thread view handed to the storm body.
#[derive(Debug)]
pub struct StormWorker {
    pub index: usize,
    pub rounds: usize,
    pub rng: Lcg,
}

/// Run `body` on `config.threads` threads released together by a barrier.
///
/// Returns each worker's result in worker order. A panicking worker is
/// re-raised on the calling thread.
pub fn run_storm<R, F>(config: &StormConfig, body: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(StormWorker) -> R + Send + Sync + 'static,
{
    let threads = config.threads.max(1);
    let barrier = Arc::new(Barrier::new(threads));
    let body = Arc::new(body);
    debug!(threads, rounds = config.rounds, seed = config.seed, "storm start");

    let handles: Vec<_> = (0..threads)
        .map(|index| {
            let barrier = Arc::clone(&barrier);
            let body = Arc::clone(&body);
            let worker = StormWorker {
                index,
                rounds: config.rounds,
                rng: Lcg::new(config.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            };
            thread::Builder::new()
                .name(format!("storm-{index}"))
                .spawn(move || {
                    barrier.wait();
                    body(worker)
                })
                .unwrap_or_else(|err| panic!("spawn storm worker {index}: {err}"))
        })
        .collect();

    handles
        .into_iter()
        .map(|handle| match handle.join() {
            Ok(result) => result,
            Err(payload) => std::panic::resume_unwind(payload),
        })
        .collect()
}
