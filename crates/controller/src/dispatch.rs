//! Dispatcher - reconciles every known identity on a worker pool
//!
//! Each pass lists the identities of every reconciler, skips the ones whose
//! requeue or backoff delay has not elapsed, and reconciles the rest in
//! parallel. An identity appears at most once per pass, so two reconciles of
//! the same object never overlap.

use crate::error::Result;
use crate::reconciler::Reconciler;
use crate::types::{Action, Backoff};
use objstore::ObjectKey;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOptions {
    /// Number of worker threads
    pub jobs: usize,
    /// Delay schedule after failed reconciles
    pub backoff: Backoff,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            backoff: Backoff::default(),
        }
    }
}

/// Outcome of one dispatcher pass
#[derive(Debug, Default)]
pub struct PassSummary {
    /// Identities reconciled without error
    pub reconciled: usize,
    /// Of those, how many asked to be looked at again
    pub requeued: usize,
    /// Identities whose reconcile failed: kind, key, error
    pub failed: Vec<(String, ObjectKey, String)>,
    /// Identities skipped because their delay has not elapsed
    pub waiting: usize,
}

impl PassSummary {
    /// Whether nothing is left to do
    pub fn is_settled(&self) -> bool {
        self.requeued == 0 && self.failed.is_empty() && self.waiting == 0
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: Instant,
    failures: u32,
}

type Identity = (&'static str, ObjectKey);

pub struct Dispatcher {
    pool: rayon::ThreadPool,
    backoff: Backoff,
    schedule: Mutex<HashMap<Identity, Entry>>,
}

impl Dispatcher {
    pub fn new(options: DispatchOptions) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()?;
        Ok(Self {
            pool,
            backoff: options.backoff,
            schedule: Mutex::new(HashMap::new()),
        })
    }

    /// Run one pass over every identity that is due now.
    pub fn pass(&self, reconcilers: &[&dyn Reconciler]) -> Result<PassSummary> {
        self.pass_at(reconcilers, Instant::now())
    }

    /// Earliest time a waiting identity becomes due
    pub fn next_due(&self) -> Option<Instant> {
        self.lock().values().map(|entry| entry.due).min()
    }

    fn pass_at(&self, reconcilers: &[&dyn Reconciler], now: Instant) -> Result<PassSummary> {
        let mut summary = PassSummary::default();
        let mut work: Vec<(&dyn Reconciler, ObjectKey)> = Vec::new();
        let mut seen: HashSet<Identity> = HashSet::new();

        {
            let mut schedule = self.lock();
            for &reconciler in reconcilers {
                for key in reconciler.keys()? {
                    let id = (reconciler.kind(), key);
                    if !seen.insert(id.clone()) {
                        continue;
                    }
                    match schedule.get(&id) {
                        Some(entry) if entry.due > now => summary.waiting += 1,
                        _ => work.push((reconciler, id.1)),
                    }
                }
            }
            // identities that disappeared from the store
            schedule.retain(|id, _| seen.contains(id));
        }

        log::debug!(
            "dispatch: {} due, {} waiting",
            work.len(),
            summary.waiting
        );

        let outcomes: Vec<_> = self.pool.install(|| {
            work.par_iter()
                .map(|(reconciler, key)| (reconciler.kind(), key.clone(), reconciler.reconcile(key)))
                .collect()
        });

        let mut schedule = self.lock();
        for (kind, key, outcome) in outcomes {
            let id = (kind, key);
            match outcome {
                Ok(Action::Done) => {
                    schedule.remove(&id);
                    summary.reconciled += 1;
                }
                Ok(Action::RequeueAfter(delay)) => {
                    schedule.insert(
                        id,
                        Entry {
                            due: now + delay,
                            failures: 0,
                        },
                    );
                    summary.reconciled += 1;
                    summary.requeued += 1;
                }
                Err(e) => {
                    let failures = schedule.get(&id).map_or(0, |entry| entry.failures) + 1;
                    let delay = self.backoff.delay_for_attempt(failures - 1);
                    let (kind, key) = id;
                    log::warn!(
                        "{kind} {key}: {e} (attempt {failures}, retrying in {}s)",
                        delay.as_secs()
                    );
                    summary.failed.push((kind.to_string(), key.clone(), e.to_string()));
                    schedule.insert(
                        (kind, key),
                        Entry {
                            due: now + delay,
                            failures,
                        },
                    );
                }
            }
        }
        Ok(summary)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Identity, Entry>> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
