//! Bounded worker pool shared by every probe campaign.
//!
//! At most `concurrency` probes run at once. Outcomes come back lazily and in
//! completion order through [`Outcomes::next`], so the caller's loop is the
//! single place results are merged. A probe that panics or overruns its
//! deadline still yields exactly one negative outcome.
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::ProbeError;
use crate::types::{ProbeInput, ProbeOutcome};

/// One independent network check.
///
/// `Ok` carries optional metadata (service name, resolved name) and means the
/// probe succeeded; `Err` is an expected negative.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self, input: &ProbeInput) -> Result<Option<String>, ProbeError>;
}

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// Hard deadline applied around every probe.
    pub probe_timeout: Duration,
    /// How long to keep collecting in-flight probes after cancellation.
    pub grace: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            probe_timeout: Duration::from_secs(3),
            grace: Duration::from_secs(2),
        }
    }
}

/// Start a pool run over `inputs`. Nothing is dispatched until the first
/// call to [`Outcomes::next`].
pub fn run<P>(
    inputs: Vec<ProbeInput>,
    probe: Arc<P>,
    config: PoolConfig,
    cancel: CancellationToken,
) -> Outcomes<P>
where
    P: Probe + ?Sized,
{
    let total = inputs.len();
    Outcomes {
        pending: inputs.into_iter(),
        probe,
        tasks: JoinSet::new(),
        concurrency: config.concurrency.max(1),
        probe_timeout: config.probe_timeout,
        grace: config.grace,
        cancel,
        stop_deadline: None,
        total,
        delivered: 0,
        abandoned: 0,
    }
}

/// Lazy, unordered sequence of probe outcomes.
pub struct Outcomes<P: Probe + ?Sized> {
    pending: std::vec::IntoIter<ProbeInput>,
    probe: Arc<P>,
    tasks: JoinSet<ProbeOutcome>,
    concurrency: usize,
    probe_timeout: Duration,
    grace: Duration,
    cancel: CancellationToken,
    stop_deadline: Option<Instant>,
    total: usize,
    delivered: usize,
    abandoned: usize,
}

impl<P: Probe + ?Sized> Outcomes<P> {
    /// Next completed outcome, or `None` once every dispatched probe has
    /// reported (or, after cancellation, once the grace window closes).
    pub async fn next(&mut self) -> Option<ProbeOutcome> {
        loop {
            if self.stop_deadline.is_none() && self.cancel.is_cancelled() {
                self.begin_stop();
            }
            if self.stop_deadline.is_none() {
                self.fill();
            }
            if self.tasks.is_empty() {
                return None;
            }

            let joined = match self.stop_deadline {
                Some(deadline) => match time::timeout_at(deadline, self.tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        self.abandon_stragglers();
                        return None;
                    }
                },
                None => {
                    let raced = tokio::select! {
                        biased;
                        joined = self.tasks.join_next() => Some(joined),
                        _ = self.cancel.cancelled() => None,
                    };
                    match raced {
                        Some(joined) => joined,
                        None => {
                            self.begin_stop();
                            continue;
                        }
                    }
                }
            };

            match joined {
                Some(Ok(outcome)) => {
                    self.delivered += 1;
                    return Some(outcome);
                }
                Some(Err(e)) => {
                    // Probe panics are caught inside the task, so this is runtime shutdown.
                    error!(error = %e, "probe task did not complete");
                    self.abandoned += 1;
                }
                None => return None,
            }
        }
    }

    /// Drain the pool into a vector.
    pub async fn collect(mut self) -> Vec<ProbeOutcome> {
        let mut out = Vec::with_capacity(self.total);
        while let Some(o) = self.next().await {
            out.push(o);
        }
        out
    }

    /// True once the pool has observed cancellation and stopped dispatching.
    pub fn was_cancelled(&self) -> bool {
        self.stop_deadline.is_some()
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Inputs that never produced an outcome: never dispatched, or still running
    /// when the grace window closed.
    pub fn abandoned(&self) -> usize {
        self.abandoned + self.pending.len()
    }

    fn fill(&mut self) {
        while self.tasks.len() < self.concurrency {
            let Some(input) = self.pending.next() else {
                break;
            };
            let probe = Arc::clone(&self.probe);
            let deadline = self.probe_timeout;
            self.tasks.spawn(async move {
                let guarded = AssertUnwindSafe(time::timeout(deadline, probe.probe(&input)))
                    .catch_unwind()
                    .await;
                let result = match guarded {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => Err(ProbeError::Timeout(deadline)),
                    Err(payload) => Err(ProbeError::Fault(panic_message(payload.as_ref()))),
                };
                ProbeOutcome::from_result(input, result)
            });
        }
    }

    fn begin_stop(&mut self) {
        debug!(
            in_flight = self.tasks.len(),
            undispatched = self.pending.len(),
            "cancellation observed, no further probes will be dispatched"
        );
        self.stop_deadline = Some(Instant::now() + self.grace);
    }

    fn abandon_stragglers(&mut self) {
        let stragglers = self.tasks.len();
        warn!(stragglers, grace = ?self.grace, "grace window elapsed, leaving probes to finish in background");
        self.abandoned += stragglers;
        // Detached tasks keep running until their own deadline; they are not aborted.
        self.tasks.detach_all();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("probe panicked")
    }
}
