//! Time-varying worker population scheduling
//!
//! A `RampSchedule` describes a piecewise-linear concurrency curve as a list
//! of stages; `run_population` reconciles a pool of spawned worker tasks to
//! that curve, granting every retiring worker a grace window to finish its
//! current iteration before the task is aborted.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// How often the scheduler compares the live worker count to the curve
const RECONCILE_TICK: Duration = Duration::from_millis(100);

/// One stage of a ramp: over `duration`, move linearly to `target` workers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

/// Piecewise-linear concurrency curve for one worker population
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampSchedule {
    /// Delay before the first stage; the population holds at zero until then
    pub start_offset: Duration,
    pub stages: Vec<Stage>,
    /// How long a retiring worker may keep its current iteration running
    pub graceful_ramp_down: Duration,
}

impl RampSchedule {
    /// The canonical three-stage curve: ramp 0 to `target`, hold for the
    /// steady-state duration, ramp back down to 0
    pub fn standard(
        target: usize,
        ramp_up: Duration,
        hold: Duration,
        ramp_down: Duration,
        graceful_ramp_down: Duration,
    ) -> Self {
        Self {
            start_offset: Duration::ZERO,
            stages: vec![
                Stage {
                    duration: ramp_up,
                    target,
                },
                Stage {
                    duration: hold,
                    target,
                },
                Stage {
                    duration: ramp_down,
                    target: 0,
                },
            ],
            graceful_ramp_down,
        }
    }

    /// Shifts the whole curve right; the population idles until the offset
    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = offset;
        self
    }

    /// Target worker count at `elapsed` since the run started, interpolating
    /// linearly within the active stage from the previous stage's end target.
    /// `None` once the schedule is exhausted.
    pub fn target_at(&self, elapsed: Duration) -> Option<usize> {
        if elapsed < self.start_offset {
            return Some(0);
        }

        let mut t = elapsed - self.start_offset;
        let mut previous = 0usize;
        for stage in &self.stages {
            if t < stage.duration {
                let frac = t.as_secs_f64() / stage.duration.as_secs_f64();
                let from = previous as f64;
                let to = stage.target as f64;
                return Some((from + (to - from) * frac).round() as usize);
            }
            t -= stage.duration;
            previous = stage.target;
        }
        None
    }

    /// Wall-clock length of the whole schedule, offset included
    pub fn total_duration(&self) -> Duration {
        self.start_offset + self.stages.iter().map(|s| s.duration).sum::<Duration>()
    }
}

struct LiveWorker {
    id: usize,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives one worker population along `schedule` until it is exhausted and
/// every worker has retired
///
/// `spawn_worker` receives a fresh worker id and the worker's private stop
/// flag; the spawned task must exit soon after the flag is set. Workers are
/// retired newest-first so long-lived workers keep their identity. The shared
/// `live_gauge` tracks the current live count for progress reporting.
pub async fn run_population<F>(
    name: &'static str,
    schedule: RampSchedule,
    live_gauge: Arc<AtomicUsize>,
    mut spawn_worker: F,
) where
    F: FnMut(usize, Arc<AtomicBool>) -> JoinHandle<()>,
{
    let started = Instant::now();
    let mut live: Vec<LiveWorker> = Vec::new();
    let mut draining: Vec<(Instant, LiveWorker)> = Vec::new();
    let mut next_id = 0usize;

    while let Some(target) = schedule.target_at(started.elapsed()) {
        // A worker that exited on its own (e.g. panicked) no longer counts
        // as live; reconciliation below replaces it
        live.retain(|w| !w.handle.is_finished());

        while live.len() < target {
            let stop = Arc::new(AtomicBool::new(false));
            let handle = spawn_worker(next_id, stop.clone());
            debug!("{} worker {} started", name, next_id);
            live.push(LiveWorker {
                id: next_id,
                stop,
                handle,
            });
            next_id += 1;
        }

        while live.len() > target {
            if let Some(worker) = live.pop() {
                worker.stop.store(true, Ordering::Relaxed);
                debug!("{} worker {} retiring", name, worker.id);
                draining.push((Instant::now() + schedule.graceful_ramp_down, worker));
            }
        }

        reap_draining(name, &mut draining);
        live_gauge.store(live.len(), Ordering::Relaxed);
        sleep(RECONCILE_TICK).await;
    }

    // Schedule exhausted: everything still live retires now
    for worker in live.drain(..) {
        worker.stop.store(true, Ordering::Relaxed);
        draining.push((Instant::now() + schedule.graceful_ramp_down, worker));
    }
    live_gauge.store(0, Ordering::Relaxed);

    for (deadline, worker) in draining {
        let mut handle = worker.handle;
        let remaining = deadline.saturating_duration_since(Instant::now());
        if timeout(remaining, &mut handle).await.is_err() {
            warn!(
                "{} worker {} did not stop within the grace window, aborting",
                name, worker.id
            );
            handle.abort();
            let _ = handle.await;
        }
    }

    info!("{} population drained after {:?}", name, started.elapsed());
}

/// Drops workers that finished draining; aborts those past their deadline
fn reap_draining(name: &'static str, draining: &mut Vec<(Instant, LiveWorker)>) {
    let now = Instant::now();
    draining.retain(|(deadline, worker)| {
        if worker.handle.is_finished() {
            return false;
        }
        if now >= *deadline {
            warn!(
                "{} worker {} did not stop within the grace window, aborting",
                name, worker.id
            );
            worker.handle.abort();
            return false;
        }
        true
    });
}
