//! Producer worker loop
//!
//! Each producer worker simulates one concurrent user: per iteration it
//! builds a batch of synthetic session messages, publishes the batch as a
//! single operation, records the outcome, and pauses. Publish failures are
//! recorded and survived; a worker only exits when the ramp scheduler sets
//! its stop flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::broker::TopicWriter;
use crate::checks::{RunRecorder, CHECK_PRODUCE_SUCCESSFUL};
use crate::session::{self, SyntheticMessage};

/// One producer worker instance
pub struct ProducerWorker {
    /// Writer handle shared by the whole producer population
    writer: Arc<dyn TopicWriter>,
    recorder: RunRecorder,
    /// Identity of this worker within its population (0-based)
    worker_id: usize,
    /// Messages per publish batch
    batch_size: usize,
    /// Pause between iterations; caps the per-worker publish rate
    pause: Duration,
}

impl ProducerWorker {
    pub fn new(
        writer: Arc<dyn TopicWriter>,
        recorder: RunRecorder,
        worker_id: usize,
        batch_size: usize,
        pause: Duration,
    ) -> Self {
        Self {
            writer,
            recorder,
            worker_id,
            batch_size,
            pause,
        }
    }

    /// Runs iterations until the stop flag is set. The flag is only checked
    /// between iterations, so an in-flight publish always completes.
    pub async fn run(self, stop: Arc<AtomicBool>) {
        let mut rng = StdRng::from_entropy();
        let mut iteration = 0u64;
        while !stop.load(Ordering::Relaxed) {
            self.run_iteration(&mut rng, iteration).await;
            iteration += 1;
            sleep(self.pause).await;
        }
        debug!(
            "producer worker {} stopped after {} iterations",
            self.worker_id, iteration
        );
    }

    /// One iteration: exactly `batch_size` generated messages, one publish
    /// call, one recorded outcome
    async fn run_iteration(&self, rng: &mut StdRng, iteration: u64) {
        let batch: Vec<SyntheticMessage> = (0..self.batch_size)
            .map(|seq| session::generate(rng, self.worker_id, iteration, seq))
            .collect();

        match self.writer.publish(&batch).await {
            Ok(()) => {
                self.recorder
                    .messages_produced
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                self.recorder.check(CHECK_PRODUCE_SUCCESSFUL, true).await;
            }
            Err(e) => {
                error!(
                    "producer worker {} publish failed: {}",
                    self.worker_id, e
                );
                self.recorder.writer_errors.fetch_add(1, Ordering::Relaxed);
                self.recorder.check(CHECK_PRODUCE_SUCCESSFUL, false).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::PublishError;
    use anyhow::Result;
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    /// Records every received batch size; optionally fails every publish
    struct MockWriter {
        batch_sizes: Mutex<Vec<usize>>,
        fail: bool,
    }

    impl MockWriter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                batch_sizes: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait::async_trait]
    impl TopicWriter for MockWriter {
        async fn publish(&self, batch: &[SyntheticMessage]) -> Result<(), PublishError> {
            self.batch_sizes.lock().await.push(batch.len());
            if self.fail {
                Err(PublishError::Transport("injected failure".to_string()))
            } else {
                Ok(())
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn worker(writer: Arc<MockWriter>, recorder: RunRecorder) -> ProducerWorker {
        ProducerWorker::new(writer, recorder, 0, 10, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_iteration_publishes_exactly_one_batch_of_batch_size() {
        let writer = MockWriter::new(false);
        let recorder = RunRecorder::new();
        let worker = worker(writer.clone(), recorder.clone());

        let mut rng = StdRng::from_entropy();
        worker.run_iteration(&mut rng, 0).await;

        assert_eq!(*writer.batch_sizes.lock().await, vec![10]);
        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_PRODUCE_SUCCESSFUL].passed, 1);
        assert_eq!(summary.messages_produced, 10);
        assert_eq!(summary.writer_errors, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_is_recorded_not_raised() {
        let writer = MockWriter::new(true);
        let recorder = RunRecorder::new();
        let worker = worker(writer, recorder.clone());

        let mut rng = StdRng::from_entropy();
        worker.run_iteration(&mut rng, 0).await;

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_PRODUCE_SUCCESSFUL].failed, 1);
        assert_eq!(summary.writer_errors, 1);
        assert_eq!(summary.messages_produced, 0);
    }

    #[tokio::test]
    async fn test_worker_exits_when_stop_flag_is_set() {
        let writer = MockWriter::new(false);
        let recorder = RunRecorder::new();
        let worker = worker(writer.clone(), recorder.clone());

        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(worker.run(stop.clone()));

        sleep(Duration::from_millis(50)).await;
        stop.store(true, Ordering::Relaxed);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly")
            .unwrap();

        assert!(!writer.batch_sizes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_a_writer_that_always_fails() {
        let writer = MockWriter::new(true);
        let recorder = RunRecorder::new();
        let worker = worker(writer, recorder.clone());

        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(worker.run(stop.clone()));
        sleep(Duration::from_millis(50)).await;
        stop.store(true, Ordering::Relaxed);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly")
            .unwrap();

        let summary = recorder.snapshot().await;
        let produce = summary.checks[CHECK_PRODUCE_SUCCESSFUL];
        assert_eq!(produce.passed, 0);
        assert!(produce.failed > 0);
        assert!(summary.writer_errors > 0);
        assert!(!summary.thresholds_met());
    }
}
