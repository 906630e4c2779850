//! Consumer worker loop
//!
//! Each consumer worker simulates one concurrent user: per iteration it asks
//! the reader for up to a batch of messages within a bounded wait, validates
//! what came back, records the outcomes, and pauses. An empty fetch is an
//! observation (failing "received messages" check), not an error; only a
//! failed fetch call counts against the reader error threshold.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error};

use crate::broker::TopicReader;
use crate::checks::{
    RunRecorder, CHECK_ALL_MESSAGES_VALID, CHECK_CONSUMER_ERROR, CHECK_RECEIVED_MESSAGES,
};

/// Pause between consumer iterations, and after a failed fetch
const CONSUMER_PAUSE: Duration = Duration::from_millis(100);

/// One consumer worker instance
pub struct ConsumerWorker {
    /// Reader handle shared by the whole consumer population
    reader: Arc<dyn TopicReader>,
    recorder: RunRecorder,
    /// Identity of this worker within its population (0-based)
    worker_id: usize,
    /// Per-fetch message limit
    batch_size: usize,
    /// Upper bound on a single fetch request
    fetch_timeout: Duration,
}

impl ConsumerWorker {
    pub fn new(
        reader: Arc<dyn TopicReader>,
        recorder: RunRecorder,
        worker_id: usize,
        batch_size: usize,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            reader,
            recorder,
            worker_id,
            batch_size,
            fetch_timeout,
        }
    }

    /// Runs iterations until the stop flag is set. The flag is only checked
    /// between iterations, so an in-flight fetch always completes.
    pub async fn run(self, stop: Arc<AtomicBool>) {
        let mut iterations = 0u64;
        while !stop.load(Ordering::Relaxed) {
            self.run_iteration().await;
            iterations += 1;
            sleep(CONSUMER_PAUSE).await;
        }
        debug!(
            "consumer worker {} stopped after {} iterations",
            self.worker_id, iterations
        );
    }

    /// One iteration: one bounded fetch, two validity checks on success, one
    /// error outcome on failure
    async fn run_iteration(&self) {
        match self.reader.fetch(self.batch_size, self.fetch_timeout).await {
            Ok(messages) => {
                self.recorder
                    .messages_consumed
                    .fetch_add(messages.len() as u64, Ordering::Relaxed);
                self.recorder
                    .check(CHECK_RECEIVED_MESSAGES, !messages.is_empty())
                    .await;
                // Vacuously true on an empty fetch
                let all_valid = messages.iter().all(|m| m.is_well_formed());
                self.recorder.check(CHECK_ALL_MESSAGES_VALID, all_valid).await;
            }
            Err(e) => {
                error!("consumer worker {} fetch failed: {}", self.worker_id, e);
                self.recorder.reader_errors.fetch_add(1, Ordering::Relaxed);
                self.recorder.check(CHECK_CONSUMER_ERROR, false).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ConsumedMessage, FetchError};
    use anyhow::Result;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;
    use tokio::time::timeout;

    /// Replays scripted fetch results and records the arguments it was
    /// called with
    struct MockReader {
        script: Mutex<VecDeque<Result<Vec<ConsumedMessage>, FetchError>>>,
        calls: Mutex<Vec<(usize, Duration)>>,
    }

    impl MockReader {
        fn new(script: Vec<Result<Vec<ConsumedMessage>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl TopicReader for MockReader {
        async fn fetch(
            &self,
            limit: usize,
            timeout: Duration,
        ) -> Result<Vec<ConsumedMessage>, FetchError> {
            self.calls.lock().await.push((limit, timeout));
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn message(key: &str, value: &str) -> ConsumedMessage {
        ConsumedMessage {
            key: Some(Bytes::copy_from_slice(key.as_bytes())),
            value: Some(Bytes::copy_from_slice(value.as_bytes())),
        }
    }

    fn worker(reader: Arc<MockReader>, recorder: RunRecorder) -> ConsumerWorker {
        ConsumerWorker::new(reader, recorder, 0, 10, Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_fetch_uses_configured_limit_and_timeout() {
        let reader = MockReader::new(vec![Ok(vec![message("k", "v")])]);
        let recorder = RunRecorder::new();
        worker(reader.clone(), recorder).run_iteration().await;

        assert_eq!(
            *reader.calls.lock().await,
            vec![(10, Duration::from_secs(10))]
        );
    }

    #[tokio::test]
    async fn test_well_formed_batch_passes_both_checks() {
        let reader = MockReader::new(vec![Ok(vec![message("k1", "v1"), message("k2", "v2")])]);
        let recorder = RunRecorder::new();
        worker(reader, recorder.clone()).run_iteration().await;

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_RECEIVED_MESSAGES].passed, 1);
        assert_eq!(summary.checks[CHECK_ALL_MESSAGES_VALID].passed, 1);
        assert_eq!(summary.messages_consumed, 2);
        assert_eq!(summary.reader_errors, 0);
    }

    #[tokio::test]
    async fn test_empty_fetch_fails_received_but_is_not_an_error() {
        let reader = MockReader::new(vec![Ok(Vec::new())]);
        let recorder = RunRecorder::new();
        worker(reader, recorder.clone()).run_iteration().await;

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_RECEIVED_MESSAGES].failed, 1);
        // No messages means nothing was invalid
        assert_eq!(summary.checks[CHECK_ALL_MESSAGES_VALID].passed, 1);
        assert_eq!(summary.reader_errors, 0);
        assert!(summary.thresholds_met());
    }

    #[tokio::test]
    async fn test_message_without_value_fails_validity_check() {
        let malformed = ConsumedMessage {
            key: Some(Bytes::from_static(b"k")),
            value: None,
        };
        let reader = MockReader::new(vec![Ok(vec![message("k", "v"), malformed])]);
        let recorder = RunRecorder::new();
        worker(reader, recorder.clone()).run_iteration().await;

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_RECEIVED_MESSAGES].passed, 1);
        assert_eq!(summary.checks[CHECK_ALL_MESSAGES_VALID].failed, 1);
        // Malformed payloads are check failures, not reader errors
        assert_eq!(summary.reader_errors, 0);
    }

    #[tokio::test]
    async fn test_fetch_error_is_recorded_and_survived() {
        let reader = MockReader::new(vec![
            Err(FetchError::Transport("broker gone".to_string())),
            Ok(vec![message("k", "v")]),
        ]);
        let recorder = RunRecorder::new();
        let worker = worker(reader, recorder.clone());

        worker.run_iteration().await;
        worker.run_iteration().await;

        let summary = recorder.snapshot().await;
        assert_eq!(summary.checks[CHECK_CONSUMER_ERROR].failed, 1);
        assert_eq!(summary.checks[CHECK_RECEIVED_MESSAGES].passed, 1);
        assert_eq!(summary.reader_errors, 1);
        assert!(!summary.thresholds_met());
    }

    #[tokio::test]
    async fn test_worker_exits_when_stop_flag_is_set() {
        let reader = MockReader::new(Vec::new());
        let recorder = RunRecorder::new();
        let worker = worker(reader.clone(), recorder);

        let stop = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(worker.run(stop.clone()));

        sleep(Duration::from_millis(250)).await;
        stop.store(true, Ordering::Relaxed);
        timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly")
            .unwrap();

        assert!(!reader.calls.lock().await.is_empty());
    }
}
