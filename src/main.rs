//! Surge - a staged-ramp load harness for Kafka-compatible brokers
//!
//! Drives ramping populations of producer and consumer workers against a
//! target topic, records named pass/fail checks for every iteration, and
//! turns the run's error counts into the process exit status.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

/// How often the progress logger reports while the populations run.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Replication factor used when the harness has to create the topic itself.
const REPLICATION_FACTOR: i16 = 1;

mod broker;
mod checks;
mod config;
mod consumer;
mod kafka;
mod producer;
mod ramp;
mod session;
mod utils;

use broker::{TopicReader, TopicWriter};
use checks::RunRecorder;
use config::Config;
use consumer::ConsumerWorker;
use kafka::{KafkaConnection, KafkaReader, KafkaWriter};
use producer::ProducerWorker;
use ramp::RampSchedule;
use utils::format_duration;

// ============================================================================
// Helper Functions for main() orchestration
// ============================================================================

/// Initialize tracing subscriber for structured logging
fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .init();
}

/// Log the resolved run plan before any connection is attempted
fn log_run_plan(config: &Config) {
    info!(
        "Brokers: {:?}, topic: '{}', requested partitions: {}",
        config.brokers, config.topic, config.partitions
    );
    info!(
        "Producers: {} (batch size {}, {}s pause), consumers: {} (fetch timeout {})",
        config.producers,
        config.batch_size,
        config.producer_sleep,
        config.consumers,
        format_duration(config.fetch_timeout)
    );
    info!(
        "Plateau: {}, ramp up/down: {}/{}, graceful ramp down: {}",
        format_duration(config.duration),
        format_duration(config.ramp_up),
        format_duration(config.ramp_down),
        format_duration(config.graceful_ramp_down)
    );
}

/// Build the ramp schedules for both populations
///
/// Consumers follow the same ramp/plateau/ramp curve as producers but start
/// one full producer ramp-up later, so the topic already carries traffic when
/// the first fetch goes out.
fn population_schedules(config: &Config) -> (RampSchedule, RampSchedule) {
    let producers = RampSchedule::standard(
        config.producers,
        config.ramp_up,
        config.duration,
        config.ramp_down,
        config.graceful_ramp_down,
    );
    let consumers = RampSchedule::standard(
        config.consumers,
        config.ramp_up,
        config.duration,
        config.ramp_down,
        config.graceful_ramp_down,
    )
    .with_start_offset(config.ramp_up);
    (producers, consumers)
}

/// Drive the producer population to completion on its own task
fn spawn_producers(
    config: &Config,
    schedule: RampSchedule,
    writer: Arc<dyn TopicWriter>,
    recorder: &RunRecorder,
) -> JoinHandle<()> {
    let recorder = recorder.clone();
    let gauge = recorder.live_producers.clone();
    let batch_size = config.batch_size;
    let pause = config.producer_pause();
    tokio::spawn(async move {
        ramp::run_population("producers", schedule, gauge, move |worker_id, stop| {
            let worker = ProducerWorker::new(
                writer.clone(),
                recorder.clone(),
                worker_id,
                batch_size,
                pause,
            );
            tokio::spawn(worker.run(stop))
        })
        .await;
    })
}

/// Drive the consumer population to completion on its own task
fn spawn_consumers(
    config: &Config,
    schedule: RampSchedule,
    reader: Arc<dyn TopicReader>,
    recorder: &RunRecorder,
) -> JoinHandle<()> {
    let recorder = recorder.clone();
    let gauge = recorder.live_consumers.clone();
    let batch_size = config.batch_size;
    let fetch_timeout = config.fetch_timeout;
    tokio::spawn(async move {
        ramp::run_population("consumers", schedule, gauge, move |worker_id, stop| {
            let worker = ConsumerWorker::new(
                reader.clone(),
                recorder.clone(),
                worker_id,
                batch_size,
                fetch_timeout,
            );
            tokio::spawn(worker.run(stop))
        })
        .await;
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main entry point for the surge load harness
///
/// Orchestrates the complete run:
/// 1. Parse and validate configuration
/// 2. Connect to the broker and make sure the topic exists
/// 3. Ramp producer and consumer populations along their schedules
/// 4. Log progress while the populations run
/// 5. Close the clients, print the summary, and exit by threshold verdict
#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    setup_logging();
    config.validate()?;

    info!("Starting surge - staged-ramp Kafka load harness");
    log_run_plan(&config);

    let writer_conn = KafkaConnection::connect(&config.brokers)
        .await
        .map_err(|e| anyhow!("failed to connect writer client: {}", e))?;
    let api_versions = writer_conn.api_versions.clone();

    let created = writer_conn
        .ensure_topic(&config.topic, config.partitions, REPLICATION_FACTOR)
        .await
        .map_err(|e| anyhow!("topic setup failed: {}", e))?;
    if created {
        // Metadata needs a moment to propagate; fetching too early yields
        // UNKNOWN_TOPIC_OR_PARTITION from brokers that have not caught up.
        info!("Waiting for topic '{}' to be ready...", config.topic);
        sleep(Duration::from_secs(3)).await;
    }

    let partitions = writer_conn.partition_count(&config.topic).await?;
    if partitions < 1 {
        return Err(anyhow!("topic '{}' reports no partitions", config.topic));
    }
    info!("Topic '{}' has {} partition(s)", config.topic, partitions);

    let reader_conn = KafkaConnection::connect_with_versions(&config.brokers, api_versions)
        .await
        .map_err(|e| anyhow!("failed to connect reader client: {}", e))?;

    let writer: Arc<dyn TopicWriter> = Arc::new(KafkaWriter::new(
        writer_conn,
        config.topic.clone(),
        partitions,
    ));
    let reader: Arc<dyn TopicReader> = Arc::new(KafkaReader::new(
        reader_conn,
        config.topic.clone(),
        partitions,
    ));

    let recorder = RunRecorder::new();
    let progress = tokio::spawn({
        let recorder = recorder.clone();
        async move { recorder.progress_loop(PROGRESS_INTERVAL).await }
    });

    let (producer_schedule, consumer_schedule) = population_schedules(&config);
    let producer_population = spawn_producers(&config, producer_schedule, writer.clone(), &recorder);
    let consumer_population = spawn_consumers(&config, consumer_schedule, reader.clone(), &recorder);

    let _ = producer_population.await;
    let _ = consumer_population.await;

    progress.abort();
    let _ = progress.await;

    // Teardown failures are logged but never change the run's verdict.
    if let Err(e) = writer.close().await {
        warn!("Failed to close writer: {}", e);
    }
    if let Err(e) = reader.close().await {
        warn!("Failed to close reader: {}", e);
    }

    let summary = recorder.snapshot().await;
    summary.log();

    if !summary.thresholds_met() {
        return Err(anyhow!(
            "thresholds breached: {} writer error(s), {} reader error(s)",
            summary.writer_errors,
            summary.reader_errors
        ));
    }
    info!("All thresholds met");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_config() -> Config {
        Config::try_parse_from(["surge"]).unwrap()
    }

    #[test]
    fn test_consumer_schedule_starts_one_ramp_later() {
        let config = default_config();
        let (producers, consumers) = population_schedules(&config);

        assert_eq!(
            producers.total_duration() + config.ramp_up,
            consumers.total_duration()
        );

        // Producers are climbing while consumers still wait out the offset.
        assert_eq!(producers.target_at(Duration::from_secs(5)), Some(10));
        assert_eq!(consumers.target_at(Duration::from_secs(5)), Some(0));

        // One producer ramp later both curves sit at full strength.
        assert_eq!(producers.target_at(Duration::from_secs(20)), Some(20));
        assert_eq!(consumers.target_at(Duration::from_secs(20)), Some(10));
    }

    #[test]
    fn test_schedules_track_configured_populations() {
        let config =
            Config::try_parse_from(["surge", "--producers", "8", "--consumers", "4"]).unwrap();
        let (producers, consumers) = population_schedules(&config);

        assert_eq!(producers.target_at(Duration::from_secs(15)), Some(8));
        assert_eq!(consumers.target_at(Duration::from_secs(25)), Some(4));
    }

    #[test]
    fn test_schedules_outlive_the_configured_plateau() {
        let config = default_config();
        let (producers, consumers) = population_schedules(&config);

        // 10s up + 30s plateau + 10s down.
        assert_eq!(producers.total_duration(), Duration::from_secs(50));
        assert_eq!(consumers.total_duration(), Duration::from_secs(60));
        assert_eq!(producers.target_at(Duration::from_secs(55)), None);
        assert_eq!(consumers.target_at(Duration::from_secs(55)), Some(5));
    }
}
