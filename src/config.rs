//! Command-line and environment configuration
//!
//! Every tunable doubles as a flag and an environment variable, so the tool
//! drops into scripted pipelines without wrapper shims. The configuration is
//! resolved once at startup and never mutated during the run.

use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;

use crate::utils::parse_duration;

/// Command-line arguments for configuring a load run
#[derive(Debug, Parser)]
#[command(name = "surge")]
#[command(about = "Staged-ramp load harness for Kafka-compatible brokers")]
pub struct Config {
    /// Comma-separated Kafka broker addresses
    #[arg(
        long,
        env = "KAFKA_BROKERS",
        default_value = "localhost:9092",
        value_delimiter = ','
    )]
    pub brokers: Vec<String>,

    /// Topic exercised by both worker populations
    #[arg(long, env = "KAFKA_TOPIC", default_value = "sessions")]
    pub topic: String,

    /// Producer population target
    #[arg(long, env = "PRODUCER_VUS", default_value = "20")]
    pub producers: usize,

    /// Consumer population target
    #[arg(long, env = "CONSUMER_VUS", default_value = "10")]
    pub consumers: usize,

    /// Steady-state duration at full population (e.g. "30s", "2m")
    #[arg(long, env = "DURATION", default_value = "30s", value_parser = parse_duration)]
    pub duration: Duration,

    /// Messages per publish batch, and the per-fetch message limit
    #[arg(long, env = "BATCH_SIZE", default_value = "10")]
    pub batch_size: usize,

    /// Producer pause between iterations, in seconds
    #[arg(long, env = "PRODUCER_SLEEP", default_value = "0.1")]
    pub producer_sleep: f64,

    /// Upper bound on a single fetch request
    #[arg(long, env = "FETCH_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub fetch_timeout: Duration,

    /// Ramp-up window from zero to the population target
    #[arg(long, env = "RAMP_UP", default_value = "10s", value_parser = parse_duration)]
    pub ramp_up: Duration,

    /// Ramp-down window from the population target back to zero
    #[arg(long, env = "RAMP_DOWN", default_value = "10s", value_parser = parse_duration)]
    pub ramp_down: Duration,

    /// Grace window for a retiring worker to finish its current iteration
    #[arg(long, env = "GRACEFUL_RAMP_DOWN", default_value = "10s", value_parser = parse_duration)]
    pub graceful_ramp_down: Duration,

    /// Partition count used when the topic has to be created
    #[arg(long, default_value = "3")]
    pub partitions: i32,
}

impl Config {
    /// Rejects tunables that would make the run meaningless. Configuration
    /// problems are the only fatal error class; everything after startup is
    /// recorded, never raised.
    pub fn validate(&self) -> Result<()> {
        if self.brokers.is_empty() || self.brokers.iter().any(|b| b.trim().is_empty()) {
            return Err(anyhow!("At least one non-empty broker address is required"));
        }
        if self.topic.trim().is_empty() {
            return Err(anyhow!("Topic name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        if !self.producer_sleep.is_finite() || self.producer_sleep < 0.0 {
            return Err(anyhow!(
                "Producer sleep must be a non-negative number of seconds"
            ));
        }
        if self.duration.is_zero() {
            return Err(anyhow!("Duration must be greater than zero"));
        }
        if self.partitions < 1 {
            return Err(anyhow!("Partition count must be at least 1"));
        }
        if self.producers == 0 && self.consumers == 0 {
            return Err(anyhow!(
                "At least one producer or consumer worker is required"
            ));
        }
        Ok(())
    }

    /// Producer inter-iteration pause as a Duration. Callers must have
    /// validated the configuration first.
    pub fn producer_pause(&self) -> Duration {
        Duration::from_secs_f64(self.producer_sleep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults_match_the_documented_surface() {
        let config = parse(&["surge"]);
        assert_eq!(config.brokers, vec!["localhost:9092"]);
        assert_eq!(config.topic, "sessions");
        assert_eq!(config.producers, 20);
        assert_eq!(config.consumers, 10);
        assert_eq!(config.duration, Duration::from_secs(30));
        assert_eq!(config.batch_size, 10);
        assert!((config.producer_sleep - 0.1).abs() < 1e-9);
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.ramp_up, Duration::from_secs(10));
        assert_eq!(config.ramp_down, Duration::from_secs(10));
        assert_eq!(config.graceful_ramp_down, Duration::from_secs(10));
        assert_eq!(config.partitions, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_broker_list_splits_on_commas() {
        let config = parse(&["surge", "--brokers", "kafka-1:9092,kafka-2:9092"]);
        assert_eq!(config.brokers, vec!["kafka-1:9092", "kafka-2:9092"]);
    }

    #[test]
    fn test_duration_flags_accept_unit_strings() {
        let config = parse(&["surge", "--duration", "2m", "--fetch-timeout", "500ms"]);
        assert_eq!(config.duration, Duration::from_secs(120));
        assert_eq!(config.fetch_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_population_overrides() {
        let config = parse(&["surge", "--producers", "5", "--consumers", "0"]);
        assert_eq!(config.producers, 5);
        assert_eq!(config.consumers, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_producer_pause_conversion() {
        let config = parse(&["surge", "--producer-sleep", "0.25"]);
        assert_eq!(config.producer_pause(), Duration::from_millis(250));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = parse(&["surge", "--batch-size", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_producer_sleep() {
        let config = parse(&["surge", "--producer-sleep=-1"]);
        assert!(config.validate().is_err());
        let config = parse(&["surge", "--producer-sleep", "NaN"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let config = parse(&["surge", "--duration", "0s"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_populations() {
        let config = parse(&["surge", "--producers", "0", "--consumers", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_partitions() {
        let config = parse(&["surge", "--partitions", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_duration_fails_at_parse_time() {
        assert!(Config::try_parse_from(["surge", "--duration", "soon"]).is_err());
        assert!(Config::try_parse_from(["surge", "--duration", "100000000000000000000"]).is_err());
    }
}
