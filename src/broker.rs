//! Broker client seam between the worker loops and the wire client
//!
//! Workers only see these traits. The concrete Kafka implementation lives in
//! `kafka`; tests substitute in-memory fakes.

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use thiserror::Error;

use crate::session::SyntheticMessage;

/// Failure of a single publish attempt. Every variant is recovered inside
/// the worker loop; none of them ends the run.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("partition {partition} rejected batch: {reason}")]
    Rejected { partition: i32, reason: String },
    #[error("record batch encoding failed: {0}")]
    Encode(String),
}

/// Failure of a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("partition {partition} rejected fetch: {reason}")]
    Rejected { partition: i32, reason: String },
    #[error("record batch decode failed: {0}")]
    Decode(String),
}

/// A message as handed back by the broker; either field may be absent
#[derive(Debug, Clone, Default)]
pub struct ConsumedMessage {
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

impl ConsumedMessage {
    /// True when the message carries both a non-empty key and a non-empty value
    pub fn is_well_formed(&self) -> bool {
        let has_key = self.key.as_ref().is_some_and(|k| !k.is_empty());
        let has_value = self.value.as_ref().is_some_and(|v| !v.is_empty());
        has_key && has_value
    }
}

/// Publish capability shared by the whole producer population
#[async_trait::async_trait]
pub trait TopicWriter: Send + Sync {
    /// Publishes one batch to the configured topic.
    async fn publish(&self, batch: &[SyntheticMessage]) -> Result<(), PublishError>;

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Fetch capability shared by the whole consumer population
#[async_trait::async_trait]
pub trait TopicReader: Send + Sync {
    /// Fetches up to `limit` messages, waiting at most `timeout`. An empty
    /// result is a normal outcome, not an error. Messages gathered before a
    /// mid-fetch failure are returned rather than dropped; the error
    /// surfaces on a later call.
    async fn fetch(
        &self,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<ConsumedMessage>, FetchError>;

    /// Releases the underlying connection. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: Option<&str>, value: Option<&str>) -> ConsumedMessage {
        ConsumedMessage {
            key: key.map(|k| Bytes::copy_from_slice(k.as_bytes())),
            value: value.map(|v| Bytes::copy_from_slice(v.as_bytes())),
        }
    }

    #[test]
    fn test_well_formed_requires_key_and_value() {
        assert!(message(Some("k"), Some("v")).is_well_formed());
        assert!(!message(None, Some("v")).is_well_formed());
        assert!(!message(Some("k"), None).is_well_formed());
        assert!(!message(None, None).is_well_formed());
    }

    #[test]
    fn test_empty_fields_are_not_well_formed() {
        assert!(!message(Some(""), Some("v")).is_well_formed());
        assert!(!message(Some("k"), Some("")).is_well_formed());
    }

    #[test]
    fn test_error_display() {
        let err = PublishError::Rejected {
            partition: 2,
            reason: "NOT_LEADER_OR_FOLLOWER".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "partition 2 rejected batch: NOT_LEADER_OR_FOLLOWER"
        );

        let err = FetchError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "transport failure: connection reset");
    }
}
