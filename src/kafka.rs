//! Raw Kafka protocol client
//!
//! Speaks the wire protocol directly over TCP: request framing, ApiVersions
//! negotiation, topic management, and the Produce/Fetch paths behind the
//! `TopicWriter` / `TopicReader` seam. One connection is shared per
//! population; requests serialize on the stream lock.

use std::{
    collections::HashMap,
    io::Cursor,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Result};
use bytes::{Bytes, BytesMut};
use kafka_protocol::{
    messages::{
        api_versions_request::ApiVersionsRequest,
        api_versions_response::ApiVersionsResponse,
        create_topics_request::{CreatableTopic, CreateTopicsRequest},
        create_topics_response::CreateTopicsResponse,
        fetch_request::{FetchPartition, FetchRequest, FetchTopic},
        fetch_response::FetchResponse,
        metadata_request::{MetadataRequest, MetadataRequestTopic},
        metadata_response::MetadataResponse,
        produce_request::{PartitionProduceData, ProduceRequest, TopicProduceData},
        produce_response::ProduceResponse,
        ApiKey, RequestHeader, ResponseHeader, TopicName,
    },
    protocol::{Decodable, Encodable, StrBytes},
    records::{
        Compression, Record, RecordBatchDecoder, RecordBatchEncoder, RecordEncodeOptions,
        TimestampType,
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
    time::{sleep, Instant},
};
use tracing::{debug, info, warn};

use crate::broker::{ConsumedMessage, FetchError, PublishError, TopicReader, TopicWriter};
use crate::session::SyntheticMessage;

/// Client id reported in every request header.
const CLIENT_ID: &str = "surge";

/// Sanity cap on a single response frame.
const MAX_RESPONSE_BYTES: usize = 100 * 1024 * 1024;

const CONNECT_ATTEMPTS: usize = 10;
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Broker error code reported when the topic is already there.
const TOPIC_ALREADY_EXISTS: i16 = 36;

/// Upper bound on one fetch round trip. Longer than the broker-side
/// `max_wait_ms`, so it only fires when the broker stops responding.
const FETCH_ROUND_GUARD: Duration = Duration::from_secs(5);

/// Low-level connection to a single broker.
///
/// Handles protocol encoding/decoding, request correlation, and API version
/// negotiation. Thread-safe: the stream sits behind a mutex, so concurrent
/// callers take turns on the wire.
pub struct KafkaConnection {
    stream: Mutex<TcpStream>,
    /// Monotonically increasing id matching responses to requests.
    correlation_id: AtomicU64,
    closed: AtomicBool,
    /// API key -> (min_version, max_version) as reported by the broker.
    pub api_versions: HashMap<i16, (i16, i16)>,
}

impl KafkaConnection {
    /// Connects to the first reachable address in `brokers` and discovers
    /// the broker's supported API versions.
    pub async fn connect(brokers: &[String]) -> Result<Self> {
        info!("connecting to broker(s) {:?}", brokers);
        let stream = Self::dial(brokers).await?;

        let mut conn = KafkaConnection {
            stream: Mutex::new(stream),
            correlation_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            api_versions: HashMap::new(),
        };
        conn.discover_api_versions().await?;
        Ok(conn)
    }

    /// Connects reusing API versions discovered on an earlier connection,
    /// skipping the ApiVersions handshake.
    pub async fn connect_with_versions(
        brokers: &[String],
        api_versions: HashMap<i16, (i16, i16)>,
    ) -> Result<Self> {
        debug!("connecting to broker(s) {:?} with known API versions", brokers);
        let stream = Self::dial(brokers).await?;

        Ok(KafkaConnection {
            stream: Mutex::new(stream),
            correlation_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            api_versions,
        })
    }

    /// Dials the bootstrap list, rotating through the addresses with a
    /// one-second pause between attempts.
    async fn dial(brokers: &[String]) -> Result<TcpStream> {
        if brokers.is_empty() {
            return Err(anyhow!("broker list is empty"));
        }

        for attempt in 1..=CONNECT_ATTEMPTS {
            let broker = &brokers[(attempt - 1) % brokers.len()];
            match TcpStream::connect(broker.as_str()).await {
                Ok(stream) => {
                    if attempt > 1 {
                        info!("connected to {} on attempt {}", broker, attempt);
                    }
                    return Ok(stream);
                }
                Err(e) => {
                    if attempt == CONNECT_ATTEMPTS {
                        return Err(anyhow!(
                            "failed to connect to any of {:?} after {} attempts: {}",
                            brokers,
                            CONNECT_ATTEMPTS,
                            e
                        ));
                    }
                    warn!(
                        "connection attempt {} to {} failed, retrying: {}",
                        attempt, broker, e
                    );
                    sleep(CONNECT_RETRY_INTERVAL).await;
                }
            }
        }

        unreachable!("dial loop returns on success or final failure")
    }

    /// Sends one request and returns the raw response payload.
    ///
    /// Framing is the Kafka standard: a 4-byte big-endian length prefix on
    /// both directions, encoded header followed by the encoded body.
    pub async fn send_request<T: Encodable>(
        &self,
        api_key: ApiKey,
        request: &T,
        version: i16,
    ) -> Result<Bytes> {
        let correlation_id = self.correlation_id.fetch_add(1, Ordering::SeqCst) as i32;
        debug!(
            "sending {:?} request (correlation_id: {}, version: {})",
            api_key, correlation_id, version
        );

        let mut header = RequestHeader::default();
        header.request_api_key = api_key as i16;
        header.request_api_version = version;
        header.correlation_id = correlation_id;
        header.client_id = Some(StrBytes::from_static_str(CLIENT_ID));

        let header_version = api_key.request_header_version(version);

        let mut buf = Vec::new();
        header
            .encode(&mut buf, header_version)
            .map_err(|e| anyhow!("failed to encode request header: {}", e))?;
        request
            .encode(&mut buf, version)
            .map_err(|e| anyhow!("failed to encode request body: {}", e))?;

        let mut message = Vec::with_capacity(4 + buf.len());
        message.extend_from_slice(&(buf.len() as i32).to_be_bytes());
        message.extend_from_slice(&buf);

        let mut stream = self.stream.lock().await;
        stream
            .write_all(&message)
            .await
            .map_err(|e| anyhow!("failed to write request: {}", e))?;

        let mut size_buf = [0u8; 4];
        stream.read_exact(&mut size_buf).await.map_err(|e| {
            anyhow!(
                "failed to read response size: {} (the broker may have closed the connection)",
                e
            )
        })?;

        let response_size = i32::from_be_bytes(size_buf) as usize;
        if response_size > MAX_RESPONSE_BYTES {
            return Err(anyhow!("response size too large: {} bytes", response_size));
        }

        let mut response_buf = vec![0u8; response_size];
        stream
            .read_exact(&mut response_buf)
            .await
            .map_err(|e| anyhow!("failed to read response body: {}", e))?;

        Ok(Bytes::from(response_buf))
    }

    /// Learns which APIs and version ranges the broker supports so later
    /// requests can pick compatible versions.
    async fn discover_api_versions(&mut self) -> Result<()> {
        let request = ApiVersionsRequest::default();
        let response_bytes = self.send_request(ApiKey::ApiVersions, &request, 0).await?;

        let mut cursor = Cursor::new(response_bytes.as_ref());
        ResponseHeader::decode(&mut cursor, 0)
            .map_err(|e| anyhow!("failed to decode response header: {}", e))?;
        let response = ApiVersionsResponse::decode(&mut cursor, 0)
            .map_err(|e| anyhow!("failed to decode ApiVersions response: {}", e))?;

        for api in response.api_keys {
            self.api_versions
                .insert(api.api_key, (api.min_version, api.max_version));
        }

        debug!("discovered {} supported APIs", self.api_versions.len());
        Ok(())
    }

    /// Picks a protocol version for `api_key`: the preferred one when the
    /// broker supports it, otherwise the broker's maximum.
    pub fn get_supported_version(&self, api_key: ApiKey, preferred_version: i16) -> i16 {
        if let Some((min_version, max_version)) = self.api_versions.get(&(api_key as i16)) {
            if preferred_version >= *min_version && preferred_version <= *max_version {
                preferred_version
            } else {
                debug!(
                    "preferred version {} for {:?} outside supported range {}-{}, using {}",
                    preferred_version, api_key, min_version, max_version, max_version
                );
                *max_version
            }
        } else {
            warn!(
                "API {:?} missing from version discovery, trying version {}",
                api_key, preferred_version
            );
            preferred_version
        }
    }

    /// Creates the topic if it does not exist yet.
    ///
    /// # Returns
    /// * `Ok(true)` - the broker created the topic on this call; the caller
    ///   should allow time for metadata propagation
    /// * `Ok(false)` - the topic was already there
    pub async fn ensure_topic(
        &self,
        topic: &str,
        partitions: i32,
        replication_factor: i16,
    ) -> Result<bool> {
        debug!("ensuring topic '{}' with {} partitions", topic, partitions);

        let mut creatable = CreatableTopic::default();
        creatable.name = TopicName(StrBytes::from_string(topic.to_string()));
        creatable.num_partitions = partitions;
        creatable.replication_factor = replication_factor;

        let mut request = CreateTopicsRequest::default();
        request.topics.push(creatable);
        request.timeout_ms = 30000;

        let version = self.get_supported_version(ApiKey::CreateTopics, 1);
        let response_bytes = self
            .send_request(ApiKey::CreateTopics, &request, version)
            .await
            .map_err(|e| anyhow!("failed to create topic '{}': {}", topic, e))?;

        let mut cursor = Cursor::new(response_bytes.as_ref());
        let header_version = ApiKey::CreateTopics.response_header_version(version);
        ResponseHeader::decode(&mut cursor, header_version)
            .map_err(|e| anyhow!("failed to decode response header: {}", e))?;
        let response = CreateTopicsResponse::decode(&mut cursor, version)
            .map_err(|e| anyhow!("failed to decode CreateTopics response: {}", e))?;

        parse_create_topics(&response, topic)
    }

    /// Asks the broker how many partitions `topic` actually has. The reader
    /// offset table and the writer's partition selection are sized from this
    /// rather than the requested count, which only applies on creation.
    pub async fn partition_count(&self, topic: &str) -> Result<i32> {
        let mut topic_query = MetadataRequestTopic::default();
        topic_query.name = Some(TopicName(StrBytes::from_string(topic.to_string())));

        let mut request = MetadataRequest::default();
        request.topics = Some(vec![topic_query]);
        request.allow_auto_topic_creation = false;

        let version = self.get_supported_version(ApiKey::Metadata, 4);
        let response_bytes = self
            .send_request(ApiKey::Metadata, &request, version)
            .await
            .map_err(|e| anyhow!("metadata request for topic '{}' failed: {}", topic, e))?;

        let mut cursor = Cursor::new(response_bytes.as_ref());
        let header_version = ApiKey::Metadata.response_header_version(version);
        ResponseHeader::decode(&mut cursor, header_version)
            .map_err(|e| anyhow!("failed to decode response header: {}", e))?;
        let response = MetadataResponse::decode(&mut cursor, version)
            .map_err(|e| anyhow!("failed to decode Metadata response: {}", e))?;

        for topic_meta in &response.topics {
            let name = match &topic_meta.name {
                Some(name) => name.0.as_str(),
                None => continue,
            };
            if name != topic {
                continue;
            }
            if topic_meta.error_code != 0 {
                return Err(anyhow!(
                    "metadata lookup for topic '{}' failed: {} (error code {})",
                    topic,
                    kafka_error_name(topic_meta.error_code),
                    topic_meta.error_code
                ));
            }
            return Ok(topic_meta.partitions.len() as i32);
        }

        Err(anyhow!("topic '{}' missing from metadata response", topic))
    }

    /// Shuts the TCP stream down. Calling it again is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut stream = self.stream.lock().await;
        stream
            .shutdown()
            .await
            .map_err(|e| anyhow!("failed to shut down broker connection: {}", e))
    }
}

/// Interprets the per-topic result of a CreateTopics response. "Already
/// exists" counts as success.
fn parse_create_topics(response: &CreateTopicsResponse, topic: &str) -> Result<bool> {
    for result in &response.topics {
        if result.name.0.as_str() != topic {
            continue;
        }
        return match result.error_code {
            0 => {
                info!("created topic '{}'", topic);
                Ok(true)
            }
            TOPIC_ALREADY_EXISTS => {
                info!("topic '{}' already exists", topic);
                Ok(false)
            }
            code => Err(anyhow!(
                "failed to create topic '{}': {} (error code {})",
                topic,
                kafka_error_name(code),
                code
            )),
        };
    }

    Err(anyhow!("topic '{}' missing from CreateTopics response", topic))
}

/// Human-readable name for a Kafka protocol error code.
pub fn kafka_error_name(code: i16) -> &'static str {
    match code {
        0 => "NONE",
        1 => "OFFSET_OUT_OF_RANGE",
        2 => "CORRUPT_MESSAGE",
        3 => "UNKNOWN_TOPIC_OR_PARTITION",
        5 => "LEADER_NOT_AVAILABLE",
        6 => "NOT_LEADER_OR_FOLLOWER",
        7 => "REQUEST_TIMED_OUT",
        8 => "BROKER_NOT_AVAILABLE",
        10 => "MESSAGE_TOO_LARGE",
        16 => "NETWORK_EXCEPTION",
        17 => "INVALID_TOPIC_EXCEPTION",
        29 => "TOPIC_AUTHORIZATION_FAILED",
        36 => "TOPIC_ALREADY_EXISTS",
        37 => "INVALID_PARTITIONS",
        38 => "INVALID_REPLICATION_FACTOR",
        41 => "NOT_CONTROLLER",
        42 => "INVALID_REQUEST",
        43 => "UNSUPPORTED_FOR_MESSAGE_FORMAT",
        44 => "POLICY_VIOLATION",
        45 => "OUT_OF_ORDER_SEQUENCE_NUMBER",
        _ => "UNKNOWN_ERROR",
    }
}

/// Topic writer backed by a raw broker connection. One instance is shared
/// by the whole producer population.
pub struct KafkaWriter {
    conn: KafkaConnection,
    topic: String,
    partitions: i32,
}

impl KafkaWriter {
    /// `partitions` must be at least 1.
    pub fn new(conn: KafkaConnection, topic: String, partitions: i32) -> Self {
        Self {
            conn,
            topic,
            partitions,
        }
    }
}

/// Maps one synthetic batch onto wire records. Offsets stay 0; the broker
/// assigns real offsets on append.
fn build_records(batch: &[SyntheticMessage], timestamp: i64) -> Vec<Record> {
    batch
        .iter()
        .map(|message| Record {
            transactional: false,
            control: false,
            partition_leader_epoch: 0,
            producer_id: -1,
            producer_epoch: -1,
            timestamp_type: TimestampType::Creation,
            offset: 0,
            sequence: -1,
            timestamp,
            key: Some(Bytes::from(message.key.clone())),
            value: Some(Bytes::from(message.value.clone())),
            headers: indexmap::IndexMap::new(),
        })
        .collect()
}

/// Scans a decoded produce response for per-partition errors.
fn parse_produce_response(response_bytes: &Bytes, version: i16) -> Result<(), PublishError> {
    let mut cursor = Cursor::new(response_bytes.as_ref());

    let header_version = ApiKey::Produce.response_header_version(version);
    ResponseHeader::decode(&mut cursor, header_version)
        .map_err(|e| PublishError::Transport(format!("response header decode failed: {}", e)))?;
    let response = ProduceResponse::decode(&mut cursor, version)
        .map_err(|e| PublishError::Transport(format!("response decode failed: {}", e)))?;

    for topic_response in &response.responses {
        for partition_response in &topic_response.partition_responses {
            if partition_response.error_code != 0 {
                return Err(PublishError::Rejected {
                    partition: partition_response.index,
                    reason: format!(
                        "{} (error code {})",
                        kafka_error_name(partition_response.error_code),
                        partition_response.error_code
                    ),
                });
            }
            debug!(
                "partition {} accepted batch at offset {}",
                partition_response.index, partition_response.base_offset
            );
        }
    }

    Ok(())
}

#[async_trait::async_trait]
impl TopicWriter for KafkaWriter {
    async fn publish(&self, batch: &[SyntheticMessage]) -> Result<(), PublishError> {
        if batch.is_empty() {
            return Ok(());
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as i64)
            .unwrap_or(0);
        let records = build_records(batch, timestamp);

        let options = RecordEncodeOptions {
            version: 2,
            compression: Compression::None,
        };
        let mut batch_buf = BytesMut::new();
        RecordBatchEncoder::encode(&mut batch_buf, records.iter().collect::<Vec<_>>(), &options)
            .map_err(|e| PublishError::Encode(e.to_string()))?;

        let partition = (rand::random::<u32>() % self.partitions as u32) as i32;

        let mut partition_data = PartitionProduceData::default();
        partition_data.index = partition;
        partition_data.records = Some(batch_buf.freeze());

        let mut topic_data = TopicProduceData::default();
        topic_data.name = TopicName(StrBytes::from_string(self.topic.clone()));
        topic_data.partition_data.push(partition_data);

        let mut request = ProduceRequest::default();
        request.acks = -1;
        request.timeout_ms = 30000;
        request.topic_data.push(topic_data);

        let version = self.conn.get_supported_version(ApiKey::Produce, 3);
        let response_bytes = self
            .conn
            .send_request(ApiKey::Produce, &request, version)
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        parse_produce_response(&response_bytes, version)
    }

    async fn close(&self) -> Result<()> {
        self.conn.close().await
    }
}

/// Topic reader backed by a raw broker connection.
///
/// All consumer workers share one reader, so the per-partition offset table
/// lives behind a lock and each fetch round covers every partition at once.
/// Every published message is therefore delivered to exactly one worker.
pub struct KafkaReader {
    conn: KafkaConnection,
    topic: String,
    offsets: Mutex<Vec<i64>>,
}

impl KafkaReader {
    /// Starts reading every partition from the first offset.
    pub fn new(conn: KafkaConnection, topic: String, partitions: i32) -> Self {
        Self {
            conn,
            topic,
            offsets: Mutex::new(vec![0; partitions.max(0) as usize]),
        }
    }
}

/// Builds one fetch round over every partition at its current offset.
fn build_fetch_request(topic: &str, offsets: &[i64]) -> FetchRequest {
    let mut fetch_partitions = Vec::with_capacity(offsets.len());
    for (partition, offset) in offsets.iter().enumerate() {
        let mut fetch_partition = FetchPartition::default();
        fetch_partition.partition = partition as i32;
        fetch_partition.current_leader_epoch = -1;
        fetch_partition.fetch_offset = *offset;
        fetch_partition.log_start_offset = -1;
        fetch_partition.partition_max_bytes = 1024 * 1024;
        fetch_partitions.push(fetch_partition);
    }

    let mut fetch_topic = FetchTopic::default();
    fetch_topic.topic = TopicName(StrBytes::from_string(topic.to_string()));
    fetch_topic.partitions = fetch_partitions;

    let mut request = FetchRequest::default();
    request.max_wait_ms = 1000;
    request.min_bytes = 1;
    request.max_bytes = 50 * 1024 * 1024;
    request.isolation_level = 0;
    request.session_id = 0;
    request.session_epoch = -1;
    request.rack_id = StrBytes::from_static_str("");
    request.topics.push(fetch_topic);
    request
}

/// Next offset for a partition that returned no records. Below
/// `log_start` means the data was deleted under us; between the bounds
/// means a gap. At the high watermark we are caught up and stay put.
fn idle_jump(offset: i64, log_start: i64, high_watermark: i64) -> i64 {
    if offset < log_start {
        log_start
    } else if offset < high_watermark {
        high_watermark
    } else {
        offset
    }
}

/// Applies one fetch response: appends decoded messages to `collected` and
/// advances the per-partition offset table past everything appended. A
/// partition error comes back as `Rejected` with earlier partitions'
/// records already appended and committed.
fn apply_fetch_response(
    response_bytes: &Bytes,
    version: i16,
    offsets: &mut [i64],
    collected: &mut Vec<ConsumedMessage>,
    limit: usize,
) -> Result<(), FetchError> {
    let mut cursor = Cursor::new(response_bytes.as_ref());

    let header_version = ApiKey::Fetch.response_header_version(version);
    ResponseHeader::decode(&mut cursor, header_version)
        .map_err(|e| FetchError::Decode(format!("response header: {}", e)))?;
    let response = FetchResponse::decode(&mut cursor, version)
        .map_err(|e| FetchError::Decode(format!("fetch response: {}", e)))?;

    for topic_response in &response.responses {
        for partition_response in &topic_response.partitions {
            let partition = partition_response.partition_index;
            let idx = partition as usize;
            if idx >= offsets.len() {
                debug!("fetch response names unknown partition {}", partition);
                continue;
            }

            if partition_response.error_code != 0 {
                // Nudge forward so a persistent error cannot pin the
                // partition to one offset.
                offsets[idx] += 1;
                return Err(FetchError::Rejected {
                    partition,
                    reason: format!(
                        "{} (error code {})",
                        kafka_error_name(partition_response.error_code),
                        partition_response.error_code
                    ),
                });
            }

            let records = match &partition_response.records {
                Some(records) if !records.is_empty() => records,
                _ => {
                    offsets[idx] = idle_jump(
                        offsets[idx],
                        partition_response.log_start_offset,
                        partition_response.high_watermark,
                    );
                    continue;
                }
            };

            let fetch_offset = offsets[idx];
            let mut records_cursor = Cursor::new(records.as_ref());
            while records_cursor.position() < records.len() as u64 {
                let record_set = RecordBatchDecoder::decode(&mut records_cursor)
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                for record in record_set.records {
                    // A batch comes back whole even when the requested
                    // offset points into its middle.
                    if record.offset < fetch_offset {
                        continue;
                    }
                    if collected.len() >= limit {
                        // Leave the rest where it is; the next call
                        // refetches from the cut.
                        return Ok(());
                    }
                    offsets[idx] = record.offset + 1;
                    collected.push(ConsumedMessage {
                        key: record.key,
                        value: record.value,
                    });
                }
            }
        }
    }

    Ok(())
}

/// Disposition for a round that failed mid-fetch. Offsets are already
/// committed past everything in `collected`, so a non-empty haul is
/// delivered as-is and the error is left to surface on a later call; only
/// an empty haul propagates.
fn settle_failed_round(
    error: FetchError,
    collected: &[ConsumedMessage],
) -> Result<(), FetchError> {
    if collected.is_empty() {
        return Err(error);
    }
    debug!(
        "fetch round failed with {} records in hand: {}",
        collected.len(),
        error
    );
    Ok(())
}

#[async_trait::async_trait]
impl TopicReader for KafkaReader {
    async fn fetch(
        &self,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<ConsumedMessage>, FetchError> {
        let deadline = Instant::now() + timeout;
        let mut offsets = self.offsets.lock().await;
        let mut collected = Vec::new();

        while collected.len() < limit {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let request = build_fetch_request(&self.topic, &offsets);
            let version = self.conn.get_supported_version(ApiKey::Fetch, 4);

            let round = match tokio::time::timeout(
                remaining.min(FETCH_ROUND_GUARD),
                self.conn.send_request(ApiKey::Fetch, &request, version),
            )
            .await
            {
                Ok(Ok(bytes)) => {
                    apply_fetch_response(&bytes, version, &mut offsets, &mut collected, limit)
                }
                Ok(Err(e)) => Err(FetchError::Transport(e.to_string())),
                Err(_elapsed) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    Err(FetchError::Transport(format!(
                        "fetch round timed out after {:?}",
                        FETCH_ROUND_GUARD
                    )))
                }
            };

            if let Err(error) = round {
                settle_failed_round(error, &collected)?;
                break;
            }
        }

        Ok(collected)
    }

    async fn close(&self) -> Result<()> {
        self.conn.close().await
    }
}
