//! Synthetic streaming-session payload generation
//!
//! Every produced message value carries a small JSON session record: the CDN
//! the viewer currently streams from, the last observed video profile, and a
//! pseudo-JWT describing the session. Field values are drawn uniformly from
//! fixed categorical sets, so payloads look domain-shaped without any state
//! shared between calls.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// CDN providers a session can be pinned to
pub const CDN_PROVIDERS: [&str; 4] = ["Akamai", "Cloudflare", "Fastly", "CloudFront"];

/// Video profile bitrates (kbps) a player reports
pub const VIDEO_PROFILES: [u32; 5] = [720, 1200, 2800, 4500, 6000];

/// Playback platforms carried in token claims
pub const PLATFORMS: [&str; 6] = ["web", "ios", "android", "tvos", "roku", "firetv"];

/// Content channels carried in token claims
pub const CHANNELS: [&str; 8] = [
    "news", "sports", "movies", "series", "kids", "music", "docs", "live",
];

/// Viewer autonomous system numbers carried in token claims
pub const ASNS: [u32; 8] = [7922, 701, 7018, 20115, 22773, 3320, 5089, 6830];

/// Fixed token header: base64url of `{"alg":"HS256","typ":"JWT"}`
const TOKEN_HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

/// Fixed placeholder signature. The harness exercises the broker pipeline,
/// not token validity, so no real signing key exists anywhere in the run.
const TOKEN_SIGNATURE: &str = "c3ludGhldGljLXNpZ25hdHVyZQ";

/// Length of the random suffix appended to session identifiers
const SESSION_SUFFIX_LEN: usize = 8;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The unit exchanged with the broker: base64 key and value text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticMessage {
    pub key: String,
    pub value: String,
}

/// Structured content encoded into every message value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "currentCDN")]
    pub current_cdn: String,
    #[serde(rename = "lastObservedVideoProfile")]
    pub last_observed_video_profile: u32,
    #[serde(rename = "jwtToken")]
    pub jwt_token: String,
}

/// Claims encoded into the token's payload segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub platform: String,
    pub channel: String,
    pub asn: u32,
}

/// Generates one synthetic message for the given worker, iteration, and
/// batch position
///
/// The key identifies the producing worker and iteration; the value is a
/// fresh session record. Calls are independent: all randomness comes from
/// the caller-provided RNG and nothing is shared between messages.
pub fn generate(
    rng: &mut impl Rng,
    worker_id: usize,
    iteration: u64,
    seq: usize,
) -> SyntheticMessage {
    let unix_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    generate_at(rng, worker_id, iteration, seq, unix_millis)
}

/// Generation with an explicit timestamp, so tests can pin the session id
fn generate_at(
    rng: &mut impl Rng,
    worker_id: usize,
    iteration: u64,
    seq: usize,
    unix_millis: u64,
) -> SyntheticMessage {
    let claims = TokenClaims {
        session_id: session_id(rng, unix_millis),
        platform: (*PLATFORMS.choose(rng).unwrap()).to_string(),
        channel: (*CHANNELS.choose(rng).unwrap()).to_string(),
        asn: *ASNS.choose(rng).unwrap(),
    };

    let record = SessionRecord {
        current_cdn: (*CDN_PROVIDERS.choose(rng).unwrap()).to_string(),
        last_observed_video_profile: *VIDEO_PROFILES.choose(rng).unwrap(),
        jwt_token: pseudo_token(&claims),
    };

    // generation must never panic inside a worker iteration
    let body = serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string());

    SyntheticMessage {
        key: STANDARD.encode(format!("key-{}-{}-{}", worker_id, iteration, seq)),
        value: STANDARD.encode(body),
    }
}

/// Builds the three-segment pseudo-token: fixed header, claims payload,
/// fixed placeholder signature
fn pseudo_token(claims: &TokenClaims) -> String {
    let payload = serde_json::to_string(claims).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{}.{}.{}",
        TOKEN_HEADER,
        URL_SAFE_NO_PAD.encode(payload),
        TOKEN_SIGNATURE
    )
}

/// Builds a practically unique session id with no cross-worker coordination:
/// wall-clock milliseconds in base-36 plus a random base-36 suffix
fn session_id(rng: &mut impl Rng, unix_millis: u64) -> String {
    let mut id = to_base36(unix_millis);
    id.reserve(SESSION_SUFFIX_LEN);
    for _ in 0..SESSION_SUFFIX_LEN {
        let digit = BASE36_DIGITS[rng.gen_range(0..BASE36_DIGITS.len())];
        id.push(digit as char);
    }
    id
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}
