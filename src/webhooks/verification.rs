use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Bytes;
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretSlice, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Result, SyncError};

type HmacSha256 = Hmac<Sha256>;

/// Prefix the provider puts in front of the base64 signing key.
pub const SECRET_PREFIX: &str = "whsec_";

/// Replay window applied to the signed timestamp, in both directions.
pub const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Only signatures of this version are checked.
const SIGNATURE_VERSION: &str = "v1";

// Provider headers first, then the Standard Webhooks names.
const ID_HEADERS: [&str; 2] = ["svix-id", "webhook-id"];
const TIMESTAMP_HEADERS: [&str; 2] = ["svix-timestamp", "webhook-timestamp"];
const SIGNATURE_HEADERS: [&str; 2] = ["svix-signature", "webhook-signature"];

/// Why a signed request was rejected.
///
/// All variants surface to the sender as the same 400; the detail is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The timestamp header is not a decimal Unix time.
    InvalidTimestamp { value: String },
    /// The timestamp is older than the tolerance allows (replay protection).
    TimestampTooOld { age_seconds: i64 },
    /// The timestamp is further in the future than the tolerance allows.
    TimestampTooNew { skew_seconds: i64 },
    /// The signature header holds no decodable `v1` entry.
    MalformedSignatureHeader,
    /// No `v1` entry matched the expected signature.
    NoMatchingSignature,
    /// The signed body is not JSON.
    InvalidPayload { message: String },
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimestamp { value } => {
                write!(f, "Invalid webhook timestamp '{}'", value)
            }
            Self::TimestampTooOld { age_seconds } => {
                write!(f, "Webhook timestamp too old ({} seconds)", age_seconds)
            }
            Self::TimestampTooNew { skew_seconds } => {
                write!(f, "Webhook timestamp too new ({} seconds ahead)", skew_seconds)
            }
            Self::MalformedSignatureHeader => {
                write!(f, "Malformed webhook signature header")
            }
            Self::NoMatchingSignature => {
                write!(f, "No matching webhook signature found")
            }
            Self::InvalidPayload { message } => {
                write!(f, "Webhook payload is not valid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for VerificationFailure {}

/// The transport-level parts of one inbound delivery.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    /// Delivery id, stable across redeliveries of the same message.
    pub id: String,
    pub timestamp: String,
    pub signature: String,
    pub raw_body: Bytes,
}

impl WebhookEnvelope {
    pub fn new(
        id: impl Into<String>,
        timestamp: impl Into<String>,
        signature: impl Into<String>,
        raw_body: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp: timestamp.into(),
            signature: signature.into(),
            raw_body: raw_body.into(),
        }
    }

    /// Build an envelope from request headers and the raw body.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MissingHeaders`] if any of the id, timestamp or
    /// signature headers is absent or empty.
    pub fn from_parts(headers: &HeaderMap, raw_body: Bytes) -> Result<Self> {
        let id = header_value(headers, &ID_HEADERS);
        let timestamp = header_value(headers, &TIMESTAMP_HEADERS);
        let signature = header_value(headers, &SIGNATURE_HEADERS);

        match (id, timestamp, signature) {
            (Some(id), Some(timestamp), Some(signature)) => Ok(Self {
                id,
                timestamp,
                signature,
                raw_body,
            }),
            _ => Err(SyncError::MissingHeaders),
        }
    }
}

fn header_value(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    })
}

/// Current Unix time in seconds.
pub fn current_unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Verifies provider-signed webhooks.
///
/// The provider signs `"{id}.{timestamp}.{body}"` with HMAC-SHA256 and sends
/// one or more base64 signatures as `v1,<sig>` entries separated by spaces.
/// The signing key is held as a secret and never appears in debug output.
///
/// # Example
///
/// ```rust,ignore
/// use identity_sync::webhooks::{WebhookEnvelope, WebhookVerifier};
///
/// let verifier = WebhookVerifier::new(&"whsec_c2VjcmV0".into())?;
/// let envelope = WebhookEnvelope::from_parts(&headers, body)?;
/// let payload = verifier.verify(&envelope)?;
/// ```
#[derive(Debug)]
pub struct WebhookVerifier {
    key: SecretSlice<u8>,
    tolerance: Duration,
}

impl WebhookVerifier {
    /// Create a verifier from a `whsec_`-style secret.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the secret is not valid base64 or
    /// decodes to an empty key.
    pub fn new(secret: &SecretString) -> Result<Self> {
        let raw = secret.expose_secret().trim();
        let encoded = raw.strip_prefix(SECRET_PREFIX).unwrap_or(raw);

        let key = STANDARD
            .decode(encoded)
            .map_err(|_| SyncError::config("webhook secret is not valid base64"))?;
        if key.is_empty() {
            return Err(SyncError::config("webhook secret decodes to an empty key"));
        }

        Ok(Self {
            key: key.into(),
            tolerance: Duration::from_secs(DEFAULT_TOLERANCE_SECS),
        })
    }

    /// Set the accepted clock difference between sender and receiver.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// Verify an envelope against the current time and return the JSON body.
    pub fn verify(&self, envelope: &WebhookEnvelope) -> Result<serde_json::Value> {
        self.verify_at(envelope, current_unix_timestamp())
    }

    /// Verify an envelope as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidSignature`] when the timestamp is outside the
    /// tolerance, no `v1` signature matches, or the body is not JSON.
    pub fn verify_at(&self, envelope: &WebhookEnvelope, now: i64) -> Result<serde_json::Value> {
        let timestamp = self.check_timestamp(&envelope.timestamp, now)?;
        let expected = self.compute_signature(&envelope.id, timestamp, &envelope.raw_body)?;

        match signature_matches(&expected, &envelope.signature) {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(delivery_id = %envelope.id, "Webhook signature mismatch");
                return Err(VerificationFailure::NoMatchingSignature.into());
            }
            Err(failure) => return Err(failure.into()),
        }

        serde_json::from_slice(&envelope.raw_body).map_err(|e| {
            VerificationFailure::InvalidPayload {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Produce a `v1,<sig>` header value for the given delivery.
    ///
    /// Used by tests and local tooling that replay deliveries.
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<String> {
        let signature = self.compute_signature(id, timestamp, body)?;
        Ok(format!("{},{}", SIGNATURE_VERSION, STANDARD.encode(signature)))
    }

    fn check_timestamp(&self, value: &str, now: i64) -> std::result::Result<i64, VerificationFailure> {
        let timestamp: i64 = value
            .parse()
            .map_err(|_| VerificationFailure::InvalidTimestamp {
                value: value.to_string(),
            })?;

        // The header is unauthenticated, so any i64 is possible here.
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        let age = now.saturating_sub(timestamp);
        if age > tolerance {
            return Err(VerificationFailure::TimestampTooOld { age_seconds: age });
        }
        let skew = timestamp.saturating_sub(now);
        if skew > tolerance {
            return Err(VerificationFailure::TimestampTooNew { skew_seconds: skew });
        }

        Ok(timestamp)
    }

    fn compute_signature(&self, id: &str, timestamp: i64, body: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .map_err(|_| SyncError::internal("HMAC key rejected"))?;
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Check every `v1` entry of a signature header against the expected MAC.
fn signature_matches(expected: &[u8], header: &str) -> std::result::Result<bool, VerificationFailure> {
    let mut candidates = 0;

    for entry in header.split_whitespace() {
        let Some((version, encoded)) = entry.split_once(',') else {
            continue;
        };
        if version != SIGNATURE_VERSION {
            continue;
        }
        let Ok(provided) = STANDARD.decode(encoded) else {
            continue;
        };

        candidates += 1;
        if constant_time_compare(expected, &provided) {
            return Ok(true);
        }
    }

    if candidates == 0 {
        Err(VerificationFailure::MalformedSignatureHeader)
    } else {
        Ok(false)
    }
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}
