//! Webhook signature verification.
//!
//! The provider signs each delivery with HMAC-SHA256 over
//! `"{timestamp}.{raw body}"` and sends the result in a header of the form
//! `t=1700000000,v1=5257a869...,v0=...`. Several `v1` entries may be
//! present while a secret is being rolled; any match is accepted.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::domain::WebhookEvent;
use crate::error::SyncError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Verifies signed deliveries against the shared webhook secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
    tolerance_secs: u64,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("configured", &self.is_configured())
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

impl SignatureVerifier {
    /// Creates a verifier. An empty secret counts as not configured.
    #[must_use]
    pub fn new(secret: Option<String>, tolerance_secs: u64) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance_secs,
        }
    }

    /// Returns `true` if a secret is available.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies `body` against `header` at the current time and decodes
    /// the event.
    ///
    /// # Errors
    ///
    /// Fails closed with a verification error (see [`Self::verify_at`]).
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<WebhookEvent, SyncError> {
        self.verify_at(body, header, Utc::now().timestamp())
    }

    /// Verifies `body` against `header` as of `now` (epoch seconds).
    ///
    /// # Errors
    ///
    /// - [`SyncError::SecretNotConfigured`] when no secret is set.
    /// - [`SyncError::MissingSignature`] when the header is absent or blank.
    /// - [`SyncError::InvalidSignature`] when the header is malformed or no
    ///   `v1` entry matches.
    /// - [`SyncError::TimestampOutsideTolerance`] when the signature is
    ///   too old or too far in the future.
    /// - [`SyncError::MalformedEvent`] when the verified body is not an
    ///   event envelope.
    pub fn verify_at(
        &self,
        body: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<WebhookEvent, SyncError> {
        let secret = self.secret.as_deref().ok_or(SyncError::SecretNotConfigured)?;
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SyncError::MissingSignature)?;

        let parsed = ParsedHeader::parse(header)?;

        if self.tolerance_secs > 0 && now.abs_diff(parsed.timestamp) > self.tolerance_secs {
            return Err(SyncError::TimestampOutsideTolerance {
                timestamp: parsed.timestamp,
                tolerance_secs: self.tolerance_secs,
            });
        }

        let mac = signed_mac(secret, parsed.timestamp, body)?;
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(SyncError::InvalidSignature(
                "no v1 signature matched the payload".to_string(),
            ));
        }

        WebhookEvent::from_slice(body)
    }
}

/// Builds a valid signature header for `body`.
///
/// Used by tests and local replay tooling.
///
/// # Errors
///
/// Returns [`SyncError::Internal`] if the HMAC cannot be keyed.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SyncError> {
    let mac = signed_mac(secret, timestamp, body)?;
    let digest = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={digest}"))
}

fn signed_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SyncError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| SyncError::Internal(format!("hmac key: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// The `t=` and `v1=` elements of a signature header.
#[derive(Debug)]
struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SyncError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        SyncError::InvalidSignature(format!("bad timestamp `{value}`"))
                    })?);
                }
                "v1" => signatures.push(value.to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| SyncError::InvalidSignature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(SyncError::InvalidSignature(
                "missing v1 signature".to_string(),
            ));
        }
        Ok(Self {
            timestamp,
            signatures,
        })
    }
}
