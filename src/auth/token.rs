//! Time-bound HMAC bearer tokens.
//!
//! Token format: `<signature>.<issued_at>` where `issued_at` is unix seconds
//! and `signature` is the unpadded URL-safe base64 of
//! `HMAC-SHA256(secret, payload)` with
//! `payload = "<len(client_id)>:<client_id>|<len(device_id)>:<device_id>|<issued_at>"`.
//! Lengths are in bytes, so no choice of ids can shift a field boundary.
//! A missing client id signs as the empty string.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime used when no expiry is configured: 30 days.
pub const DEFAULT_EXPIRE_SECONDS: u64 = 60 * 60 * 24 * 30;

/// Issues and checks tokens for one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    expire_seconds: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("expire_seconds", &self.expire_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Zero or unset expiry falls back to [`DEFAULT_EXPIRE_SECONDS`].
    pub fn new(secret: impl Into<Vec<u8>>, expire_seconds: Option<u64>) -> Self {
        Self {
            secret: secret.into(),
            expire_seconds: expire_seconds
                .filter(|s| *s > 0)
                .unwrap_or(DEFAULT_EXPIRE_SECONDS),
        }
    }

    pub fn expire_seconds(&self) -> u64 {
        self.expire_seconds
    }

    /// Mint a token for a device/client pair, issued now.
    pub fn issue(&self, client_id: Option<&str>, device_id: &str) -> String {
        self.issue_at(client_id, device_id, unix_now())
    }

    pub fn issue_at(&self, client_id: Option<&str>, device_id: &str, issued_at: u64) -> String {
        let signature = self.sign(client_id, device_id, issued_at);
        format!("{signature}.{issued_at}")
    }

    /// Check a token (without its `Bearer ` prefix) for this device/client pair.
    pub fn verify(&self, token: &str, client_id: Option<&str>, device_id: &str) -> bool {
        self.verify_at(token, client_id, device_id, unix_now())
    }

    pub fn verify_at(&self, token: &str, client_id: Option<&str>, device_id: &str, now: u64) -> bool {
        let Some((signature, issued_at)) = token.split_once('.') else {
            return false;
        };
        let Ok(issued_at) = issued_at.parse::<u64>() else {
            return false;
        };
        if now.saturating_sub(issued_at) > self.expire_seconds {
            return false;
        }

        let expected = self.sign(client_id, device_id, issued_at);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    fn sign(&self, client_id: Option<&str>, device_id: &str, issued_at: u64) -> String {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC takes any key size");
        mac.update(signing_payload(client_id.unwrap_or_default(), device_id, issued_at).as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }
}

fn signing_payload(client_id: &str, device_id: &str, issued_at: u64) -> String {
    format!(
        "{}:{}|{}:{}|{}",
        client_id.len(),
        client_id,
        device_id.len(),
        device_id,
        issued_at
    )
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
