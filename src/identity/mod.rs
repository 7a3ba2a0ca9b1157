//! Handshake identity normalization.
//!
//! # Responsibilities
//! - Read `device-id`, `client-id` and `authorization` from request headers
//! - Fall back to same-named query parameters for anything headers lack
//! - Produce one immutable `IdentityRecord`, or refuse when no device id exists
//!
//! # Design Decisions
//! - Header values win over query values for the same field
//! - Empty or non-UTF-8 values count as absent
//! - The record travels next to the transport; nothing is attached to it

use axum::http::{HeaderMap, Uri};
use serde::Serialize;
use thiserror::Error;

pub const DEVICE_ID: &str = "device-id";
pub const CLIENT_ID: &str = "client-id";
pub const AUTHORIZATION: &str = "authorization";

/// Who is connecting, as resolved at handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityRecord {
    device_id: String,
    client_id: Option<String>,
    #[serde(skip)]
    credential: Option<String>,
}

impl IdentityRecord {
    /// Build a record; fails when `device_id` is empty.
    pub fn new(
        device_id: impl Into<String>,
        client_id: Option<String>,
        credential: Option<String>,
    ) -> Result<Self, IdentityError> {
        let device_id = device_id.into();
        if device_id.is_empty() {
            return Err(IdentityError::MissingDeviceId);
        }
        Ok(Self {
            device_id,
            client_id: client_id.filter(|v| !v.is_empty()),
            credential: credential.filter(|v| !v.is_empty()),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Raw authorization value, including its scheme.
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("no device id in request headers or query string")]
    MissingDeviceId,
}

/// Resolve the connecting identity from headers and the request target.
pub fn normalize(headers: &HeaderMap, target: &Uri) -> Result<IdentityRecord, IdentityError> {
    let query = target.query().unwrap_or_default();
    let lookup = |name: &str| header_value(headers, name).or_else(|| query_value(query, name));

    let device_id = lookup(DEVICE_ID).ok_or(IdentityError::MissingDeviceId)?;
    IdentityRecord::new(device_id, lookup(CLIENT_ID), lookup(AUTHORIZATION))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn query_value(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}
