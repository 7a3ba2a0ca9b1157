//! Resilience helpers for calls leaving the gateway.
//!
//! The manager API fetch retries with [`backoff::calculate_backoff`] up to
//! `manager_api.max_attempts`; rejections and empty responses are final.

pub mod backoff;
