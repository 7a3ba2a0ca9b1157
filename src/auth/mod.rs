//! Device authentication subsystem.
//!
//! # Data Flow
//! ```text
//! IdentityRecord (from identity::normalize)
//!     → policy.rs (AuthManager::verify against the snapshot's AuthPolicy)
//!         1. auth disabled        → accept
//!         2. device allow-listed  → accept, no credential check
//!         3. no "Bearer " prefix  → reject: missing or invalid authorization
//!         4. token.rs HMAC check  → accept, or reject: invalid token
//! ```
//!
//! # Design Decisions
//! - Rejection is a value, not an error; errors mean a broken policy
//! - Tokens bind client id and device id into the signed payload
//! - Signature comparison is constant time

pub mod policy;
pub mod token;

pub use policy::{AuthManager, AuthManagerError, AuthOutcome, AuthPolicy, AuthRejection, BEARER_PREFIX};
pub use token::TokenSigner;
