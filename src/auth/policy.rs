//! Device authentication policy and its evaluation.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::auth::token::TokenSigner;
use crate::config::schema::AuthConfig;
use crate::identity::IdentityRecord;

/// Scheme prefix expected on the credential.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Authentication settings in effect for one snapshot.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    pub enabled: bool,
    pub allowed_devices: HashSet<String>,
    signer: TokenSigner,
    secret_len: usize,
}

impl AuthPolicy {
    pub fn new(
        enabled: bool,
        allowed_devices: impl IntoIterator<Item = String>,
        secret: impl Into<Vec<u8>>,
        expire_seconds: Option<u64>,
    ) -> Self {
        let secret = secret.into();
        Self {
            enabled,
            allowed_devices: allowed_devices.into_iter().collect(),
            secret_len: secret.len(),
            signer: TokenSigner::new(secret, expire_seconds),
        }
    }

    /// Policy that admits every identity.
    pub fn disabled() -> Self {
        Self::new(false, Vec::<String>::new(), Vec::<u8>::new(), None)
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.enabled,
            config.allowed_devices.iter().cloned(),
            config.auth_key.as_bytes(),
            config.expire_seconds,
        )
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }
}

/// Why a connection was accepted or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    /// Authentication is turned off.
    Disabled,
    /// Device is on the allow-list; no credential was checked.
    AllowListed,
    /// Bearer token verified.
    TokenVerified,
    Rejected(AuthRejection),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthOutcome::Rejected(_))
    }

    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthOutcome::Disabled => "auth_disabled",
            AuthOutcome::AllowListed => "allow_listed",
            AuthOutcome::TokenVerified => "token_verified",
            AuthOutcome::Rejected(AuthRejection::MissingAuthorization) => "missing_authorization",
            AuthOutcome::Rejected(AuthRejection::InvalidToken) => "invalid_token",
        }
    }
}

/// A recoverable refusal; the client gets a failure message and is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRejection {
    #[error("missing or invalid authorization")]
    MissingAuthorization,

    #[error("invalid token")]
    InvalidToken,
}

/// The policy itself is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthManagerError {
    #[error("auth is enabled but no signing secret is configured")]
    EmptySecret,
}

/// Stateless evaluator of [`AuthPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthManager;

impl AuthManager {
    /// Decide whether `identity` may connect under `policy`.
    ///
    /// Refusals are `Ok(AuthOutcome::Rejected(_))`; `Err` means the policy
    /// itself is broken.
    pub fn verify(
        &self,
        identity: &IdentityRecord,
        policy: &AuthPolicy,
    ) -> Result<AuthOutcome, AuthManagerError> {
        if !policy.enabled {
            return Ok(AuthOutcome::Disabled);
        }

        // Allow-listed hardware skips the credential check entirely.
        if !policy.allowed_devices.is_empty() && policy.allowed_devices.contains(identity.device_id()) {
            return Ok(AuthOutcome::AllowListed);
        }

        let Some(token) = identity
            .credential()
            .and_then(|c| c.strip_prefix(BEARER_PREFIX))
        else {
            return Ok(AuthOutcome::Rejected(AuthRejection::MissingAuthorization));
        };

        if policy.secret_len == 0 {
            return Err(AuthManagerError::EmptySecret);
        }

        if policy
            .signer
            .verify(token, identity.client_id(), identity.device_id())
        {
            Ok(AuthOutcome::TokenVerified)
        } else {
            Ok(AuthOutcome::Rejected(AuthRejection::InvalidToken))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(device: &str, client: Option<&str>, credential: Option<&str>) -> IdentityRecord {
        IdentityRecord::new(
            device,
            client.map(str::to_owned),
            credential.map(str::to_owned),
        )
        .unwrap()
    }

    fn policy(allowed: &[&str]) -> AuthPolicy {
        AuthPolicy::new(
            true,
            allowed.iter().map(|d| d.to_string()),
            "secret",
            None,
        )
    }

    #[test]
    fn disabled_policy_accepts_anything() {
        let outcome = AuthManager
            .verify(&identity("dev-1", None, Some("garbage")), &AuthPolicy::disabled())
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Disabled);
        assert!(outcome.is_authenticated());
    }

    #[test]
    fn allow_listed_device_skips_credential_check() {
        let policy = policy(&["dev-1"]);
        for credential in [None, Some("Basic abc"), Some("Bearer not-a-token")] {
            let outcome = AuthManager
                .verify(&identity("dev-1", None, credential), &policy)
                .unwrap();
            assert_eq!(outcome, AuthOutcome::AllowListed);
        }
    }

    #[test]
    fn missing_or_wrong_scheme_is_distinct_from_invalid_token() {
        let policy = policy(&[]);
        for credential in [None, Some("Basic abc"), Some("bearer abc"), Some("Bearerabc")] {
            let outcome = AuthManager
                .verify(&identity("dev-2", None, credential), &policy)
                .unwrap();
            assert_eq!(
                outcome,
                AuthOutcome::Rejected(AuthRejection::MissingAuthorization),
                "{credential:?}"
            );
        }

        let outcome = AuthManager
            .verify(&identity("dev-2", None, Some("Bearer xyz")), &policy)
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected(AuthRejection::InvalidToken));
    }

    #[test]
    fn valid_token_is_accepted() {
        let policy = policy(&["someone-else"]);
        let token = policy.signer().issue(Some("client-b"), "dev-a");
        let outcome = AuthManager
            .verify(
                &identity("dev-a", Some("client-b"), Some(&format!("Bearer {token}"))),
                &policy,
            )
            .unwrap();
        assert_eq!(outcome, AuthOutcome::TokenVerified);
    }

    #[test]
    fn token_replayed_for_other_client_is_rejected() {
        let policy = policy(&[]);
        let token = policy.signer().issue(Some("client-b"), "dev-a");
        let outcome = AuthManager
            .verify(
                &identity("dev-a", Some("client-c"), Some(&format!("Bearer {token}"))),
                &policy,
            )
            .unwrap();
        assert_eq!(outcome, AuthOutcome::Rejected(AuthRejection::InvalidToken));
    }

    #[test]
    fn empty_secret_is_an_internal_error() {
        let policy = AuthPolicy::new(true, Vec::<String>::new(), Vec::<u8>::new(), None);
        let err = AuthManager
            .verify(&identity("dev-1", None, Some("Bearer x.1")), &policy)
            .unwrap_err();
        assert_eq!(err, AuthManagerError::EmptySecret);
    }

    #[test]
    fn policy_from_config() {
        let config = AuthConfig {
            enabled: true,
            allowed_devices: vec!["dev-1".into()],
            auth_key: "k".into(),
            expire_seconds: Some(3600),
        };
        let policy = AuthPolicy::from_config(&config);
        assert!(policy.enabled);
        assert!(policy.allowed_devices.contains("dev-1"));
        assert_eq!(policy.signer().expire_seconds(), 3600);
    }
}
