//! Identity onboarding
//!
//! Business logic for registration, login and role promotion. Every store
//! call is bounded by a timeout, and Argon2 work runs on the blocking pool so
//! it never stalls the async workers.

use super::jwt::{TokenError, TokenIssuer};
use super::models::{Identity, Role};
use super::password::{PasswordError, SecretHasher};
use super::repository::{bounded, StoreError, UserStore};
use crate::audit::{audit_log, AuditEvent};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use taskgate_core::Clock;
use thiserror::Error;
use uuid::Uuid;

/// Onboarding errors
const DECOY_SECRET: &str = "taskgate-decoy-secret";

#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Username is already taken")]
    UsernameTaken,

    /// Returned for both unknown usernames and wrong secrets
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity is already privileged")]
    AlreadyPrivileged,

    #[error("Identity not found")]
    NotFound,

    #[error("Secret exceeds the {max}-byte limit")]
    SecretTooLong { max: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Secret hashing failed: {0}")]
    Hashing(String),

    #[error("Token issuance failed: {0}")]
    Token(#[from] TokenError),
}

impl From<PasswordError> for OnboardingError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::SecretTooLong { max } => OnboardingError::SecretTooLong { max },
            PasswordError::VerificationFailed => OnboardingError::InvalidCredentials,
            PasswordError::HashingFailed(msg) => OnboardingError::Hashing(msg),
        }
    }
}

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub token: String,
}

/// Register, login and promote identities
pub struct IdentityOnboarding {
    store: Arc<dyn UserStore>,
    hasher: SecretHasher,
    issuer: Arc<TokenIssuer>,
    clock: Arc<dyn Clock>,
    store_timeout: Duration,
    // Verified against when the username is unknown, so both login failures cost the same
    decoy_digest: OnceLock<String>,
}

impl IdentityOnboarding {
    pub fn new(
        store: Arc<dyn UserStore>,
        hasher: SecretHasher,
        issuer: Arc<TokenIssuer>,
        clock: Arc<dyn Clock>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            hasher,
            issuer,
            clock,
            store_timeout,
            decoy_digest: OnceLock::new(),
        }
    }

    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Register a new identity
    ///
    /// The very first identity in an empty store becomes privileged; all later
    /// ones start as standard.
    ///
    /// # Errors
    ///
    /// * `UsernameTaken` - the username exists (nothing is inserted)
    /// * `SecretTooLong` - the secret exceeds the hasher's bound
    /// * `Store` - the store failed or timed out
    pub async fn register(&self, username: &str, secret: &str) -> Result<Identity, OnboardingError> {
        if self.bounded(self.store.find_by_username(username)).await?.is_some() {
            audit_log(&AuditEvent::RegistrationFailure {
                username: username.to_string(),
                reason: "username already exists".to_string(),
            });
            return Err(OnboardingError::UsernameTaken);
        }

        let digest = self.hash_secret(secret).await?;

        // The store grants the bootstrap role when it is still empty
        let identity = Identity::new(
            username.to_string(),
            digest,
            Role::Standard,
            self.clock.now(),
        );
        let identity = match self.bounded(self.store.enroll(identity)).await {
            Ok(identity) => identity,
            // Lost a race with a concurrent registration of the same name
            Err(OnboardingError::Store(StoreError::Duplicate)) => {
                audit_log(&AuditEvent::RegistrationFailure {
                    username: username.to_string(),
                    reason: "username already exists".to_string(),
                });
                return Err(OnboardingError::UsernameTaken);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(user_id = %identity.id, role = %identity.role, "Identity registered");
        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: identity.id,
            username: identity.username.clone(),
            role: identity.role.to_string(),
        });

        Ok(identity)
    }

    /// Check credentials and issue a token
    ///
    /// # Errors
    ///
    /// * `InvalidCredentials` - unknown username or wrong secret, indistinguishably
    /// * `Store` - the store failed or timed out
    /// * `Token` - signing failed
    pub async fn login(&self, username: &str, secret: &str) -> Result<LoginOutcome, OnboardingError> {
        let Some(identity) = self.bounded(self.store.find_by_username(username)).await? else {
            let decoy = self.decoy_digest().await?;
            // Result is irrelevant; only the time spent matters
            let _ = self.verify_secret(decoy, secret.to_string()).await;
            return Err(self.login_failed(username));
        };

        if self
            .verify_secret(identity.secret_digest.clone(), secret.to_string())
            .await
            .is_err()
        {
            return Err(self.login_failed(username));
        }

        let token = self.issuer.issue(&identity)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: identity.id,
            username: identity.username.clone(),
        });

        Ok(LoginOutcome { identity, token })
    }

    /// Elevate an identity to privileged
    ///
    /// Returns the identity as updated locally; it is not read back.
    ///
    /// # Errors
    ///
    /// * `NotFound` - no identity with this username
    /// * `AlreadyPrivileged` - nothing to do
    /// * `Store` - the store failed or timed out
    pub async fn promote(&self, username: &str) -> Result<Identity, OnboardingError> {
        let mut identity = self
            .bounded(self.store.find_by_username(username))
            .await?
            .ok_or(OnboardingError::NotFound)?;

        if identity.is_privileged() {
            return Err(OnboardingError::AlreadyPrivileged);
        }

        identity.role = Role::Privileged;
        identity.updated_at = self.clock.now();

        match self
            .bounded(
                self.store
                    .update_role(identity.id, identity.role, identity.updated_at),
            )
            .await
        {
            Ok(()) => Ok(identity),
            Err(OnboardingError::Store(StoreError::NotFound)) => Err(OnboardingError::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Look up an identity by id
    pub async fn get_identity(&self, id: Uuid) -> Result<Identity, OnboardingError> {
        self.bounded(self.store.find_by_id(id))
            .await?
            .ok_or(OnboardingError::NotFound)
    }

    /// All identities, oldest first
    pub async fn list_identities(&self) -> Result<Vec<Identity>, OnboardingError> {
        self.bounded(self.store.list()).await
    }

    /// Number of identities, used by the readiness check
    pub async fn identity_count(&self) -> Result<u64, OnboardingError> {
        self.bounded(self.store.count()).await
    }

    fn login_failed(&self, username: &str) -> OnboardingError {
        audit_log(&AuditEvent::LoginFailure {
            username: username.to_string(),
            reason: "invalid credentials".to_string(),
        });
        OnboardingError::InvalidCredentials
    }

    /// Run a store call under the configured timeout
    async fn bounded<T, F>(&self, call: F) -> Result<T, OnboardingError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(bounded(self.store_timeout, call).await?)
    }

    async fn hash_secret(&self, secret: &str) -> Result<String, OnboardingError> {
        let hasher = self.hasher.clone();
        let secret = secret.to_string();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| OnboardingError::Hashing(e.to_string()))??;
        Ok(digest)
    }

    async fn verify_secret(&self, digest: String, candidate: String) -> Result<(), OnboardingError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&digest, &candidate))
            .await
            .map_err(|e| OnboardingError::Hashing(e.to_string()))??;
        Ok(())
    }

    async fn decoy_digest(&self) -> Result<String, OnboardingError> {
        if let Some(digest) = self.decoy_digest.get() {
            return Ok(digest.clone());
        }

        let digest = self.hash_secret(DECOY_SECRET).await?;
        Ok(self.decoy_digest.get_or_init(|| digest).clone())
    }
}

impl std::fmt::Debug for IdentityOnboarding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityOnboarding")
            .field("hasher", &self.hasher)
            .field("issuer", &self.issuer)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
