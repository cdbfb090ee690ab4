/// Secret hashing and verification using Argon2id
///
/// Default work factor follows OWASP recommendations:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 64 MB
/// - Iterations: 3
/// - Parallelism: 4 lanes
/// - Salt: 16 bytes random, fresh per hash
/// - Output: 32 bytes
///
/// Both operations are CPU-bound; async callers run them on the blocking pool.
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use taskgate_core::PasswordHashingConfig;
use thiserror::Error;

/// Secret hashing and verification errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Failed to hash secret: {0}")]
    HashingFailed(String),

    #[error("Secret exceeds the {max}-byte limit")]
    SecretTooLong { max: usize },

    /// Either the digest is unreadable or the candidate does not match it
    #[error("Secret verification failed")]
    VerificationFailed,
}

/// Argon2id hasher with a fixed work factor
#[derive(Clone)]
pub struct SecretHasher {
    argon2: Argon2<'static>,
    max_secret_bytes: usize,
}

impl SecretHasher {
    /// Build a hasher, rejecting parameters Argon2 cannot use
    pub fn new(config: &PasswordHashingConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost,
            config.time_cost,
            config.parallelism,
            Some(32),
        )
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            max_secret_bytes: config.max_secret_bytes,
        })
    }

    /// Low-cost parameters so test suites stay fast
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing() -> Self {
        let config = PasswordHashingConfig {
            memory_cost: 256,
            time_cost: 1,
            parallelism: 1,
            max_secret_bytes: 72,
        };
        match Self::new(&config) {
            Ok(hasher) => hasher,
            Err(e) => panic!("test hasher parameters rejected: {e}"),
        }
    }

    /// Hash a plaintext secret
    ///
    /// Returns a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) that
    /// carries its own salt and parameters. The empty string is a valid secret.
    ///
    /// # Errors
    ///
    /// * `SecretTooLong` - the secret is longer than the configured bound
    /// * `HashingFailed` - Argon2 rejected the work factor
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        if secret.len() > self.max_secret_bytes {
            return Err(PasswordError::SecretTooLong {
                max: self.max_secret_bytes,
            });
        }

        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(digest.to_string())
    }

    /// Verify a candidate secret against a stored digest
    ///
    /// The digest's own parameters are used, so digests produced under an older
    /// work factor keep verifying. The final comparison is constant-time.
    pub fn verify(&self, digest: &str, candidate: &str) -> Result<(), PasswordError> {
        if candidate.len() > self.max_secret_bytes {
            return Err(PasswordError::VerificationFailed);
        }

        let parsed = PasswordHash::new(digest).map_err(|e| {
            tracing::warn!(error = %e, "Stored secret digest is not a valid PHC string");
            PasswordError::VerificationFailed
        })?;

        self.argon2
            .verify_password(candidate.as_bytes(), &parsed)
            .map_err(|e| {
                if !matches!(e, argon2::password_hash::Error::Password) {
                    tracing::warn!(error = %e, "Secret digest could not be evaluated");
                }
                PasswordError::VerificationFailed
            })
    }
}

impl std::fmt::Debug for SecretHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self.argon2.params();
        f.debug_struct("SecretHasher")
            .field("memory_cost", &params.m_cost())
            .field("time_cost", &params.t_cost())
            .field("parallelism", &params.p_cost())
            .field("max_secret_bytes", &self.max_secret_bytes)
            .finish()
    }
}
