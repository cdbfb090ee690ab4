//! Token issuance and verification
//!
//! Tokens are compact JWS strings signed with HMAC-SHA256 under a single
//! service-wide secret. The secret is handed to [`TokenIssuer::new`] once at
//! startup; rotating it invalidates every token issued before.
//!
//! Expiry is evaluated against an injected [`Clock`] rather than the system
//! time so that lifetimes can be tested deterministically.

use super::models::{Identity, Role};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Duration;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use taskgate_core::{AuthConfig, Clock};
use thiserror::Error;
use uuid::Uuid;

/// The only algorithm this service signs with or accepts
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Bound on the client-supplied algorithm name carried by errors
const MAX_REPORTED_ALGORITHM_CHARS: usize = 16;

/// Claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - identity ID
    pub sub: String,
    /// Login name at issuance time
    pub username: String,
    /// Role at issuance time
    pub role: Role,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expiration (Unix seconds), always greater than `iat`
    pub exp: i64,
}

/// Token issuance and verification errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token signature is invalid")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed")]
    Malformed,

    #[error("Token algorithm {0} is not accepted")]
    DisallowedAlgorithm(String),

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

#[derive(Deserialize)]
struct AlgorithmHeader {
    alg: String,
}

/// Mints and verifies HS256 tokens
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    /// Create an issuer for `secret`
    ///
    /// `lifetime` is clamped to at least one second so `exp > iat` always holds.
    pub fn new(secret: impl AsRef<[u8]>, lifetime: Duration, clock: Arc<dyn Clock>) -> Self {
        let secret = secret.as_ref();

        let mut validation = Validation::new(SIGNING_ALGORITHM);
        // Expiry is checked against the injected clock after decoding
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: lifetime.max(Duration::seconds(1)),
            clock,
        }
    }

    /// Create an issuer from application configuration
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let lifetime_secs = i64::try_from(config.token_lifetime_secs).unwrap_or(i64::MAX);
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::seconds(lifetime_secs.min(i64::MAX / 1000)),
            clock,
        )
    }

    /// Token lifetime
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for a registered identity
    pub fn issue(&self, identity: &Identity) -> Result<String, TokenError> {
        self.issue_for(identity.id, &identity.username, identity.role)
    }

    /// Issue a token for explicit claims values
    ///
    /// # Errors
    ///
    /// * `Signing` - the signing backend failed; never caused by caller input
    pub fn issue_for(&self, subject: Uuid, username: &str, role: Role) -> Result<String, TokenError> {
        let iat = self.clock.now().timestamp();
        let claims = Claims {
            sub: subject.to_string(),
            username: username.to_string(),
            role,
            iat,
            exp: iat.saturating_add(self.lifetime.num_seconds()),
        };

        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify a token and return its claims unchanged
    ///
    /// Checks run in this order:
    /// 1. structure and header algorithm (before any signature work)
    /// 2. HMAC signature under the configured secret
    /// 3. claim shape (`exp > iat`, known role)
    /// 4. expiry against the clock (`now >= exp` is expired)
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        check_algorithm(token)?;

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => {
                    TokenError::DisallowedAlgorithm("unsupported".to_string())
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.exp <= claims.iat {
            return Err(TokenError::Malformed);
        }
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("lifetime_secs", &self.lifetime.num_seconds())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Reject anything that is not a three-segment HS256 token
fn check_algorithm(token: &str) -> Result<(), TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(_payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let raw = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|_| TokenError::Malformed)?;
    let header: AlgorithmHeader = serde_json::from_slice(&raw).map_err(|_| TokenError::Malformed)?;

    if header.alg != "HS256" {
        return Err(TokenError::DisallowedAlgorithm(reported_algorithm(&header.alg)));
    }

    Ok(())
}

/// Client-supplied `alg` as it may appear in errors and audit logs
fn reported_algorithm(alg: &str) -> String {
    alg.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_REPORTED_ALGORITHM_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use taskgate_core::ManualClock;

    fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn issuer_with(secret: &str, clock: Arc<ManualClock>) -> TokenIssuer {
        TokenIssuer::new(secret, Duration::hours(24), clock)
    }

    fn alice() -> Identity {
        Identity::new(
            "alice".to_string(),
            "digest".to_string(),
            Role::Privileged,
            Utc::now(),
        )
    }

    fn b64(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).unwrap())
    }

    #[test]
    fn test_issue_and_verify_token() {
        let clock = manual_clock();
        let issuer = issuer_with("secret", clock.clone());
        let identity = alice();

        let token = issuer.issue(&identity).expect("Failed to issue token");
        assert_eq!(token.split('.').count(), 3);

        let claims = issuer.verify(&token).expect("Failed to verify token");
        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.role, Role::Privileged);
        assert_eq!(claims.iat, clock.now().timestamp());
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_payload_wire_shape() {
        let issuer = issuer_with("secret", manual_clock());
        let token = issuer.issue(&alice()).unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["role"], "privileged");
        assert!(json["sub"].is_string());
        assert!(json["iat"].is_i64());
        assert!(json["exp"].is_i64());
    }

    #[test]
    fn test_expired_token() {
        let clock = manual_clock();
        let issuer = issuer_with("secret", clock.clone());
        let token = issuer.issue(&alice()).unwrap();

        clock.advance(Duration::hours(24) - Duration::seconds(1));
        assert!(issuer.verify(&token).is_ok());

        // now == exp is already expired
        clock.advance(Duration::seconds(1));
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));

        clock.advance(Duration::days(30));
        assert_eq!(issuer.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret() {
        let clock = manual_clock();
        let token = issuer_with("secret1", clock.clone())
            .issue(&alice())
            .unwrap();

        let result = issuer_with("secret2", clock).verify(&token);
        assert_eq!(result, Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_tampered_payload() {
        let issuer = issuer_with("secret", manual_clock());
        let token = issuer.issue(&alice()).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut payload: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        payload["role"] = serde_json::json!("privileged");
        payload["username"] = serde_json::json!("mallory");
        let forged = format!("{}.{}.{}", parts[0], b64(&payload), parts[2]);

        assert_eq!(issuer.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_alg_none_rejected() {
        let clock = manual_clock();
        let issuer = issuer_with("secret", clock.clone());
        let now = clock.now().timestamp();

        let header = b64(&serde_json::json!({ "alg": "none", "typ": "JWT" }));
        let payload = b64(&serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "username": "mallory",
            "role": "privileged",
            "iat": now,
            "exp": now + 3600,
        }));

        for token in [format!("{header}.{payload}."), format!("{header}.{payload}.c2ln")] {
            assert_eq!(
                issuer.verify(&token),
                Err(TokenError::DisallowedAlgorithm("none".to_string()))
            );
        }
    }

    #[test]
    fn test_asymmetric_and_other_algorithms_rejected() {
        let issuer = issuer_with("secret", manual_clock());
        let payload = b64(&serde_json::json!({ "sub": "x" }));

        for alg in ["RS256", "ES256", "EdDSA", "HS512"] {
            let header = b64(&serde_json::json!({ "alg": alg, "typ": "JWT" }));
            let token = format!("{header}.{payload}.c2ln");
            assert_eq!(
                issuer.verify(&token),
                Err(TokenError::DisallowedAlgorithm(alg.to_string()))
            );
        }
    }

    #[test]
    fn test_rejected_algorithm_name_is_bounded() {
        let issuer = issuer_with("secret", manual_clock());
        let payload = b64(&serde_json::json!({ "sub": "x" }));
        let alg = format!("RS256\n{}", "A".repeat(10_000));
        let header = b64(&serde_json::json!({ "alg": alg, "typ": "JWT" }));

        match issuer.verify(&format!("{header}.{payload}.c2ln")) {
            Err(TokenError::DisallowedAlgorithm(reported)) => {
                assert_eq!(reported.len(), MAX_REPORTED_ALGORITHM_CHARS);
                assert!(reported.starts_with("RS256A"));
            }
            other => panic!("expected DisallowedAlgorithm, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_tokens() {
        let issuer = issuer_with("secret", manual_clock());

        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.sig", "invalid.token.here"] {
            assert_eq!(issuer.verify(token), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn test_claims_must_be_complete() {
        let clock = manual_clock();
        let issuer = issuer_with("secret", clock.clone());
        let now = clock.now().timestamp();

        // Correctly signed, but carries an unknown role
        let claims = serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "username": "eve",
            "role": "admin",
            "iat": now,
            "exp": now + 60,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Malformed));

        // exp must be after iat
        let claims = serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "username": "eve",
            "role": "standard",
            "iat": now + 120,
            "exp": now + 60,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Malformed));
    }

    #[test]
    fn test_lifetime_from_config() {
        let config = AuthConfig {
            jwt_secret: "secret".to_string(),
            token_lifetime_secs: 600,
            ..Default::default()
        };
        let issuer = TokenIssuer::from_config(&config, manual_clock());
        assert_eq!(issuer.lifetime(), Duration::seconds(600));

        let token = issuer.issue(&alice()).unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_zero_lifetime_is_clamped() {
        let issuer = TokenIssuer::new("secret", Duration::zero(), manual_clock());
        assert_eq!(issuer.lifetime(), Duration::seconds(1));
    }
}
