//! Identity models for authentication and authorization
//!
//! This module defines the core data structures for the auth system:
//! - Role: the closed set of access levels
//! - Identity: a registered account, including its secret digest
//! - IdentityPublic: the outward projection of an identity
//! - Request bodies for register, login and promote

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Identity role
///
/// Defines the access level of an identity:
/// - Standard: regular account, may act on its own behalf
/// - Privileged: may list identities and promote others
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Standard,
    Privileged,
}

impl Role {
    /// Convert role to its wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Privileged => "privileged",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Role::Standard),
            "privileged" => Ok(Role::Privileged),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role name that is neither `standard` nor `privileged`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

/// Registered identity
///
/// Holds the secret digest, so it deliberately has no `Serialize` impl.
/// Use [`Identity::to_public`] for anything that leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque unique identifier
    pub id: Uuid,

    /// Unique, immutable login name
    pub username: String,

    /// Argon2id PHC string
    pub secret_digest: String,

    pub role: Role,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity stamped with `now`
    pub fn new(username: String, secret_digest: String, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            secret_digest,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role == Role::Privileged
    }

    /// Convert identity to public representation (without the digest)
    pub fn to_public(&self) -> IdentityPublic {
        IdentityPublic {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("secret_digest", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Public identity representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct IdentityPublic {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "username must be 3-64 characters"))]
    pub username: String,

    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Role promotion request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PromoteRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(
            serde_json::to_string(&Role::Privileged).unwrap(),
            "\"privileged\""
        );
        assert_eq!(
            serde_json::from_str::<Role>("\"standard\"").unwrap(),
            Role::Standard
        );
        assert!(serde_json::from_str::<Role>("\"admin\"").is_err());
    }

    #[test]
    fn test_role_parse_is_case_sensitive() {
        assert_eq!("privileged".parse::<Role>().unwrap(), Role::Privileged);
        assert!("Privileged".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_public_projection_has_no_digest() {
        let identity = Identity::new(
            "alice".to_string(),
            "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
            Role::Privileged,
            Utc::now(),
        );

        let json = serde_json::to_value(identity.to_public()).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["role"], "privileged");
        assert!(json.get("secret_digest").is_none());
        assert!(!json.to_string().contains("argon2id"));
    }

    #[test]
    fn test_debug_redacts_digest() {
        let identity = Identity::new(
            "bob".to_string(),
            "$argon2id$secret-material".to_string(),
            Role::Standard,
            Utc::now(),
        );
        let rendered = format!("{identity:?}");
        assert!(rendered.contains("bob"));
        assert!(!rendered.contains("secret-material"));
    }

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            username: "alice".to_string(),
            password: "pw123456".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short_password = RegisterRequest {
            username: "alice".to_string(),
            password: "pw1".to_string(),
        };
        assert!(short_password.validate().is_err());

        let short_username = RegisterRequest {
            username: "al".to_string(),
            password: "pw123456".to_string(),
        };
        assert!(short_username.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_role_display_parses_back(privileged in any::<bool>()) {
            let role = if privileged { Role::Privileged } else { Role::Standard };
            prop_assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }

        #[test]
        fn prop_unknown_roles_rejected(name in "[a-z]{1,12}") {
            prop_assume!(name != "standard" && name != "privileged");
            prop_assert!(name.parse::<Role>().is_err());
        }
    }
}
