//! Authentication and authorization module
//!
//! This module provides token-based access control with the following components:
//! - Secret hashing with Argon2id
//! - HS256 token issuance and verification
//! - Middleware that authenticates requests and enforces roles
//! - Identity onboarding (register, login, promote)
//! - Identity models and storage

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{Claims, TokenError, TokenIssuer};
pub use middleware::{
    authenticate, authorize, bearer_token, require_authenticated, require_role, AccessGate,
    AuthError, IdentityContext,
};
pub use models::{Identity, IdentityPublic, LoginRequest, PromoteRequest, RegisterRequest, Role};
pub use password::{PasswordError, SecretHasher};
pub use repository::{InMemoryUserStore, PgUserStore, StoreError, UserStore};
pub use service::{IdentityOnboarding, LoginOutcome, OnboardingError};
