//! Security audit logging for authentication events
//!
//! Provides structured audit logging for registrations, logins, role
//! promotions, and access control failures.
//!
//! All audit events are logged at INFO level with the "audit" target,
//! making them easy to filter and route to security monitoring systems.
//! Secrets and tokens are never part of an event.
//!
//! # Example
//!
//! ```ignore
//! use taskgate_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: identity.id,
//!     username: identity.username.clone(),
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess { user_id: Uuid, username: String },

    /// Failed login attempt (unknown username or wrong secret)
    LoginFailure { username: String, reason: String },

    /// Successful registration
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: String,
    },

    /// Failed registration attempt
    RegistrationFailure { username: String, reason: String },

    /// Identity elevated to privileged
    RolePromoted {
        user_id: Uuid,
        username: String,
        promoted_by: Uuid,
    },

    /// Authenticated identity lacks the required role
    AccessDenied {
        user_id: Uuid,
        username: String,
        role: String,
        required_roles: Vec<String>,
        path: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, malformed, forged or expired credential
    InvalidToken {
        reason: String,
        path: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON for log aggregators. Example output:
///
/// ```json
/// {
///   "event_type": "login_success",
///   "user_id": "550e8400-e29b-41d4-a716-446655440000",
///   "username": "alice"
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess { user_id, username } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure { username, reason } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                "Login failed"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            username,
            role,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                role = %role,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure { username, reason } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                "Registration failed"
            );
        }
        AuditEvent::RolePromoted {
            user_id,
            username,
            promoted_by,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                promoted_by = %promoted_by,
                "Role promoted"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            username,
            path,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                path = %path,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            reason,
            path,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                path = %path,
                ip_address = ?ip_address,
                "Invalid credential"
            );
        }
    }
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    // Check X-Forwarded-For (proxy/load balancer)
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // Take the first IP in the chain (client IP)
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    // Check X-Real-IP (nginx proxy)
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
