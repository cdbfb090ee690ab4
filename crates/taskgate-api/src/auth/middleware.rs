/// Request gating middleware
///
/// Three interceptors, applied in this order on protected routes:
/// 1. [`authenticate`]: verify the bearer token and attach an [`IdentityContext`]
/// 2. [`require_authenticated`]: refuse requests without a context
/// 3. [`require_role`]: refuse contexts whose role is not allowed
///
/// Each stage either forwards the request or short-circuits with an
/// [`AuthError`], which renders as 401 or 403.
use super::jwt::{Claims, TokenError, TokenIssuer};
use super::models::Role;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Identity attached to an authenticated request
///
/// Added to request extensions by [`authenticate`]; extract it in handlers
/// with `Extension<IdentityContext>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl IdentityContext {
    pub fn has_role(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }
}

impl TryFrom<Claims> for IdentityContext {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        Ok(Self {
            user_id,
            username: claims.username,
            role: claims.role,
        })
    }
}

/// Gate failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingCredential,

    #[error("Authorization header must be of the form 'Bearer <token>'")]
    MalformedCredential,

    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] TokenError),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Forbidden,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden => "FORBIDDEN",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AuthError::InvalidCredential(reason) => {
                ApiError::new(self.error_code(), "Invalid or expired token")
                    .with_details(reason.to_string())
            }
            other => ApiError::new(other.error_code(), other.to_string()),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The header must consist of exactly the scheme `Bearer`, one space, and a
/// non-empty token. Nothing about the token itself is inspected here.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredential)?
        .to_str()
        .map_err(|_| AuthError::MalformedCredential)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}

/// Check an optional context against a role allow-list
pub fn authorize<'a>(
    context: Option<&'a IdentityContext>,
    allowed: &[Role],
) -> Result<&'a IdentityContext, AuthError> {
    let context = context.ok_or(AuthError::Unauthenticated)?;
    if !context.has_role(allowed) {
        return Err(AuthError::Forbidden);
    }
    Ok(context)
}

/// Shared state for [`authenticate`]
#[derive(Clone, Debug)]
pub struct AccessGate {
    issuer: Arc<TokenIssuer>,
}

impl AccessGate {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self { issuer }
    }

    /// Resolve request headers to an identity context
    pub fn identify(&self, headers: &HeaderMap) -> Result<IdentityContext, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.issuer.verify(token)?;
        Ok(IdentityContext::try_from(claims)?)
    }
}

/// Authentication middleware
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use taskgate_api::auth::middleware::{authenticate, require_authenticated};
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn(require_authenticated))
///     .route_layer(middleware::from_fn_with_state(gate, authenticate));
/// ```
pub async fn authenticate(
    State(gate): State<AccessGate>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let context = match gate.identify(request.headers()) {
        Ok(context) => context,
        Err(err) => {
            if !matches!(err, AuthError::MissingCredential) {
                audit_log(&AuditEvent::InvalidToken {
                    reason: err.to_string(),
                    path: request.uri().path().to_string(),
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                });
            }
            return Err(err);
        }
    };

    tracing::debug!(user_id = %context.user_id, role = %context.role, "Request authenticated");
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Refuse requests that carry no identity context
pub async fn require_authenticated(request: Request<Body>, next: Next) -> Result<Response, AuthError> {
    if request.extensions().get::<IdentityContext>().is_none() {
        return Err(AuthError::Unauthenticated);
    }

    Ok(next.run(request).await)
}

/// Type alias for role middleware future
type RoleMiddlewareFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>>;

/// Middleware factory for role-based access control
///
/// # Example
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use taskgate_api::auth::{middleware::require_role, Role};
///
/// let app = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn(require_role(&[Role::Privileged])))
///     .route_layer(middleware::from_fn(require_authenticated))
///     .route_layer(middleware::from_fn_with_state(gate, authenticate));
/// ```
pub fn require_role(
    allowed: &'static [Role],
) -> impl Fn(Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            {
                let context = request.extensions().get::<IdentityContext>();

                if let Err(err) = authorize(context, allowed) {
                    if let (AuthError::Forbidden, Some(context)) = (&err, context) {
                        audit_log(&AuditEvent::AccessDenied {
                            user_id: context.user_id,
                            username: context.username.clone(),
                            role: context.role.to_string(),
                            required_roles: allowed.iter().map(|r| r.to_string()).collect(),
                            path: request.uri().path().to_string(),
                            ip_address: extract_ip_address(request.headers()),
                            user_agent: extract_user_agent(request.headers()),
                        });
                    }
                    return Err(err);
                }
            }

            Ok(next.run(request).await)
        })
    }
}
