use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{
    error::ApiError,
    token::{ADMIN_ROLE, TokenService},
};

/// AuthUser
///
/// The verified identity behind a bearer token. Resolving it is the whole of
/// the access gate: the request either carries a valid token or it is rejected
/// with 401 before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub email: String,
    /// Present only for elevated accounts.
    pub role: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}

/// AdminUser
///
/// An `AuthUser` whose token carries `role = "admin"`. A valid token without
/// that role is rejected with 403, distinct from the 401 for a bad token.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Pulls the token out of `Authorization: Bearer <token>`.
///
/// The scheme prefix must match exactly, and the token after it must be
/// non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized("unauthorized"))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized("unauthorized"))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Already resolved by the gate middleware for this request.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers).inspect_err(|_| {
            tracing::warn!(op = "auth.gate", "missing or malformed bearer token");
        })?;

        let claims = TokenService::from_ref(state)
            .verify_token(token)
            .map_err(|e| {
                tracing::warn!(op = "auth.gate", error = %e, "token rejected");
                ApiError::Unauthorized("unauthorized")
            })?;

        let user = AuthUser {
            email: claims.email,
            role: claims.role,
        };
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(op = "auth.admin_gate", email = %user.email, "admin role required");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}

/// auth_middleware
///
/// Layered over the authenticated router. Extracting `AuthUser` performs the
/// bearer check; on failure the extractor's rejection is the response and
/// `next` is never called.
pub async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// admin_middleware
///
/// Stricter variant for the admin router: bearer check plus the admin role.
pub async fn admin_middleware(_admin: AdminUser, request: Request, next: Next) -> Response {
    next.run(request).await
}
