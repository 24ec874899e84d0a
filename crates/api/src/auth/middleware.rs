//! Bearer-token authentication and role gating for protected routes

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use quillhub_shared::{AccountId, Role};
use serde::Serialize;

use super::error::AuthError;
use super::jwt::TokenCodec;
use crate::error::ApiError;

/// State needed by [`require_auth`]
#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenCodec,
}

/// Who is making the request, as proven by a verified token
///
/// Inserted into request extensions by [`require_auth`] alongside the full
/// [`super::jwt::Claims`]; handlers read it with `Extension<RoleAssertion>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleAssertion {
    pub account_id: AccountId,
    pub role: Role,
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedToken)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::MalformedToken)?;
    if scheme != "Bearer" || token.is_empty() || token.contains(' ') {
        return Err(AuthError::MalformedToken);
    }

    Ok(token)
}

/// Reject the request unless it carries a valid session token
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = match bearer_token(request.headers()).and_then(|token| {
        state.tokens.verify(token).map_err(AuthError::from)
    }) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::warn!(
                reason = %e,
                path = %request.uri().path(),
                "auth: request rejected"
            );
            return Err(e.into());
        }
    };

    let assertion = RoleAssertion {
        account_id: claims.sub,
        role: claims.role,
    };
    tracing::debug!(account_id = %assertion.account_id, role = %assertion.role, "auth: token accepted");

    request.extensions_mut().insert(assertion);
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Route guard admitting only the listed roles
#[derive(Debug, Clone, Copy)]
pub struct RoleGate {
    allowed: &'static [Role],
}

impl RoleGate {
    pub const ADMIN_ONLY: RoleGate = RoleGate::new(&[Role::Admin]);

    pub const fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }

    /// Decide on an assertion; a missing assertion is refused like a wrong role
    pub fn check(&self, assertion: Option<&RoleAssertion>) -> Result<(), AuthError> {
        let assertion = assertion.ok_or(AuthError::Forbidden)?;
        if self.allowed.contains(&assertion.role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

/// Middleware form of [`RoleGate::check`]; must sit inside [`require_auth`]
pub async fn require_role(
    State(gate): State<RoleGate>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(e) = gate.check(request.extensions().get::<RoleAssertion>()) {
        tracing::warn!(
            reason = %e,
            path = %request.uri().path(),
            "auth: role gate rejected request"
        );
        return Err(e.into());
    }

    Ok(next.run(request).await)
}
