//! Authentication routes

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use quillhub_shared::{AccountId, AccountProfile, Role};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AccountDraft, Claims, RoleAssertion},
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Sign-up and admin-creation body
///
/// Missing fields deserialize as empty so they surface as validation errors.
/// Has no role field; the server decides roles.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl From<SignupRequest> for AccountDraft {
    fn from(req: SignupRequest) -> Self {
        AccountDraft {
            name: req.name,
            username: req.username,
            email: req.email,
            password: req.password,
            role: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// Email or username
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub message: String,
    pub user: AccountProfile,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: AccountProfile,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

// =============================================================================
// Handlers
// =============================================================================

/// Self-service registration
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    if !state.config.enable_signup {
        return Err(ApiError::BadRequest(
            "Registration is currently disabled".to_string(),
        ));
    }

    let account = state.auth_service.register(req.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            message: "Account registered successfully".to_string(),
            user: account.into_profile(),
        }),
    ))
}

/// Login with email or username and password
///
/// Every attempt takes at least the configured minimum time, so response
/// latency does not reveal whether the identifier exists.
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let start = std::time::Instant::now();
    let min_response_time = std::time::Duration::from_millis(state.config.login_min_response_ms);

    let result = state
        .auth_service
        .login(&req.identifier, &req.password)
        .await;

    let elapsed = start.elapsed();
    if elapsed < min_response_time {
        tokio::time::sleep(min_response_time - elapsed).await;
    }

    let (user, token) = result?;
    Ok(Json(AuthResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl_seconds(),
        user,
    }))
}

/// Identity carried by the caller's token
pub async fn me(
    Extension(assertion): Extension<RoleAssertion>,
    Extension(claims): Extension<Claims>,
) -> Json<MeResponse> {
    Json(MeResponse {
        id: assertion.account_id,
        username: claims.username,
        email: claims.email,
        role: assertion.role,
    })
}

/// Create an admin account (admin callers only)
pub async fn create_admin(
    State(state): State<AppState>,
    Extension(assertion): Extension<RoleAssertion>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AccountResponse>)> {
    let account = state
        .auth_service
        .register_admin(req.into(), assertion.role)
        .await?;

    tracing::info!(
        created_by = %assertion.account_id,
        account_id = %account.id,
        "Admin account created"
    );

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse {
            message: "Admin account created successfully".to_string(),
            user: account.into_profile(),
        }),
    ))
}
