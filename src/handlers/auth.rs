use crate::auth::{self, Role, SessionIdentity, TokenPair, ROLE_COOKIE, SESSION_COOKIE};
use crate::entities::user::{self, Entity as UserEntity};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::ApiResponse;
use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use std::str::FromStr;
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Exchange credentials for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued"),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let account = UserEntity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .filter(user::Column::IsActive.eq(true))
        .one(&*state.db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    // Verify against a constant credential shape so unknown accounts and bad
    // passwords are indistinguishable to the caller
    let Some(account) = account else {
        warn!(email = %request.email, "Login attempt for unknown account");
        return Err(ServiceError::Unauthorized("Invalid credentials".into()));
    };
    if !auth::verify_password(&account.password_hash, &request.password) {
        warn!(user_id = %account.id, "Login attempt with wrong password");
        return Err(ServiceError::Unauthorized("Invalid credentials".into()));
    }

    let role = Role::from_str(&account.role).map_err(|_| {
        ServiceError::InternalError(format!("Account {} has an unrecognized role", account.id))
    })?;

    let identity = SessionIdentity {
        user_id: account.id,
        name: account.name,
        email: account.email,
        role,
    };
    let pair = state
        .auth
        .generate_token_pair(&identity)
        .map_err(|e| ServiceError::InternalError(e.to_string()))?;

    info!(user_id = %identity.user_id, "Login succeeded");
    Ok(Json(ApiResponse::success(pair)))
}

/// Exchange a refresh token for a fresh token pair
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token pair reissued"),
        (status = 401, description = "Invalid refresh token", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPair>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

    let pair = state
        .auth
        .refresh(&request.refresh_token)
        .map_err(|_| ServiceError::Unauthorized("Invalid refresh token".into()))?;
    Ok(Json(ApiResponse::success(pair)))
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ServiceError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Missing bearer token".into()))
}

/// Set the http-only session cookie and the readable role cookie consumed by
/// the edge-level access guard. The bearer token itself becomes the session
/// cookie value; the edge only checks its presence, the router re-validates.
#[utoipa::path(
    post,
    path = "/api/v1/auth/session",
    responses(
        (status = 204, description = "Session cookies set"),
        (status = 401, description = "Missing or invalid bearer token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, StatusCode), ServiceError> {
    let token = bearer_token(&headers)?;
    let user = state
        .auth
        .authenticate(&token)
        .map_err(|_| ServiceError::Unauthorized("Invalid bearer token".into()))?;

    let max_age = cookie::time::Duration::days(state.config.session_cookie_max_age_days);

    let mut session = Cookie::new(SESSION_COOKIE, token);
    session.set_http_only(true);
    session.set_secure(state.config.session_cookie_secure);
    session.set_same_site(SameSite::Lax);
    session.set_path("/");
    session.set_max_age(max_age);

    let mut role = Cookie::new(ROLE_COOKIE, user.role.to_string());
    role.set_secure(state.config.session_cookie_secure);
    role.set_same_site(SameSite::Lax);
    role.set_path("/");
    role.set_max_age(max_age);

    if let Some(domain) = &state.config.session_cookie_domain {
        session.set_domain(domain.clone());
        role.set_domain(domain.clone());
    }

    info!(user_id = %user.user_id, "Session cookies issued");
    Ok((jar.add(session).add(role), StatusCode::NO_CONTENT))
}

/// Clear the session and role cookies
#[utoipa::path(
    delete,
    path = "/api/v1/auth/session",
    responses((status = 204, description = "Session cookies cleared")),
    tag = "Auth"
)]
pub async fn clear_session(jar: CookieJar) -> (CookieJar, StatusCode) {
    let mut session = Cookie::from(SESSION_COOKIE);
    session.set_path("/");
    let mut role = Cookie::from(ROLE_COOKIE);
    role.set_path("/");

    (jar.remove(session).remove(role), StatusCode::NO_CONTENT)
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route(
            "/auth/session",
            post(create_session).delete(clear_session),
        )
}
