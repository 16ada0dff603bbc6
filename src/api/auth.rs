/// /api/auth endpoints
use crate::{
    account::{AuthResponse, LoginRequest, OwnProfile, RefreshTokenRequest, RegisterRequest},
    api::{extract::JsonBody, response::ApiResponse},
    auth::AuthUser,
    context::AppContext,
    error::{PlazaError, PlazaResult},
    validation::validate_request,
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/logout-all", post(logout_all))
        .route("/api/auth/verify", get(verify))
}

async fn register(
    State(ctx): State<AppContext>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> PlazaResult<ApiResponse<AuthResponse>> {
    let user = ctx.accounts.register(req).await?;
    let tokens = ctx.tokens.issue_token_pair(user.id).await?;

    Ok(ApiResponse::created(
        "User registered successfully",
        AuthResponse {
            user: OwnProfile::from(&user),
            tokens,
        },
    ))
}

async fn login(
    State(ctx): State<AppContext>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> PlazaResult<ApiResponse<AuthResponse>> {
    validate_request(&req)?;

    let user = ctx.accounts.login(&req.identifier, &req.password).await?;
    let tokens = ctx.tokens.issue_token_pair(user.id).await?;

    tracing::info!(user_id = user.id, "User logged in");
    Ok(ApiResponse::ok(
        "Login successful",
        AuthResponse {
            user: OwnProfile::from(&user),
            tokens,
        },
    ))
}

/// Exchange a refresh token for a new pair; the presented token is consumed
async fn refresh(
    State(ctx): State<AppContext>,
    JsonBody(req): JsonBody<RefreshTokenRequest>,
) -> PlazaResult<ApiResponse<AuthResponse>> {
    validate_request(&req)?;

    let (user_id, tokens) = ctx.tokens.refresh(&req.refresh_token).await?;

    let user = ctx
        .accounts
        .find_user(user_id)
        .await?
        .ok_or_else(|| PlazaError::InvalidToken("User no longer exists".to_string()))?;
    if !user.is_active {
        ctx.tokens.revoke_all(user.id).await?;
        return Err(PlazaError::AccountDisabled);
    }

    Ok(ApiResponse::ok(
        "Token refreshed",
        AuthResponse {
            user: OwnProfile::from(&user),
            tokens,
        },
    ))
}

async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    JsonBody(req): JsonBody<RefreshTokenRequest>,
) -> PlazaResult<ApiResponse<()>> {
    validate_request(&req)?;
    ctx.tokens.revoke(auth.id(), &req.refresh_token).await?;

    Ok(ApiResponse::message("Logged out successfully"))
}

async fn logout_all(State(ctx): State<AppContext>, auth: AuthUser) -> PlazaResult<ApiResponse<Value>> {
    let revoked = ctx.tokens.revoke_all(auth.id()).await?;

    tracing::info!(user_id = auth.id(), revoked, "Logged out of all devices");
    Ok(ApiResponse::ok(
        "Logged out from all devices",
        json!({ "revokedSessions": revoked }),
    ))
}

async fn verify(auth: AuthUser) -> ApiResponse<Value> {
    ApiResponse::ok("Token is valid", json!({ "user": OwnProfile::from(&auth.0) }))
}
