/// Authentication middleware
use crate::{auth::resolve_user, context::AppContext, db::models::User};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

/// A user resolved by [`authenticate`], cached in request extensions
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolve the bearer token once per request and cache the user
///
/// Never rejects: extractors decide whether a missing or bad session is an
/// error for the route.
pub async fn authenticate(State(ctx): State<AppContext>, mut req: Request, next: Next) -> Response {
    if let Some(token) = extract_bearer_token(req.headers()) {
        match resolve_user(&ctx, &token).await {
            Ok(user) => {
                req.extensions_mut().insert(SessionUser(user));
            }
            Err(e) => {
                tracing::debug!("Request carries an unusable session: {}", e);
            }
        }
    }

    next.run(req).await
}
