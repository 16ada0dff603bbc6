/// Authentication extractors
use crate::{
    api::middleware::{extract_bearer_token, SessionUser},
    context::AppContext,
    db::models::User,
    error::{PlazaError, PlazaResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Verify an access token and load its active user
///
/// Missing users surface as `InvalidToken`, deactivated ones as `AccountDisabled`.
pub async fn resolve_user(ctx: &AppContext, token: &str) -> PlazaResult<User> {
    let claims = ctx.tokens.verify_access(token)?;

    let user = ctx
        .accounts
        .find_user(claims.user_id()?)
        .await?
        .ok_or_else(|| PlazaError::InvalidToken("User no longer exists".to_string()))?;

    if !user.is_active {
        return Err(PlazaError::AccountDisabled);
    }

    Ok(user)
}

/// Authenticated user - rejects the request without a valid session
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = PlazaError;

    async fn from_request_parts(parts: &mut Parts, state: &AppContext) -> Result<Self, Self::Rejection> {
        if let Some(SessionUser(user)) = parts.extensions.get::<SessionUser>() {
            return Ok(AuthUser(user.clone()));
        }

        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| PlazaError::Authentication("Access token required".to_string()))?;

        let user = resolve_user(state, &token).await?;
        Ok(AuthUser(user))
    }
}

/// Optional authenticated user - any session failure means anonymous
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<User>);

impl OptionalAuthUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalAuthUser {
    type Rejection = PlazaError;

    async fn from_request_parts(parts: &mut Parts, state: &AppContext) -> Result<Self, Self::Rejection> {
        if let Some(SessionUser(user)) = parts.extensions.get::<SessionUser>() {
            return Ok(OptionalAuthUser(Some(user.clone())));
        }

        let user = match extract_bearer_token(&parts.headers) {
            Some(token) => resolve_user(state, &token).await.ok(),
            None => None,
        };

        Ok(OptionalAuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{account::RegisterRequest, config::ServerConfig};
    use axum::http::{header, Request};

    async fn setup() -> (AppContext, tempfile::TempDir, User) {
        let media_dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::for_tests(ServerConfig::for_tests(media_dir.path().to_path_buf()))
            .await
            .unwrap();
        let user = ctx
            .accounts
            .register(RegisterRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
                full_name: None,
            })
            .await
            .unwrap();
        (ctx, media_dir, user)
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_auth_user_errors() {
        let (ctx, _dir, user) = setup().await;

        let mut parts = parts_with(None);
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &ctx).await,
            Err(PlazaError::Authentication(_))
        ));

        let mut parts = parts_with(Some("Bearer not-a-token"));
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &ctx).await,
            Err(PlazaError::InvalidToken(_))
        ));

        let pair = ctx.tokens.issue_token_pair(user.id).await.unwrap();
        let header_value = format!("Bearer {}", pair.access_token);
        let mut parts = parts_with(Some(&header_value));
        let authed = AuthUser::from_request_parts(&mut parts, &ctx).await.unwrap();
        assert_eq!(authed.id(), user.id);

        // Refresh tokens are not access tokens
        let refresh_header = format!("Bearer {}", pair.refresh_token);
        let mut parts = parts_with(Some(&refresh_header));
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &ctx).await,
            Err(PlazaError::InvalidToken(_))
        ));

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(user.id)
            .execute(&ctx.db)
            .await
            .unwrap();
        let mut parts = parts_with(Some(&header_value));
        assert!(matches!(
            AuthUser::from_request_parts(&mut parts, &ctx).await,
            Err(PlazaError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn test_optional_auth_falls_back_to_anonymous() {
        let (ctx, _dir, user) = setup().await;

        let mut parts = parts_with(Some("Bearer garbage"));
        let anon = OptionalAuthUser::from_request_parts(&mut parts, &ctx).await.unwrap();
        assert_eq!(anon.id(), None);

        let pair = ctx.tokens.issue_token_pair(user.id).await.unwrap();
        let header_value = format!("Bearer {}", pair.access_token);
        let mut parts = parts_with(Some(&header_value));
        let viewer = OptionalAuthUser::from_request_parts(&mut parts, &ctx).await.unwrap();
        assert_eq!(viewer.id(), Some(user.id));
    }
}
