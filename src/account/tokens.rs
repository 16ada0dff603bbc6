/// Access/refresh token issuance, rotation and revocation
///
/// Access tokens are stateless JWTs. Refresh tokens are JWTs too, but are only
/// honoured while a matching, unexpired row exists in `refresh_tokens`; that
/// row is what rotation and logout remove.
use crate::{
    config::AuthConfig,
    error::{PlazaError, PlazaResult},
    metrics,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

/// JWT claims shared by both token kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// "access" or "refresh"
    pub typ: String,
    /// Unique per token so two pairs minted in the same second differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> PlazaResult<i64> {
        self.sub
            .parse()
            .map_err(|_| PlazaError::InvalidToken("Invalid token subject".to_string()))
    }
}

/// A freshly minted access/refresh pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Token service
pub struct TokenService {
    db: SqlitePool,
    config: Arc<AuthConfig>,
}

impl TokenService {
    pub fn new(db: SqlitePool, config: Arc<AuthConfig>) -> Self {
        Self { db, config }
    }

    /// Issue a token pair and persist the refresh half
    pub async fn issue_token_pair(&self, user_id: i64) -> PlazaResult<TokenPair> {
        let now = Utc::now();
        let (pair, refresh_expires_at) = self.mint_pair(user_id, now)?;

        store_refresh_token(&self.db, user_id, &pair.refresh_token, refresh_expires_at, now).await?;

        tracing::debug!(user_id, "Issued token pair");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, invalidating the presented one
    ///
    /// Returns the user id alongside the new pair.
    pub async fn refresh(&self, refresh_token: &str) -> PlazaResult<(i64, TokenPair)> {
        let claims = self.verify(refresh_token, REFRESH, &self.config.refresh_token_secret)?;
        let user_id = claims.user_id()?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // Deleting the stored row is the authoritative check: a rotated,
        // revoked or expired token matches nothing here.
        let consumed = sqlx::query(
            "DELETE FROM refresh_tokens WHERE token = ?1 AND user_id = ?2 AND expires_at > ?3",
        )
        .bind(refresh_token)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if consumed == 0 {
            tracing::warn!(user_id, "Refresh token not recognised or already used");
            return Err(PlazaError::InvalidToken("Invalid or expired refresh token".to_string()));
        }

        let (pair, refresh_expires_at) = self.mint_pair(user_id, now)?;
        store_refresh_token(&mut *tx, user_id, &pair.refresh_token, refresh_expires_at, now).await?;

        tx.commit().await?;

        tracing::debug!(user_id, "Rotated refresh token");
        Ok((user_id, pair))
    }

    /// Revoke one refresh token belonging to the user; absent tokens are ignored
    pub async fn revoke(&self, user_id: i64, refresh_token: &str) -> PlazaResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE token = ?1 AND user_id = ?2")
            .bind(refresh_token)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Revoke every refresh token of the user (logout from all devices)
    pub async fn revoke_all(&self, user_id: i64) -> PlazaResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete all refresh tokens past their expiry
    pub async fn sweep_expired(&self) -> PlazaResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.db)
            .await?;

        let deleted = result.rows_affected();
        metrics::TOKENS_SWEPT_TOTAL.inc_by(deleted);

        if deleted > 0 {
            tracing::info!(deleted, "Swept expired refresh tokens");
        } else {
            tracing::debug!("Token sweep: no expired refresh tokens found");
        }

        Ok(deleted)
    }

    /// Verify an access token's signature, expiry and kind
    pub fn verify_access(&self, token: &str) -> PlazaResult<Claims> {
        self.verify(token, ACCESS, &self.config.access_token_secret)
    }

    fn mint_pair(&self, user_id: i64, now: DateTime<Utc>) -> PlazaResult<(TokenPair, DateTime<Utc>)> {
        let access_ttl = self.config.access_token_ttl;
        let refresh_ttl = self.config.refresh_token_ttl;

        let access_token = sign(
            &claims_for(user_id, ACCESS, now, access_ttl),
            &self.config.access_token_secret,
        )?;
        let refresh_token = sign(
            &claims_for(user_id, REFRESH, now, refresh_ttl),
            &self.config.refresh_token_secret,
        )?;

        // Stored expiry and the embedded `exp` come from the same instant
        let refresh_expires_at = now + Duration::seconds(refresh_ttl);

        Ok((
            TokenPair {
                access_token,
                refresh_token,
                expires_in: access_ttl,
            },
            refresh_expires_at,
        ))
    }

    fn verify(&self, token: &str, kind: &str, secret: &str) -> PlazaResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map_err(|e| {
                tracing::debug!("JWT verification failed: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => PlazaError::InvalidToken("Token has expired".to_string()),
                    ErrorKind::InvalidSignature => {
                        PlazaError::InvalidToken("Invalid token signature".to_string())
                    }
                    _ => PlazaError::InvalidToken("Malformed token".to_string()),
                }
            })?;

        if data.claims.typ != kind {
            return Err(PlazaError::InvalidToken("Wrong token type".to_string()));
        }

        Ok(data.claims)
    }
}

fn claims_for(user_id: i64, kind: &str, now: DateTime<Utc>, ttl: i64) -> Claims {
    Claims {
        sub: user_id.to_string(),
        typ: kind.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp(),
        exp: now.timestamp() + ttl,
    }
}

fn sign(claims: &Claims, secret: &str) -> PlazaResult<String> {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| PlazaError::Internal(format!("Failed to sign token: {}", e)))
}

async fn store_refresh_token<'e, E>(
    executor: E,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> PlazaResult<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO refresh_tokens (user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok(())
}
