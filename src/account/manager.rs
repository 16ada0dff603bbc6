/// Account manager: the credential store
///
/// Owns the `users` table. Password hashing runs on the blocking pool since
/// bcrypt is deliberately slow.
use crate::{
    account::RegisterRequest,
    db::models::{User, UserSummary},
    error::{conflict_on_unique, PlazaError, PlazaResult},
    metrics,
    pagination::{Page, PageRequest},
    validation::validate_request,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::OnceCell;

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, bio, profile_picture_url,
     is_verified, is_active, created_at, updated_at";

/// Partial profile update; only `Some` fields are written
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.bio.is_none() && self.profile_picture_url.is_none()
    }
}

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    bcrypt_cost: u32,
    /// Hash at the configured cost, checked when the identifier is unknown
    dummy_hash: OnceCell<String>,
}

impl AccountManager {
    pub fn new(db: SqlitePool, bcrypt_cost: u32) -> Self {
        Self {
            db,
            bcrypt_cost,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Create a new account
    pub async fn register(&self, req: RegisterRequest) -> PlazaResult<User> {
        validate_request(&req)?;

        // Friendlier messages for the common case; the unique indexes decide races
        if self.username_exists(&req.username).await? {
            return Err(PlazaError::Conflict("Username is already taken".to_string()));
        }
        if self.email_exists(&req.email).await? {
            return Err(PlazaError::Conflict("Email is already registered".to_string()));
        }

        let password_hash = hash_password(req.password, self.bcrypt_cost).await?;
        let full_name = req.full_name.filter(|n| !n.trim().is_empty());

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, full_name, is_verified, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, 1, ?5, ?5)",
        )
        .bind(&req.username)
        .bind(req.email.to_lowercase())
        .bind(&password_hash)
        .bind(&full_name)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| conflict_on_unique(e, "Username or email is already registered"))?
        .last_insert_rowid();

        metrics::USERS_REGISTERED_TOTAL.inc();
        tracing::info!(user_id = id, username = %req.username, "Registered new account");

        self.get_user(id).await
    }

    /// Verify credentials and return the account
    pub async fn login(&self, identifier: &str, password: &str) -> PlazaResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?1 OR email = ?1",
            USER_COLUMNS
        ))
        .bind(identifier.trim())
        .fetch_optional(&self.db)
        .await?;

        // Unknown identifiers pay the same bcrypt cost as known ones
        let Some(user) = user else {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| hash_password(uuid::Uuid::new_v4().to_string(), self.bcrypt_cost))
                .await?;
            verify_password(password.to_string(), dummy.clone()).await?;
            return Err(PlazaError::Authentication("Invalid credentials".to_string()));
        };

        let valid = verify_password(password.to_string(), user.password_hash.clone()).await?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: bad password");
            return Err(PlazaError::Authentication("Invalid credentials".to_string()));
        }

        if !user.is_active {
            return Err(PlazaError::AccountDisabled);
        }

        Ok(user)
    }

    /// Look up a user by id, active or not
    pub async fn find_user(&self, id: i64) -> PlazaResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> PlazaResult<User> {
        self.find_user(id)
            .await?
            .ok_or_else(|| PlazaError::NotFound("User not found".to_string()))
    }

    /// Get an active user by username
    pub async fn get_by_username(&self, username: &str) -> PlazaResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = ?1 AND is_active = 1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| PlazaError::NotFound("User not found".to_string()))
    }

    /// Apply a partial profile update
    pub async fn update_profile(&self, user_id: i64, patch: ProfilePatch) -> PlazaResult<User> {
        if patch.is_empty() {
            return self.get_user(user_id).await;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");

        if let Some(full_name) = patch.full_name {
            fields.push("full_name = ").push_bind_unseparated(full_name);
        }
        if let Some(bio) = patch.bio {
            fields.push("bio = ").push_bind_unseparated(bio);
        }
        if let Some(url) = patch.profile_picture_url {
            fields.push("profile_picture_url = ").push_bind_unseparated(url);
        }
        fields.push("updated_at = ").push_bind_unseparated(Utc::now());

        builder.push(" WHERE id = ").push_bind(user_id);

        let result = builder.build().execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(PlazaError::NotFound("User not found".to_string()));
        }

        self.get_user(user_id).await
    }

    /// Replace the profile picture, returning the previous URL for cleanup
    pub async fn set_profile_picture(&self, user_id: i64, url: String) -> PlazaResult<(User, Option<String>)> {
        let previous = self.get_user(user_id).await?.profile_picture_url;

        let user = self
            .update_profile(
                user_id,
                ProfilePatch {
                    profile_picture_url: Some(url),
                    ..Default::default()
                },
            )
            .await?;

        Ok((user, previous))
    }

    /// Change password after verifying the current one
    pub async fn change_password(&self, user_id: i64, current: &str, new: &str) -> PlazaResult<()> {
        let user = self.get_user(user_id).await?;

        if !verify_password(current.to_string(), user.password_hash).await? {
            return Err(PlazaError::invalid("currentPassword", "Current password is incorrect"));
        }

        let password_hash = hash_password(new.to_string(), self.bcrypt_cost).await?;

        sqlx::query("UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }

    /// Search active users by username or full name
    pub async fn search(&self, query: &str, page: PageRequest) -> PlazaResult<Page<UserSummary>> {
        let pattern = format!("%{}%", escape_like(query.trim()));

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE is_active = 1 AND (username LIKE ?1 ESCAPE '\\' OR full_name LIKE ?1 ESCAPE '\\')",
        )
        .bind(&pattern)
        .fetch_one(&self.db)
        .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users
             WHERE is_active = 1 AND (username LIKE ?1 ESCAPE '\\' OR full_name LIKE ?1 ESCAPE '\\')
             ORDER BY username ASC
             LIMIT ?2 OFFSET ?3",
            USER_COLUMNS
        ))
        .bind(&pattern)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let items = users.iter().map(UserSummary::from).collect();
        Ok(Page::new(items, page, total))
    }

    async fn username_exists(&self, username: &str) -> PlazaResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?1")
            .bind(username)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> PlazaResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await?;

        Ok(count > 0)
    }
}

fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

async fn hash_password(password: String, cost: u32) -> PlazaResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PlazaError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| PlazaError::Internal(format!("Password hashing failed: {}", e)))
}

async fn verify_password(password: String, hash: String) -> PlazaResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| PlazaError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(|e| PlazaError::Internal(format!("Password verification failed: {}", e)))
}
