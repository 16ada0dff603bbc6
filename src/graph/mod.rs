/// Follow graph
///
/// Directed follow edges between users. Follower/following counts are always
/// computed from the edges, never stored.
use crate::{
    db::models::UserSummary,
    error::{conflict_on_unique, PlazaError, PlazaResult},
    pagination::{Page, PageRequest},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

/// A user in a follower/following listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEntry {
    #[serde(flatten)]
    pub user: UserSummary,
    pub followed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct FollowRow {
    id: i64,
    username: String,
    full_name: Option<String>,
    profile_picture_url: Option<String>,
    followed_at: DateTime<Utc>,
}

impl From<FollowRow> for FollowEntry {
    fn from(row: FollowRow) -> Self {
        Self {
            user: UserSummary {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
                profile_picture_url: row.profile_picture_url,
            },
            followed_at: row.followed_at,
        }
    }
}

/// Which side of the edge to list
#[derive(Debug, Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

/// Social graph manager
pub struct SocialGraph {
    db: SqlitePool,
}

impl SocialGraph {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Follow the user with `target_username`
    pub async fn follow(&self, follower_id: i64, target_username: &str) -> PlazaResult<UserSummary> {
        let target = self.resolve_active(target_username).await?;

        if target.id == follower_id {
            return Err(PlazaError::invalid("username", "You cannot follow yourself"));
        }

        if self.is_following(follower_id, target.id).await? {
            return Err(PlazaError::Conflict("Already following this user".to_string()));
        }

        // The unique pair constraint settles a concurrent duplicate
        sqlx::query("INSERT INTO followers (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(follower_id)
            .bind(target.id)
            .bind(Utc::now())
            .execute(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "Already following this user"))?;

        tracing::debug!(follower_id, following_id = target.id, "Followed user");
        Ok(target)
    }

    /// Remove a follow edge
    pub async fn unfollow(&self, follower_id: i64, target_username: &str) -> PlazaResult<()> {
        let target = self.resolve_active(target_username).await?;

        let result = sqlx::query("DELETE FROM followers WHERE follower_id = ?1 AND following_id = ?2")
            .bind(follower_id)
            .bind(target.id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PlazaError::NotFound("You are not following this user".to_string()));
        }

        tracing::debug!(follower_id, following_id = target.id, "Unfollowed user");
        Ok(())
    }

    pub async fn is_following(&self, follower_id: i64, following_id: i64) -> PlazaResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM followers WHERE follower_id = ?1 AND following_id = ?2)",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    /// (followers, following) counts among active users
    pub async fn counts(&self, user_id: i64) -> PlazaResult<(i64, i64)> {
        let followers: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM followers f JOIN users u ON u.id = f.follower_id
             WHERE f.following_id = ?1 AND u.is_active = 1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let following: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM followers f JOIN users u ON u.id = f.following_id
             WHERE f.follower_id = ?1 AND u.is_active = 1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok((followers, following))
    }

    /// Users following `username`, newest edge first
    pub async fn list_followers(&self, username: &str, page: PageRequest) -> PlazaResult<Page<FollowEntry>> {
        self.list(username, Direction::Followers, page).await
    }

    /// Users `username` follows, newest edge first
    pub async fn list_following(&self, username: &str, page: PageRequest) -> PlazaResult<Page<FollowEntry>> {
        self.list(username, Direction::Following, page).await
    }

    async fn list(&self, username: &str, direction: Direction, page: PageRequest) -> PlazaResult<Page<FollowEntry>> {
        let subject = self.resolve_active(username).await?;

        // (column matching the subject, column naming the listed user)
        let (anchor, listed) = match direction {
            Direction::Followers => ("following_id", "follower_id"),
            Direction::Following => ("follower_id", "following_id"),
        };

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM followers f JOIN users u ON u.id = f.{listed}
             WHERE f.{anchor} = ?1 AND u.is_active = 1"
        ))
        .bind(subject.id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, FollowRow>(&format!(
            "SELECT u.id, u.username, u.full_name, u.profile_picture_url, f.created_at AS followed_at
             FROM followers f JOIN users u ON u.id = f.{listed}
             WHERE f.{anchor} = ?1 AND u.is_active = 1
             ORDER BY f.created_at DESC, f.id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(subject.id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows.into_iter().map(FollowEntry::from).collect();
        Ok(Page::new(items, page, total))
    }

    async fn resolve_active(&self, username: &str) -> PlazaResult<UserSummary> {
        let row: Option<(i64, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, username, full_name, profile_picture_url FROM users
             WHERE username = ?1 AND is_active = 1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        row.map(|(id, username, full_name, profile_picture_url)| UserSummary {
            id,
            username,
            full_name,
            profile_picture_url,
        })
        .ok_or_else(|| PlazaError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn setup() -> (SocialGraph, SqlitePool, Vec<i64>) {
        let pool = db::create_memory_pool().await.unwrap();
        let mut ids = Vec::new();
        for name in ["alice", "bob", "carol"] {
            let id = sqlx::query(
                "INSERT INTO users (username, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, 'x', ?3, ?3)",
            )
            .bind(name)
            .bind(format!("{}@example.com", name))
            .bind(Utc::now())
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
            ids.push(id);
        }
        (SocialGraph::new(pool.clone()), pool, ids)
    }

    #[tokio::test]
    async fn test_follow_and_counts() {
        let (graph, _pool, ids) = setup().await;
        let (alice, bob, carol) = (ids[0], ids[1], ids[2]);

        graph.follow(alice, "bob").await.unwrap();
        graph.follow(carol, "bob").await.unwrap();
        graph.follow(bob, "alice").await.unwrap();

        assert!(graph.is_following(alice, bob).await.unwrap());
        assert!(!graph.is_following(bob, carol).await.unwrap());
        assert_eq!(graph.counts(bob).await.unwrap(), (2, 1));
        assert_eq!(graph.counts(carol).await.unwrap(), (0, 1));
    }

    #[tokio::test]
    async fn test_follow_rules() {
        let (graph, _pool, ids) = setup().await;
        let alice = ids[0];

        assert!(matches!(
            graph.follow(alice, "alice").await,
            Err(PlazaError::Validation(_))
        ));
        assert!(matches!(
            graph.follow(alice, "nobody").await,
            Err(PlazaError::NotFound(_))
        ));

        graph.follow(alice, "bob").await.unwrap();
        assert!(matches!(
            graph.follow(alice, "bob").await,
            Err(PlazaError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unfollow() {
        let (graph, _pool, ids) = setup().await;
        let (alice, bob) = (ids[0], ids[1]);

        assert!(matches!(
            graph.unfollow(alice, "bob").await,
            Err(PlazaError::NotFound(_))
        ));

        graph.follow(alice, "bob").await.unwrap();
        graph.unfollow(alice, "bob").await.unwrap();
        assert!(!graph.is_following(alice, bob).await.unwrap());
    }

    #[tokio::test]
    async fn test_listings_skip_inactive_users() {
        let (graph, pool, ids) = setup().await;
        let (alice, bob, carol) = (ids[0], ids[1], ids[2]);

        graph.follow(alice, "carol").await.unwrap();
        graph.follow(bob, "carol").await.unwrap();

        let page = graph.list_followers("carol", PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        // Newest edge first
        assert_eq!(page.items[0].user.username, "bob");

        sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?1")
            .bind(bob)
            .execute(&pool)
            .await
            .unwrap();

        let page = graph.list_followers("carol", PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].user.id, alice);

        let following = graph.list_following("alice", PageRequest::default()).await.unwrap();
        assert_eq!(following.items.len(), 1);
        assert_eq!(following.items[0].user.id, carol);
        assert_eq!(graph.counts(carol).await.unwrap(), (1, 0));
    }
}
