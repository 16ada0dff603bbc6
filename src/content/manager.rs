/// Content manager: posts, likes, comments and the feed
use crate::{
    content::{CommentRow, CommentView, LikeState, PostRow, PostView},
    db::models::Post,
    error::{conflict_on_unique, PlazaError, PlazaResult},
    media::{self, MediaStore, UploadOptions},
    metrics,
    pagination::{Page, PageRequest},
    validation::{validate_caption, COMMENT_MAX},
};
use chrono::Utc;
use image::ImageFormat;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Post columns joined with the author; `?1` is always the viewer id (or NULL)
const POST_SELECT: &str = "SELECT p.id, p.user_id, p.caption, p.image_url, p.likes_count, p.comments_count,
        p.group_id, p.created_at, p.updated_at,
        u.username AS author_username, u.full_name AS author_full_name,
        u.profile_picture_url AS author_profile_picture_url,
        EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1) AS is_liked
     FROM posts p JOIN users u ON u.id = p.user_id";

/// Group posts are only visible to members of private groups; `?1` is the viewer
const VISIBLE_TO_VIEWER: &str = "(p.group_id IS NULL OR EXISTS(
        SELECT 1 FROM groups g WHERE g.id = p.group_id AND (g.is_private = 0 OR EXISTS(
            SELECT 1 FROM group_members m WHERE m.group_id = g.id AND m.user_id = ?1))))";

const COMMENT_SELECT: &str = "SELECT c.id, c.user_id, c.post_id, c.comment_text, c.created_at, c.updated_at,
        u.username AS author_username, u.full_name AS author_full_name,
        u.profile_picture_url AS author_profile_picture_url
     FROM comments c JOIN users u ON u.id = c.user_id";

/// Content manager service
pub struct ContentManager {
    db: SqlitePool,
    media: Arc<dyn MediaStore>,
}

impl ContentManager {
    pub fn new(db: SqlitePool, media: Arc<dyn MediaStore>) -> Self {
        Self { db, media }
    }

    /// Create a top-level post with an image
    pub async fn create_post(&self, user_id: i64, caption: Option<String>, image: Vec<u8>) -> PlazaResult<PostView> {
        let caption = normalize_caption(caption);
        validate_caption(caption.as_deref())?;
        let format = media::detect_image_format(&image, "image")?;

        let image_url = self.upload_image(image, format, media::POSTS_FOLDER).await?;
        let post_id = self.insert_post(user_id, caption, Some(image_url), None).await?;

        metrics::POSTS_CREATED_TOTAL.with_label_values(&["feed"]).inc();
        tracing::info!(post_id, user_id, "Created post");

        self.get_post(post_id, Some(user_id)).await
    }

    /// Fetch a single post as seen by `viewer`
    pub async fn get_post(&self, post_id: i64, viewer: Option<i64>) -> PlazaResult<PostView> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT} WHERE p.id = ?2 AND {VISIBLE_TO_VIEWER}"
        ))
        .bind(viewer)
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(post_not_found)?;

        Ok(row.into())
    }

    /// Replace the caption of a post the user owns
    pub async fn update_caption(&self, post_id: i64, user_id: i64, caption: Option<String>) -> PlazaResult<PostView> {
        let caption = normalize_caption(caption);
        validate_caption(caption.as_deref())?;

        let post = self.load_post(post_id).await?;
        if post.user_id != user_id {
            return Err(PlazaError::Forbidden("You can only edit your own posts".to_string()));
        }

        sqlx::query("UPDATE posts SET caption = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&caption)
            .bind(Utc::now())
            .bind(post_id)
            .execute(&self.db)
            .await?;

        self.get_post(post_id, Some(user_id)).await
    }

    /// Delete a post the user owns, then its image
    pub async fn delete_post(&self, post_id: i64, user_id: i64) -> PlazaResult<()> {
        let post = self.load_post(post_id).await?;
        if post.user_id != user_id {
            return Err(PlazaError::Forbidden("You can only delete your own posts".to_string()));
        }

        self.remove_post(&post).await
    }

    pub async fn like(&self, post_id: i64, user_id: i64) -> PlazaResult<LikeState> {
        // Write first; the unique index is the duplicate check
        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO likes (user_id, post_id, created_at)
             SELECT ?1, ?2, ?3 FROM posts p WHERE p.id = ?2 AND {VISIBLE_TO_VIEWER}"
        ))
        .bind(user_id)
        .bind(post_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "Post already liked"))?;
        if inserted.rows_affected() == 0 {
            return Err(post_not_found());
        }

        let likes_count: i64 =
            sqlx::query_scalar("UPDATE posts SET likes_count = likes_count + 1 WHERE id = ?1 RETURNING likes_count")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        metrics::record_engagement("like");
        Ok(LikeState {
            liked: true,
            likes_count,
        })
    }

    pub async fn unlike(&self, post_id: i64, user_id: i64) -> PlazaResult<LikeState> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PlazaError::NotFound("Like not found".to_string()));
        }

        let likes_count: i64 = sqlx::query_scalar(
            "UPDATE posts SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?1 RETURNING likes_count",
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        metrics::record_engagement("unlike");
        Ok(LikeState {
            liked: false,
            likes_count,
        })
    }

    pub async fn add_comment(&self, post_id: i64, user_id: i64, text: &str) -> PlazaResult<CommentView> {
        let text = text.trim();
        if text.is_empty() || text.chars().count() as u64 > COMMENT_MAX {
            return Err(PlazaError::invalid(
                "commentText",
                format!("Comment must be between 1 and {} characters", COMMENT_MAX),
            ));
        }

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(&format!(
            "INSERT INTO comments (user_id, post_id, comment_text, created_at, updated_at)
             SELECT ?1, ?2, ?3, ?4, ?4 FROM posts p WHERE p.id = ?2 AND {VISIBLE_TO_VIEWER}"
        ))
        .bind(user_id)
        .bind(post_id)
        .bind(text)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(post_not_found());
        }
        let comment_id = inserted.last_insert_rowid();

        sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = ?1"))
            .bind(comment_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::record_engagement("comment");
        Ok(row.into())
    }

    pub async fn delete_comment(&self, post_id: i64, comment_id: i64, user_id: i64) -> PlazaResult<()> {
        let mut tx = self.db.begin().await?;

        let deleted = sqlx::query("DELETE FROM comments WHERE id = ?1 AND post_id = ?2 AND user_id = ?3")
            .bind(comment_id)
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM comments WHERE id = ?1 AND post_id = ?2)")
                    .bind(comment_id)
                    .bind(post_id)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                PlazaError::Forbidden("You can only delete your own comments".to_string())
            } else {
                PlazaError::NotFound("Comment not found".to_string())
            });
        }

        sqlx::query("UPDATE posts SET comments_count = MAX(comments_count - 1, 0) WHERE id = ?1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        metrics::record_engagement("uncomment");
        Ok(())
    }

    /// Comments on a post, newest first
    pub async fn list_comments(&self, post_id: i64, viewer: Option<i64>, page: PageRequest) -> PlazaResult<Page<CommentView>> {
        // Existence and visibility
        self.get_post(post_id, viewer).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?1")
            .bind(post_id)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = ?1
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(post_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(CommentView::from).collect(), page, total))
    }

    /// Top-level posts by `username`, newest first
    pub async fn list_user_posts(&self, username: &str, viewer: Option<i64>, page: PageRequest) -> PlazaResult<Page<PostView>> {
        let author_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = ?1 AND is_active = 1")
            .bind(username)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PlazaError::NotFound("User not found".to_string()))?;

        let total = self.count_user_posts(author_id).await?;

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT} WHERE p.user_id = ?2 AND p.group_id IS NULL
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?3 OFFSET ?4"
        ))
        .bind(viewer)
        .bind(author_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(PostView::from).collect(), page, total))
    }

    /// Number of top-level posts by a user
    pub async fn count_user_posts(&self, user_id: i64) -> PlazaResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND group_id IS NULL")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(count)
    }

    /// Own posts plus posts of followed users, newest first
    pub async fn feed(&self, user_id: i64, page: PageRequest) -> PlazaResult<Page<PostView>> {
        const FEED_FILTER: &str = "p.group_id IS NULL AND u.is_active = 1 AND (p.user_id = ?1
            OR p.user_id IN (SELECT following_id FROM followers WHERE follower_id = ?1))";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM posts p JOIN users u ON u.id = p.user_id WHERE {FEED_FILTER}"
        ))
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT} WHERE {FEED_FILTER}
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(PostView::from).collect(), page, total))
    }

    // ========== Primitives shared with the group manager ==========

    /// Upload an already-sniffed image; any store failure becomes `MediaUpload`
    pub(crate) async fn upload_image(&self, image: Vec<u8>, format: ImageFormat, folder: &str) -> PlazaResult<String> {
        let options = UploadOptions {
            folder: folder.to_string(),
            public_id: media::new_public_id(folder.trim_end_matches('s')),
        };

        tracing::debug!(folder, format = ?format, bytes = image.len(), "Uploading image");

        let uploaded = self.media.upload(image, options).await.map_err(|e| {
            tracing::error!("Image upload failed: {}", e);
            PlazaError::MediaUpload("Failed to upload image".to_string())
        })?;

        Ok(uploaded.secure_url)
    }

    /// Insert a post row; an uploaded image is cleaned up if the insert fails
    pub(crate) async fn insert_post(
        &self,
        user_id: i64,
        caption: Option<String>,
        image_url: Option<String>,
        group_id: Option<i64>,
    ) -> PlazaResult<i64> {
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO posts (user_id, caption, image_url, likes_count, comments_count, group_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, 0, 0, ?4, ?5, ?5)",
        )
        .bind(user_id)
        .bind(&caption)
        .bind(&image_url)
        .bind(group_id)
        .bind(now)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(result) => Ok(result.last_insert_rowid()),
            Err(e) => {
                media::delete_quietly(self.media.as_ref(), image_url.as_deref()).await;
                Err(e.into())
            }
        }
    }

    /// Load the bare post row
    pub(crate) async fn load_post(&self, post_id: i64) -> PlazaResult<Post> {
        sqlx::query_as::<_, Post>(
            "SELECT id, user_id, caption, image_url, likes_count, comments_count, group_id, created_at, updated_at
             FROM posts WHERE id = ?1",
        )
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(post_not_found)
    }

    /// Delete a post row (likes and comments cascade) and then its image
    pub(crate) async fn remove_post(&self, post: &Post) -> PlazaResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?1")
            .bind(post.id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(post_not_found());
        }

        tracing::info!(post_id = post.id, user_id = post.user_id, "Deleted post");
        media::delete_quietly(self.media.as_ref(), post.image_url.as_deref()).await;
        Ok(())
    }

    /// Posts in a group, newest first; access is checked by the caller
    pub(crate) async fn list_group_posts(&self, group_id: i64, viewer: i64, page: PageRequest) -> PlazaResult<Page<PostView>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE group_id = ?1")
            .bind(group_id)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "{POST_SELECT} WHERE p.group_id = ?2
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?3 OFFSET ?4"
        ))
        .bind(viewer)
        .bind(group_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(PostView::from).collect(), page, total))
    }

    pub(crate) fn media(&self) -> &dyn MediaStore {
        self.media.as_ref()
    }
}

fn normalize_caption(caption: Option<String>) -> Option<String> {
    caption.filter(|c| !c.trim().is_empty())
}

fn post_not_found() -> PlazaError {
    PlazaError::NotFound("Post not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db,
        media::{DiskMediaStore, UploadedMedia},
    };
    use async_trait::async_trait;

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct FailingMediaStore;

    #[async_trait]
    impl MediaStore for FailingMediaStore {
        async fn upload(&self, _data: Vec<u8>, _options: UploadOptions) -> PlazaResult<UploadedMedia> {
            Err(PlazaError::MediaStorage("service unavailable".to_string()))
        }

        async fn delete(&self, _public_id: &str) -> PlazaResult<()> {
            Err(PlazaError::MediaStorage("service unavailable".to_string()))
        }
    }

    struct Fixture {
        content: ContentManager,
        pool: SqlitePool,
        media_dir: tempfile::TempDir,
        users: Vec<i64>,
    }

    async fn insert_user(pool: &SqlitePool, name: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, 'x', ?3, ?3)",
        )
        .bind(name)
        .bind(format!("{}@example.com", name))
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    async fn setup() -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        let media_dir = tempfile::tempdir().unwrap();
        let store = DiskMediaStore::new(media_dir.path().to_path_buf(), "http://localhost:5000");

        let mut users = Vec::new();
        for name in ["alice", "bob", "carol"] {
            users.push(insert_user(&pool, name).await);
        }

        Fixture {
            content: ContentManager::new(pool.clone(), Arc::new(store)),
            pool,
            media_dir,
            users,
        }
    }

    async fn count(pool: &SqlitePool, sql: &str, post_id: i64) -> i64 {
        sqlx::query_scalar(sql).bind(post_id).fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let fx = setup().await;
        let alice = fx.users[0];

        let post = fx
            .content
            .create_post(alice, Some("hello".to_string()), PNG_BYTES.to_vec())
            .await
            .unwrap();

        assert_eq!(post.caption.as_deref(), Some("hello"));
        assert_eq!(post.author.username, "alice");
        assert_eq!(post.likes_count, 0);
        assert!(!post.is_liked);

        let url = post.image_url.unwrap();
        assert!(url.starts_with("http://localhost:5000/media/posts/"));
        let file = url.rsplit('/').next().unwrap();
        assert!(fx.media_dir.path().join("posts").join(file).exists());
    }

    #[tokio::test]
    async fn test_create_post_validates_before_upload() {
        let fx = setup().await;
        let alice = fx.users[0];

        let long_caption = "x".repeat(2201);
        assert!(matches!(
            fx.content.create_post(alice, Some(long_caption), PNG_BYTES.to_vec()).await,
            Err(PlazaError::Validation(_))
        ));
        assert!(matches!(
            fx.content.create_post(alice, None, b"not an image".to_vec()).await,
            Err(PlazaError::Validation(_))
        ));

        assert!(!fx.media_dir.path().join("posts").exists());
    }

    #[tokio::test]
    async fn test_upload_failure_writes_nothing() {
        let pool = db::create_memory_pool().await.unwrap();
        let alice = insert_user(&pool, "alice").await;
        let content = ContentManager::new(pool.clone(), Arc::new(FailingMediaStore));

        let result = content.create_post(alice, Some("hi".to_string()), PNG_BYTES.to_vec()).await;
        assert!(matches!(result, Err(PlazaError::MediaUpload(_))));

        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts").fetch_one(&pool).await.unwrap();
        assert_eq!(posts, 0);
    }

    #[tokio::test]
    async fn test_double_like_counts_once() {
        let fx = setup().await;
        let (alice, bob) = (fx.users[0], fx.users[1]);
        let post = fx.content.create_post(alice, None, PNG_BYTES.to_vec()).await.unwrap();

        let state = fx.content.like(post.id, bob).await.unwrap();
        assert_eq!(state.likes_count, 1);
        assert!(matches!(
            fx.content.like(post.id, bob).await,
            Err(PlazaError::Conflict(_))
        ));

        let view = fx.content.get_post(post.id, Some(bob)).await.unwrap();
        assert_eq!(view.likes_count, 1);
        assert!(view.is_liked);
        assert!(!fx.content.get_post(post.id, Some(alice)).await.unwrap().is_liked);
        assert_eq!(
            count(&fx.pool, "SELECT COUNT(*) FROM likes WHERE post_id = ?1", post.id).await,
            1
        );
    }

    #[tokio::test]
    async fn test_unlike_without_like_is_not_found() {
        let fx = setup().await;
        let (alice, bob) = (fx.users[0], fx.users[1]);
        let post = fx.content.create_post(alice, None, PNG_BYTES.to_vec()).await.unwrap();

        assert!(matches!(
            fx.content.unlike(post.id, bob).await,
            Err(PlazaError::NotFound(_))
        ));
        assert!(matches!(
            fx.content.like(9999, bob).await,
            Err(PlazaError::NotFound(_))
        ));

        fx.content.like(post.id, bob).await.unwrap();
        let state = fx.content.unlike(post.id, bob).await.unwrap();
        assert_eq!(state.likes_count, 0);
        assert!(fx.content.unlike(post.id, bob).await.is_err());
        assert_eq!(fx.content.get_post(post.id, None).await.unwrap().likes_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_likes_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&crate::config::DatabaseConfig {
            path: dir.path().join("plaza.db"),
            max_connections: 4,
            acquire_timeout_secs: 5,
            idle_timeout_secs: 60,
            max_lifetime_secs: 600,
        })
        .await
        .unwrap();
        db::run_migrations(&pool).await.unwrap();

        let store = DiskMediaStore::new(dir.path().join("media"), "http://localhost:5000");
        let content = Arc::new(ContentManager::new(pool.clone(), Arc::new(store)));

        let author = insert_user(&pool, "author").await;
        let post = content.create_post(author, None, PNG_BYTES.to_vec()).await.unwrap();

        let mut likers = Vec::new();
        for i in 0..8 {
            likers.push(insert_user(&pool, &format!("fan{}", i)).await);
        }

        let handles: Vec<_> = likers
            .into_iter()
            .map(|user_id| {
                let content = content.clone();
                tokio::spawn(async move {
                    content.like(post.id, user_id).await?;
                    content.add_comment(post.id, user_id, "nice").await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let view = content.get_post(post.id, None).await.unwrap();
        assert_eq!((view.likes_count, view.comments_count), (8, 8));
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM likes WHERE post_id = ?1", post.id).await, 8);
    }

    #[tokio::test]
    async fn test_private_group_post_rejects_outsiders() {
        let fx = setup().await;
        let (alice, bob) = (fx.users[0], fx.users[1]);

        let group_id = sqlx::query(
            "INSERT INTO groups (name, is_private, owner_id, members_count, created_at, updated_at)
             VALUES ('closed', 1, ?1, 1, ?2, ?2)",
        )
        .bind(alice)
        .bind(Utc::now())
        .execute(&fx.pool)
        .await
        .unwrap()
        .last_insert_rowid();
        let post_id = fx
            .content
            .insert_post(alice, Some("members only".to_string()), None, Some(group_id))
            .await
            .unwrap();

        assert!(matches!(fx.content.like(post_id, bob).await, Err(PlazaError::NotFound(_))));
        assert!(matches!(
            fx.content.add_comment(post_id, bob, "let me in").await,
            Err(PlazaError::NotFound(_))
        ));
        assert_eq!(count(&fx.pool, "SELECT COUNT(*) FROM likes WHERE post_id = ?1", post_id).await, 0);
        assert_eq!(count(&fx.pool, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", post_id).await, 0);
        assert_eq!(
            count(&fx.pool, "SELECT likes_count + comments_count FROM posts WHERE id = ?1", post_id).await,
            0
        );

        assert!(matches!(
            fx.content.delete_comment(post_id, 12345, bob).await,
            Err(PlazaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counters_match_rows() {
        let fx = setup().await;
        let (alice, bob, carol) = (fx.users[0], fx.users[1], fx.users[2]);
        let post = fx.content.create_post(alice, None, PNG_BYTES.to_vec()).await.unwrap();

        fx.content.like(post.id, bob).await.unwrap();
        fx.content.like(post.id, carol).await.unwrap();
        fx.content.unlike(post.id, carol).await.unwrap();

        let first = fx.content.add_comment(post.id, bob, "nice").await.unwrap();
        fx.content.add_comment(post.id, carol, "great shot").await.unwrap();
        fx.content.delete_comment(post.id, first.id, bob).await.unwrap();

        let view = fx.content.get_post(post.id, None).await.unwrap();
        assert_eq!(
            view.likes_count,
            count(&fx.pool, "SELECT COUNT(*) FROM likes WHERE post_id = ?1", post.id).await
        );
        assert_eq!(
            view.comments_count,
            count(&fx.pool, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", post.id).await
        );
        assert_eq!((view.likes_count, view.comments_count), (1, 1));

        let comments = fx.content.list_comments(post.id, None, PageRequest::default()).await.unwrap();
        assert_eq!(comments.total, 1);
        assert_eq!(comments.items[0].author.username, "carol");
    }

    #[tokio::test]
    async fn test_comment_validation() {
        let fx = setup().await;
        let alice = fx.users[0];
        let post = fx.content.create_post(alice, None, PNG_BYTES.to_vec()).await.unwrap();

        assert!(matches!(
            fx.content.add_comment(post.id, alice, "   ").await,
            Err(PlazaError::Validation(_))
        ));
        assert!(matches!(
            fx.content.add_comment(post.id, alice, &"y".repeat(501)).await,
            Err(PlazaError::Validation(_))
        ));
        assert!(matches!(
            fx.content.add_comment(404, alice, "hello").await,
            Err(PlazaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_modify() {
        let fx = setup().await;
        let (alice, bob) = (fx.users[0], fx.users[1]);
        let post = fx
            .content
            .create_post(alice, Some("original".to_string()), PNG_BYTES.to_vec())
            .await
            .unwrap();
        let comment = fx.content.add_comment(post.id, alice, "mine").await.unwrap();

        assert!(matches!(
            fx.content.update_caption(post.id, bob, Some("hijacked".to_string())).await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.content.delete_post(post.id, bob).await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.content.delete_comment(post.id, comment.id, bob).await,
            Err(PlazaError::Forbidden(_))
        ));

        let view = fx.content.get_post(post.id, None).await.unwrap();
        assert_eq!(view.caption.as_deref(), Some("original"));
        assert_eq!(view.comments_count, 1);

        let updated = fx
            .content
            .update_caption(post.id, alice, Some("edited".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.caption.as_deref(), Some("edited"));
    }

    #[tokio::test]
    async fn test_delete_post_cascades() {
        let fx = setup().await;
        let (alice, bob) = (fx.users[0], fx.users[1]);
        let post = fx.content.create_post(alice, None, PNG_BYTES.to_vec()).await.unwrap();
        fx.content.like(post.id, bob).await.unwrap();
        fx.content.add_comment(post.id, bob, "bye").await.unwrap();

        fx.content.delete_post(post.id, alice).await.unwrap();

        assert!(matches!(
            fx.content.get_post(post.id, None).await,
            Err(PlazaError::NotFound(_))
        ));
        assert_eq!(count(&fx.pool, "SELECT COUNT(*) FROM likes WHERE post_id = ?1", post.id).await, 0);
        assert_eq!(count(&fx.pool, "SELECT COUNT(*) FROM comments WHERE post_id = ?1", post.id).await, 0);

        let posts_dir = fx.media_dir.path().join("posts");
        assert_eq!(std::fs::read_dir(posts_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_media_cleanup_fails() {
        let pool = db::create_memory_pool().await.unwrap();
        let alice = insert_user(&pool, "alice").await;
        let content = ContentManager::new(pool.clone(), Arc::new(FailingMediaStore));

        let post_id = content
            .insert_post(alice, None, Some("http://localhost:5000/media/posts/post-x.png".to_string()), None)
            .await
            .unwrap();

        content.delete_post(post_id, alice).await.unwrap();
        assert!(content.get_post(post_id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_feed_and_user_posts() {
        let fx = setup().await;
        let (alice, bob, carol) = (fx.users[0], fx.users[1], fx.users[2]);

        sqlx::query("INSERT INTO followers (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)")
            .bind(alice)
            .bind(bob)
            .bind(Utc::now())
            .execute(&fx.pool)
            .await
            .unwrap();

        let own = fx.content.create_post(alice, Some("mine".to_string()), PNG_BYTES.to_vec()).await.unwrap();
        let followed = fx.content.create_post(bob, Some("bob's".to_string()), PNG_BYTES.to_vec()).await.unwrap();
        fx.content.create_post(carol, Some("stranger".to_string()), PNG_BYTES.to_vec()).await.unwrap();

        fx.content.like(followed.id, alice).await.unwrap();

        let feed = fx.content.feed(alice, PageRequest::default()).await.unwrap();
        assert_eq!(feed.total, 2);
        assert_eq!(feed.items[0].id, followed.id);
        assert!(feed.items[0].is_liked);
        assert_eq!(feed.items[1].id, own.id);
        assert!(!feed.items[1].is_liked);

        let bobs = fx.content.list_user_posts("bob", Some(alice), PageRequest::default()).await.unwrap();
        assert_eq!(bobs.total, 1);
        assert!(bobs.items[0].is_liked);
        assert_eq!(fx.content.count_user_posts(carol).await.unwrap(), 1);

        assert!(matches!(
            fx.content.list_user_posts("nobody", None, PageRequest::default()).await,
            Err(PlazaError::NotFound(_))
        ));
    }
}
