/// Group manager
use crate::{
    content::{ContentManager, PostView},
    db::models::Group,
    error::{PlazaError, PlazaResult},
    groups::{CreateGroupRequest, GroupRole, GroupView, MemberRow, MemberView, MessageRow, MessageView},
    media, metrics,
    pagination::{Page, PageRequest},
    validation::{validate_caption, validate_request, MESSAGE_MAX},
};
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

const GROUP_COLUMNS: &str =
    "g.id, g.name, g.description, g.is_private, g.owner_id, g.members_count, g.created_at, g.updated_at";

const MESSAGE_SELECT: &str = "SELECT m.id, m.group_id, m.user_id, m.message_text, m.created_at,
        u.username AS author_username, u.full_name AS author_full_name,
        u.profile_picture_url AS author_profile_picture_url
     FROM group_messages m JOIN users u ON u.id = m.user_id";

const MEMBER_SELECT: &str = "SELECT u.id, u.username, u.full_name, u.profile_picture_url, gm.role, gm.joined_at
     FROM group_members gm JOIN users u ON u.id = gm.user_id";

/// Partial group update; only `Some` fields are written
#[derive(Debug, Clone, Default)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl GroupPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_private.is_none()
    }
}

#[derive(Debug, FromRow)]
struct GroupListRow {
    #[sqlx(flatten)]
    group: Group,
    viewer_role: Option<String>,
}

/// Group manager service
pub struct GroupManager {
    db: SqlitePool,
    content: Arc<ContentManager>,
}

impl GroupManager {
    pub fn new(db: SqlitePool, content: Arc<ContentManager>) -> Self {
        Self { db, content }
    }

    /// Create a group with the owner as its first admin
    pub async fn create_group(&self, owner_id: i64, req: CreateGroupRequest) -> PlazaResult<GroupView> {
        validate_request(&req)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let group_id = sqlx::query(
            "INSERT INTO groups (name, description, is_private, owner_id, members_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        )
        .bind(req.name.trim())
        .bind(&req.description)
        .bind(req.is_private.unwrap_or(false))
        .bind(owner_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(group_id)
            .bind(owner_id)
            .bind(GroupRole::Admin.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE groups SET members_count = members_count + 1 WHERE id = ?1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(group_id, owner_id, "Created group");
        self.get_group(group_id, owner_id).await
    }

    /// Group details with the viewer's role; private groups are members-only
    pub async fn get_group(&self, group_id: i64, viewer: i64) -> PlazaResult<GroupView> {
        let group = self.load_group(group_id).await?;
        let viewer_role = self.role_of(group_id, viewer).await?;

        if group.is_private && viewer_role.is_none() {
            return Err(PlazaError::Forbidden("This group is private".to_string()));
        }

        Ok(GroupView { group, viewer_role })
    }

    /// Public groups plus private groups the viewer belongs to, newest first
    pub async fn list_groups(&self, viewer: i64, page: PageRequest) -> PlazaResult<Page<GroupView>> {
        const VISIBLE: &str = "(g.is_private = 0 OR gm.user_id IS NOT NULL)";
        const FROM: &str = "FROM groups g
             LEFT JOIN group_members gm ON gm.group_id = g.id AND gm.user_id = ?1";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {FROM} WHERE {VISIBLE}"))
            .bind(viewer)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, GroupListRow>(&format!(
            "SELECT {GROUP_COLUMNS}, gm.role AS viewer_role {FROM} WHERE {VISIBLE}
             ORDER BY g.created_at DESC, g.id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(viewer)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows
            .into_iter()
            .map(|row| {
                Ok(GroupView {
                    group: row.group,
                    viewer_role: row.viewer_role.as_deref().map(GroupRole::from_str).transpose()?,
                })
            })
            .collect::<PlazaResult<Vec<_>>>()?;

        Ok(Page::new(items, page, total))
    }

    /// Apply a partial update (admins only)
    pub async fn update_group(&self, group_id: i64, user_id: i64, patch: GroupPatch) -> PlazaResult<GroupView> {
        self.load_group(group_id).await?;
        self.require_admin(group_id, user_id).await?;

        if !patch.is_empty() {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE groups SET ");
            let mut fields = builder.separated(", ");

            if let Some(name) = patch.name {
                fields.push("name = ").push_bind_unseparated(name.trim().to_string());
            }
            if let Some(description) = patch.description {
                fields.push("description = ").push_bind_unseparated(description);
            }
            if let Some(is_private) = patch.is_private {
                fields.push("is_private = ").push_bind_unseparated(is_private);
            }
            fields.push("updated_at = ").push_bind_unseparated(Utc::now());

            builder.push(" WHERE id = ").push_bind(group_id);
            builder.build().execute(&self.db).await?;
        }

        self.get_group(group_id, user_id).await
    }

    /// Delete a group (admins only); its posts, members and messages cascade
    pub async fn delete_group(&self, group_id: i64, user_id: i64) -> PlazaResult<()> {
        self.load_group(group_id).await?;
        self.require_admin(group_id, user_id).await?;

        // Posts go first so the image list and the delete see the same rows
        let mut tx = self.db.begin().await?;

        let image_urls: Vec<Option<String>> =
            sqlx::query_scalar("DELETE FROM posts WHERE group_id = ?1 RETURNING image_url")
                .bind(group_id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM groups WHERE id = ?1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let image_urls: Vec<String> = image_urls.into_iter().flatten().collect();

        tracing::info!(group_id, user_id, images = image_urls.len(), "Deleted group");

        for url in &image_urls {
            media::delete_quietly(self.content.media(), Some(url)).await;
        }

        Ok(())
    }

    /// Join a public group; joining twice is a no-op
    pub async fn join_group(&self, user_id: i64, group_id: i64) -> PlazaResult<GroupView> {
        let group = self.load_group(group_id).await?;
        if group.is_private {
            return Err(PlazaError::Forbidden("This group is private".to_string()));
        }

        if self.insert_membership(group_id, user_id, GroupRole::Member).await? {
            tracing::debug!(group_id, user_id, "Joined group");
        }

        self.get_group(group_id, user_id).await
    }

    /// Add an existing user to a group (admins only, any privacy)
    pub async fn add_member(&self, group_id: i64, admin_id: i64, target_user_id: i64) -> PlazaResult<MemberView> {
        self.load_group(group_id).await?;
        self.require_admin(group_id, admin_id).await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND is_active = 1)")
            .bind(target_user_id)
            .fetch_one(&self.db)
            .await?;
        if !exists {
            return Err(PlazaError::NotFound("User not found".to_string()));
        }

        self.insert_membership(group_id, target_user_id, GroupRole::Member).await?;
        self.member(group_id, target_user_id).await
    }

    /// Remove a member; admins may remove anyone, members only themselves
    pub async fn remove_member(&self, group_id: i64, member_id: i64, requester_id: i64) -> PlazaResult<()> {
        let group = self.load_group(group_id).await?;

        if member_id != requester_id {
            self.require_admin(group_id, requester_id).await?;
        }
        if member_id == group.owner_id {
            return Err(PlazaError::Forbidden("The group owner cannot be removed".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let result = sqlx::query("DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2")
            .bind(group_id)
            .bind(member_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(PlazaError::NotFound("Member not found".to_string()));
        }

        sqlx::query("UPDATE groups SET members_count = MAX(members_count - 1, 0) WHERE id = ?1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(group_id, member_id, requester_id, "Removed group member");
        Ok(())
    }

    /// Members in join order
    pub async fn list_members(&self, group_id: i64, viewer: i64, page: PageRequest) -> PlazaResult<Page<MemberView>> {
        let group = self.get_group(group_id, viewer).await?.group;

        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "{MEMBER_SELECT} WHERE gm.group_id = ?1
             ORDER BY gm.joined_at ASC, gm.id ASC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(group_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let items = rows
            .into_iter()
            .map(MemberView::try_from)
            .collect::<PlazaResult<Vec<_>>>()?;

        Ok(Page::new(items, page, group.members_count))
    }

    // ========== Group posts ==========

    /// Post into a group; members only, image optional
    pub async fn create_group_post(
        &self,
        group_id: i64,
        user_id: i64,
        caption: Option<String>,
        image: Option<Vec<u8>>,
    ) -> PlazaResult<PostView> {
        let caption = caption.filter(|c| !c.trim().is_empty());
        validate_caption(caption.as_deref())?;

        let image = match image {
            Some(data) => {
                let format = media::detect_image_format(&data, "image")?;
                Some((data, format))
            }
            None => None,
        };
        if caption.is_none() && image.is_none() {
            return Err(PlazaError::invalid("caption", "A post needs a caption or an image"));
        }

        self.load_group(group_id).await?;
        self.require_member(group_id, user_id).await?;

        let image_url = match image {
            Some((data, format)) => Some(
                self.content
                    .upload_image(data, format, media::GROUP_POSTS_FOLDER)
                    .await?,
            ),
            None => None,
        };

        let post_id = self
            .content
            .insert_post(user_id, caption, image_url, Some(group_id))
            .await?;

        metrics::POSTS_CREATED_TOTAL.with_label_values(&["group"]).inc();
        tracing::info!(post_id, group_id, user_id, "Created group post");

        self.content.get_post(post_id, Some(user_id)).await
    }

    pub async fn list_group_posts(&self, group_id: i64, viewer: i64, page: PageRequest) -> PlazaResult<Page<PostView>> {
        self.load_group(group_id).await?;
        self.require_member(group_id, viewer).await?;

        self.content.list_group_posts(group_id, viewer, page).await
    }

    /// Delete a group post; allowed for its author or a group admin
    pub async fn delete_group_post(&self, group_id: i64, post_id: i64, user_id: i64) -> PlazaResult<()> {
        self.load_group(group_id).await?;

        let post = self.content.load_post(post_id).await?;
        if post.group_id != Some(group_id) {
            return Err(PlazaError::NotFound("Post not found".to_string()));
        }

        if post.user_id != user_id {
            let role = self.role_of(group_id, user_id).await?;
            if !role.map(|r| r.is_admin()).unwrap_or(false) {
                return Err(PlazaError::Forbidden(
                    "Only the author or a group admin can delete this post".to_string(),
                ));
            }
        }

        self.content.remove_post(&post).await
    }

    // ========== Messages ==========

    pub async fn post_message(&self, group_id: i64, user_id: i64, text: &str) -> PlazaResult<MessageView> {
        let text = text.trim();
        if text.is_empty() || text.chars().count() as u64 > MESSAGE_MAX {
            return Err(PlazaError::invalid(
                "messageText",
                format!("Message must be between 1 and {} characters", MESSAGE_MAX),
            ));
        }

        self.load_group(group_id).await?;
        self.require_member(group_id, user_id).await?;

        let message_id = sqlx::query(
            "INSERT INTO group_messages (group_id, user_id, message_text, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(text)
        .bind(Utc::now())
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        let row = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"))
            .bind(message_id)
            .fetch_one(&self.db)
            .await?;

        Ok(row.into())
    }

    /// Messages newest first
    pub async fn list_messages(&self, group_id: i64, viewer: i64, page: PageRequest) -> PlazaResult<Page<MessageView>> {
        self.load_group(group_id).await?;
        self.require_member(group_id, viewer).await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_messages WHERE group_id = ?1")
            .bind(group_id)
            .fetch_one(&self.db)
            .await?;

        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{MESSAGE_SELECT} WHERE m.group_id = ?1
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ?2 OFFSET ?3"
        ))
        .bind(group_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(MessageView::from).collect(), page, total))
    }

    /// Delete a message; allowed for its author or a group admin
    pub async fn delete_message(&self, group_id: i64, message_id: i64, user_id: i64) -> PlazaResult<()> {
        self.load_group(group_id).await?;

        let author: i64 =
            sqlx::query_scalar("SELECT user_id FROM group_messages WHERE id = ?1 AND group_id = ?2")
                .bind(message_id)
                .bind(group_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| PlazaError::NotFound("Message not found".to_string()))?;

        if author != user_id {
            let role = self.role_of(group_id, user_id).await?;
            if !role.map(|r| r.is_admin()).unwrap_or(false) {
                return Err(PlazaError::Forbidden(
                    "Only the author or a group admin can delete this message".to_string(),
                ));
            }
        }

        sqlx::query("DELETE FROM group_messages WHERE id = ?1")
            .bind(message_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    // ========== Helpers ==========

    async fn load_group(&self, group_id: i64) -> PlazaResult<Group> {
        sqlx::query_as::<_, Group>(&format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE g.id = ?1"))
            .bind(group_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| PlazaError::NotFound("Group not found".to_string()))
    }

    pub async fn role_of(&self, group_id: i64, user_id: i64) -> PlazaResult<Option<GroupRole>> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM group_members WHERE group_id = ?1 AND user_id = ?2")
                .bind(group_id)
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        role.as_deref().map(GroupRole::from_str).transpose()
    }

    async fn require_member(&self, group_id: i64, user_id: i64) -> PlazaResult<GroupRole> {
        self.role_of(group_id, user_id)
            .await?
            .ok_or_else(|| PlazaError::Forbidden("You are not a member of this group".to_string()))
    }

    async fn require_admin(&self, group_id: i64, user_id: i64) -> PlazaResult<()> {
        match self.role_of(group_id, user_id).await? {
            Some(role) if role.is_admin() => Ok(()),
            _ => Err(PlazaError::Forbidden("Only group admins can do this".to_string())),
        }
    }

    /// Insert a membership unless one exists; returns whether a row was added
    async fn insert_membership(&self, group_id: i64, user_id: i64, role: GroupRole) -> PlazaResult<bool> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (group_id, user_id) DO NOTHING",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            sqlx::query("UPDATE groups SET members_count = members_count + 1 WHERE id = ?1")
                .bind(group_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn member(&self, group_id: i64, user_id: i64) -> PlazaResult<MemberView> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "{MEMBER_SELECT} WHERE gm.group_id = ?1 AND gm.user_id = ?2"
        ))
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        MemberView::try_from(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, media::DiskMediaStore};

    const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    struct Fixture {
        groups: GroupManager,
        content: Arc<ContentManager>,
        pool: SqlitePool,
        media_dir: tempfile::TempDir,
        users: Vec<i64>,
    }

    async fn setup() -> Fixture {
        let pool = db::create_memory_pool().await.unwrap();
        let media_dir = tempfile::tempdir().unwrap();
        let store = DiskMediaStore::new(media_dir.path().to_path_buf(), "http://localhost:5000");
        let content = Arc::new(ContentManager::new(pool.clone(), Arc::new(store)));

        let mut users = Vec::new();
        for name in ["owner", "member", "outsider"] {
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
            users.push(id);
        }

        Fixture {
            groups: GroupManager::new(pool.clone(), content.clone()),
            content,
            pool,
            media_dir,
            users,
        }
    }

    fn group_request(name: &str, is_private: bool) -> CreateGroupRequest {
        CreateGroupRequest {
            name: name.to_string(),
            description: Some("A place to talk".to_string()),
            is_private: Some(is_private),
        }
    }

    async fn member_rows(pool: &SqlitePool, group_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = ?1")
            .bind(group_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_group_makes_owner_admin() {
        let fx = setup().await;
        let owner = fx.users[0];

        let view = fx.groups.create_group(owner, group_request("Rustaceans", false)).await.unwrap();
        assert_eq!(view.group.members_count, 1);
        assert_eq!(view.viewer_role, Some(GroupRole::Admin));
        assert_eq!(member_rows(&fx.pool, view.group.id).await, 1);

        let blank = fx.groups.create_group(owner, group_request("   ", false)).await;
        assert!(matches!(blank, Err(PlazaError::Validation(_))));
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_private_is_refused() {
        let fx = setup().await;
        let (owner, member, outsider) = (fx.users[0], fx.users[1], fx.users[2]);

        let public = fx.groups.create_group(owner, group_request("Open", false)).await.unwrap();
        let private = fx.groups.create_group(owner, group_request("Closed", true)).await.unwrap();

        fx.groups.join_group(member, public.group.id).await.unwrap();
        let again = fx.groups.join_group(member, public.group.id).await.unwrap();
        assert_eq!(again.group.members_count, 2);
        assert_eq!(member_rows(&fx.pool, public.group.id).await, 2);

        assert!(matches!(
            fx.groups.join_group(outsider, private.group.id).await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.groups.get_group(private.group.id, outsider).await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.groups.join_group(outsider, 999).await,
            Err(PlazaError::NotFound(_))
        ));

        // Admins can still add to a private group
        let added = fx.groups.add_member(private.group.id, owner, outsider).await.unwrap();
        assert_eq!(added.role, GroupRole::Member);
        let view = fx.groups.get_group(private.group.id, outsider).await.unwrap();
        assert_eq!(view.group.members_count, 2);
        assert_eq!(view.viewer_role, Some(GroupRole::Member));
    }

    #[tokio::test]
    async fn test_members_count_tracks_rows() {
        let fx = setup().await;
        let (owner, member, outsider) = (fx.users[0], fx.users[1], fx.users[2]);
        let group_id = fx.groups.create_group(owner, group_request("Club", false)).await.unwrap().group.id;

        fx.groups.join_group(member, group_id).await.unwrap();
        fx.groups.join_group(outsider, group_id).await.unwrap();
        fx.groups.remove_member(group_id, outsider, outsider).await.unwrap();
        assert!(matches!(
            fx.groups.remove_member(group_id, outsider, outsider).await,
            Err(PlazaError::Forbidden(_)) | Err(PlazaError::NotFound(_))
        ));

        // Members cannot remove others
        assert!(matches!(
            fx.groups.remove_member(group_id, owner, member).await,
            Err(PlazaError::Forbidden(_))
        ));
        fx.groups.remove_member(group_id, member, owner).await.unwrap();

        let view = fx.groups.get_group(group_id, owner).await.unwrap();
        assert_eq!(view.group.members_count, member_rows(&fx.pool, group_id).await);
        assert_eq!(view.group.members_count, 1);

        let members = fx.groups.list_members(group_id, owner, PageRequest::default()).await.unwrap();
        assert_eq!(members.total, 1);
        assert_eq!(members.items[0].role, GroupRole::Admin);
    }

    #[tokio::test]
    async fn test_update_requires_admin() {
        let fx = setup().await;
        let (owner, member) = (fx.users[0], fx.users[1]);
        let group_id = fx.groups.create_group(owner, group_request("Before", false)).await.unwrap().group.id;
        fx.groups.join_group(member, group_id).await.unwrap();

        let patch = GroupPatch {
            name: Some("After".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.groups.update_group(group_id, member, patch.clone()).await,
            Err(PlazaError::Forbidden(_))
        ));

        let updated = fx.groups.update_group(group_id, owner, patch).await.unwrap();
        assert_eq!(updated.group.name, "After");
        assert_eq!(updated.group.description.as_deref(), Some("A place to talk"));
        assert!(!updated.group.is_private);
    }

    #[tokio::test]
    async fn test_group_posts_require_membership() {
        let fx = setup().await;
        let (owner, member, outsider) = (fx.users[0], fx.users[1], fx.users[2]);
        let group_id = fx.groups.create_group(owner, group_request("Photos", true)).await.unwrap().group.id;
        fx.groups.add_member(group_id, owner, member).await.unwrap();

        let post = fx
            .groups
            .create_group_post(group_id, member, Some("group hello".to_string()), Some(PNG_BYTES.to_vec()))
            .await
            .unwrap();
        assert_eq!(post.group_id, Some(group_id));
        assert!(post.image_url.unwrap().contains("/media/group-posts/"));

        let text_only = fx
            .groups
            .create_group_post(group_id, owner, Some("no image".to_string()), None)
            .await
            .unwrap();
        assert!(text_only.image_url.is_none());

        assert!(matches!(
            fx.groups.create_group_post(group_id, outsider, Some("hi".to_string()), None).await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.groups.create_group_post(group_id, member, None, None).await,
            Err(PlazaError::Validation(_))
        ));

        let listed = fx.groups.list_group_posts(group_id, member, PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 2);
        assert_eq!(listed.items[0].id, text_only.id);
        assert!(fx.groups.list_group_posts(group_id, outsider, PageRequest::default()).await.is_err());

        // Private group posts stay out of the author's profile and hidden from outsiders
        assert_eq!(fx.content.count_user_posts(member).await.unwrap(), 0);
        assert!(matches!(
            fx.content.get_post(post.id, Some(outsider)).await,
            Err(PlazaError::NotFound(_))
        ));
        assert!(fx.content.get_post(post.id, Some(owner)).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_group_post_by_author_or_admin() {
        let fx = setup().await;
        let (owner, member, outsider) = (fx.users[0], fx.users[1], fx.users[2]);
        let group_id = fx.groups.create_group(owner, group_request("Mods", false)).await.unwrap().group.id;
        fx.groups.join_group(member, group_id).await.unwrap();
        fx.groups.join_group(outsider, group_id).await.unwrap();

        let first = fx
            .groups
            .create_group_post(group_id, member, Some("one".to_string()), None)
            .await
            .unwrap();
        let second = fx
            .groups
            .create_group_post(group_id, member, Some("two".to_string()), None)
            .await
            .unwrap();

        assert!(matches!(
            fx.groups.delete_group_post(group_id, first.id, outsider).await,
            Err(PlazaError::Forbidden(_))
        ));
        fx.groups.delete_group_post(group_id, first.id, member).await.unwrap();
        fx.groups.delete_group_post(group_id, second.id, owner).await.unwrap();

        let listed = fx.groups.list_group_posts(group_id, owner, PageRequest::default()).await.unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_messages() {
        let fx = setup().await;
        let (owner, member, outsider) = (fx.users[0], fx.users[1], fx.users[2]);
        let group_id = fx.groups.create_group(owner, group_request("Chat", false)).await.unwrap().group.id;
        fx.groups.join_group(member, group_id).await.unwrap();

        let first = fx.groups.post_message(group_id, member, "hello all").await.unwrap();
        fx.groups.post_message(group_id, owner, "welcome").await.unwrap();
        assert_eq!(first.author.username, "member");

        assert!(matches!(
            fx.groups.post_message(group_id, outsider, "let me in").await,
            Err(PlazaError::Forbidden(_))
        ));
        assert!(matches!(
            fx.groups.post_message(group_id, member, "  ").await,
            Err(PlazaError::Validation(_))
        ));

        let page = fx.groups.list_messages(group_id, member, PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].message_text, "welcome");

        fx.groups.delete_message(group_id, first.id, owner).await.unwrap();
        assert!(matches!(
            fx.groups.delete_message(group_id, first.id, owner).await,
            Err(PlazaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_group_cascades() {
        let fx = setup().await;
        let (owner, member) = (fx.users[0], fx.users[1]);
        let group_id = fx.groups.create_group(owner, group_request("Temp", false)).await.unwrap().group.id;
        fx.groups.join_group(member, group_id).await.unwrap();
        fx.groups
            .create_group_post(group_id, member, None, Some(PNG_BYTES.to_vec()))
            .await
            .unwrap();
        fx.groups
            .create_group_post(group_id, owner, Some("text only".to_string()), None)
            .await
            .unwrap();
        fx.groups.post_message(group_id, member, "bye").await.unwrap();

        let images_dir = fx.media_dir.path().join(media::GROUP_POSTS_FOLDER);
        assert_eq!(std::fs::read_dir(&images_dir).unwrap().count(), 1);

        assert!(matches!(
            fx.groups.delete_group(group_id, member).await,
            Err(PlazaError::Forbidden(_))
        ));
        fx.groups.delete_group(group_id, owner).await.unwrap();

        let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts").fetch_one(&fx.pool).await.unwrap();
        assert_eq!(posts, 0);
        assert_eq!(member_rows(&fx.pool, group_id).await, 0);
        assert_eq!(std::fs::read_dir(&images_dir).unwrap().count(), 0);
        assert!(matches!(
            fx.groups.get_group(group_id, owner).await,
            Err(PlazaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_groups_hides_foreign_private_groups() {
        let fx = setup().await;
        let (owner, outsider) = (fx.users[0], fx.users[2]);
        fx.groups.create_group(owner, group_request("Public", false)).await.unwrap();
        fx.groups.create_group(owner, group_request("Secret", true)).await.unwrap();

        let mine = fx.groups.list_groups(owner, PageRequest::default()).await.unwrap();
        assert_eq!(mine.total, 2);
        assert_eq!(mine.items[0].viewer_role, Some(GroupRole::Admin));

        let theirs = fx.groups.list_groups(outsider, PageRequest::default()).await.unwrap();
        assert_eq!(theirs.total, 1);
        assert_eq!(theirs.items[0].group.name, "Public");
        assert_eq!(theirs.items[0].viewer_role, None);
    }
}
