/// Posts, likes and comments
///
/// Counter columns on `posts` (`likes_count`, `comments_count`) only change
/// inside the same transaction as the like/comment row they mirror.

mod manager;

pub use manager::ContentManager;

use crate::{db::models::UserSummary, validation::validate_not_blank};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Caption edit request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCaptionRequest {
    #[validate(length(max = 2200))]
    pub caption: Option<String>,
}

/// New comment request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 500), custom(function = "validate_not_blank"))]
    pub comment_text: String,
}

/// A post with its author and the viewer's like state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: i64,
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub likes_count: i64,
    pub comments_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: UserSummary,
    pub is_liked: bool,
}

/// Flat row shape of a post joined with its author
#[derive(Debug, FromRow)]
pub(crate) struct PostRow {
    id: i64,
    user_id: i64,
    caption: Option<String>,
    image_url: Option<String>,
    likes_count: i64,
    comments_count: i64,
    group_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    author_full_name: Option<String>,
    author_profile_picture_url: Option<String>,
    is_liked: bool,
}

impl From<PostRow> for PostView {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            caption: row.caption,
            image_url: row.image_url,
            likes_count: row.likes_count,
            comments_count: row.comments_count,
            group_id: row.group_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author: UserSummary {
                id: row.user_id,
                username: row.author_username,
                full_name: row.author_full_name,
                profile_picture_url: row.author_profile_picture_url,
            },
            is_liked: row.is_liked,
        }
    }
}

/// A comment with its author
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: UserSummary,
}

#[derive(Debug, FromRow)]
pub(crate) struct CommentRow {
    id: i64,
    user_id: i64,
    post_id: i64,
    comment_text: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_username: String,
    author_full_name: Option<String>,
    author_profile_picture_url: Option<String>,
}

impl From<CommentRow> for CommentView {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            comment_text: row.comment_text,
            created_at: row.created_at,
            updated_at: row.updated_at,
            author: UserSummary {
                id: row.user_id,
                username: row.author_username,
                full_name: row.author_full_name,
                profile_picture_url: row.author_profile_picture_url,
            },
        }
    }
}

/// Like state after a like/unlike
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: i64,
}
