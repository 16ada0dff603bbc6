/// Groups: membership, roles, group posts and messages
///
/// `groups.members_count` only changes in the same transaction as the
/// `group_members` row it mirrors.

mod manager;

pub use manager::{GroupManager, GroupPatch};

use crate::{
    db::models::{Group, UserSummary},
    error::{PlazaError, PlazaResult},
    validation::validate_not_blank,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Member role within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    /// Can edit or delete the group and manage any member or content
    Admin,
    /// Can post and leave
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> PlazaResult<Self> {
        match s {
            "admin" => Ok(GroupRole::Admin),
            "member" => Ok(GroupRole::Member),
            _ => Err(PlazaError::Internal(format!("Invalid group role: {}", s))),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, GroupRole::Admin)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: Option<bool>,
}

/// Group update request; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    #[validate(length(min = 1, max = 150), custom(function = "validate_not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_private: Option<bool>,
}

impl From<UpdateGroupRequest> for GroupPatch {
    fn from(req: UpdateGroupRequest) -> Self {
        GroupPatch {
            name: req.name,
            description: req.description,
            is_private: req.is_private,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    #[validate(length(min = 1, max = 1000), custom(function = "validate_not_blank"))]
    pub message_text: String,
}

/// A group with the viewer's role in it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    #[serde(flatten)]
    pub group: Group,
    pub viewer_role: Option<GroupRole>,
}

/// A group member listing entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    #[serde(flatten)]
    pub user: UserSummary,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub(crate) struct MemberRow {
    id: i64,
    username: String,
    full_name: Option<String>,
    profile_picture_url: Option<String>,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for MemberView {
    type Error = PlazaError;

    fn try_from(row: MemberRow) -> PlazaResult<Self> {
        Ok(Self {
            user: UserSummary {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
                profile_picture_url: row.profile_picture_url,
            },
            role: GroupRole::from_str(&row.role)?,
            joined_at: row.joined_at,
        })
    }
}

/// A group chat message with its author
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub group_id: i64,
    pub message_text: String,
    pub created_at: DateTime<Utc>,
    pub author: UserSummary,
}

#[derive(Debug, FromRow)]
pub(crate) struct MessageRow {
    id: i64,
    group_id: i64,
    user_id: i64,
    message_text: String,
    created_at: DateTime<Utc>,
    author_username: String,
    author_full_name: Option<String>,
    author_profile_picture_url: Option<String>,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            group_id: row.group_id,
            message_text: row.message_text,
            created_at: row.created_at,
            author: UserSummary {
                id: row.user_id,
                username: row.author_username,
                full_name: row.author_full_name,
                profile_picture_url: row.author_profile_picture_url,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [GroupRole::Admin, GroupRole::Member] {
            assert_eq!(GroupRole::from_str(role.as_str()).unwrap(), role);
        }
        assert!(GroupRole::from_str("owner").is_err());
        assert!(GroupRole::Admin.is_admin());
        assert!(!GroupRole::Member.is_admin());
    }
}
