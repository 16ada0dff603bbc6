/// /api/groups endpoints
use crate::{
    api::{
        extract::{ImageForm, JsonBody},
        response::{listing, ApiResponse},
    },
    auth::AuthUser,
    content::PostView,
    context::AppContext,
    error::PlazaResult,
    groups::{AddMemberRequest, CreateGroupRequest, CreateMessageRequest, GroupView, MemberView, MessageView, UpdateGroupRequest},
    pagination::{PageQuery, DEFAULT_LIMIT, DEFAULT_MEMBER_LIMIT},
    validation::validate_request,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, post},
    Router,
};
use serde_json::Value;

/// Build group routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/groups", post(create_group).get(list_groups))
        .route("/api/groups/:id", get(get_group).put(update_group).delete(delete_group))
        .route("/api/groups/:id/join", post(join_group))
        .route("/api/groups/:id/members", get(list_members).post(add_member))
        .route("/api/groups/:id/members/:user_id", delete(remove_member))
        .route("/api/groups/:id/posts", post(create_group_post).get(list_group_posts))
        .route("/api/groups/:id/posts/:post_id", delete(delete_group_post))
        .route("/api/groups/:id/messages", post(post_message).get(list_messages))
        .route("/api/groups/:id/messages/:message_id", delete(delete_message))
}

async fn create_group(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    JsonBody(req): JsonBody<CreateGroupRequest>,
) -> PlazaResult<ApiResponse<GroupView>> {
    let group = ctx.groups.create_group(auth.id(), req).await?;
    Ok(ApiResponse::created("Group created successfully", group))
}

async fn list_groups(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let groups = ctx.groups.list_groups(auth.id(), page.resolve(DEFAULT_LIMIT)).await?;
    Ok(ApiResponse::ok("Groups retrieved", listing("groups", None, groups)))
}

async fn get_group(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> PlazaResult<ApiResponse<GroupView>> {
    let group = ctx.groups.get_group(group_id, auth.id()).await?;
    Ok(ApiResponse::ok("Group retrieved", group))
}

async fn update_group(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    JsonBody(req): JsonBody<UpdateGroupRequest>,
) -> PlazaResult<ApiResponse<GroupView>> {
    validate_request(&req)?;

    let group = ctx.groups.update_group(group_id, auth.id(), req.into()).await?;
    Ok(ApiResponse::ok("Group updated successfully", group))
}

async fn delete_group(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.groups.delete_group(group_id, auth.id()).await?;
    Ok(ApiResponse::message("Group deleted successfully"))
}

async fn join_group(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
) -> PlazaResult<ApiResponse<GroupView>> {
    let group = ctx.groups.join_group(auth.id(), group_id).await?;
    Ok(ApiResponse::ok("Joined group successfully", group))
}

async fn list_members(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let members = ctx
        .groups
        .list_members(group_id, auth.id(), page.resolve(DEFAULT_MEMBER_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Members retrieved", listing("members", None, members)))
}

async fn add_member(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    JsonBody(req): JsonBody<AddMemberRequest>,
) -> PlazaResult<ApiResponse<MemberView>> {
    validate_request(&req)?;

    let member = ctx.groups.add_member(group_id, auth.id(), req.user_id).await?;
    Ok(ApiResponse::created("Member added successfully", member))
}

async fn remove_member(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path((group_id, user_id)): Path<(i64, i64)>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.groups.remove_member(group_id, user_id, auth.id()).await?;
    Ok(ApiResponse::message("Member removed successfully"))
}

async fn create_group_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    multipart: Multipart,
) -> PlazaResult<ApiResponse<PostView>> {
    let form = ImageForm::read(multipart, ctx.config.media.max_upload_bytes).await?;

    let post = ctx
        .groups
        .create_group_post(group_id, auth.id(), form.caption, form.image)
        .await?;
    Ok(ApiResponse::created("Group post created successfully", post))
}

async fn list_group_posts(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let posts = ctx
        .groups
        .list_group_posts(group_id, auth.id(), page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Group posts retrieved", listing("posts", Some("totalPosts"), posts)))
}

async fn delete_group_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path((group_id, post_id)): Path<(i64, i64)>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.groups.delete_group_post(group_id, post_id, auth.id()).await?;
    Ok(ApiResponse::message("Group post deleted successfully"))
}

async fn post_message(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    JsonBody(req): JsonBody<CreateMessageRequest>,
) -> PlazaResult<ApiResponse<MessageView>> {
    validate_request(&req)?;

    let message = ctx.groups.post_message(group_id, auth.id(), &req.message_text).await?;
    Ok(ApiResponse::created("Message sent", message))
}

async fn list_messages(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(group_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let messages = ctx
        .groups
        .list_messages(group_id, auth.id(), page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Messages retrieved", listing("messages", None, messages)))
}

async fn delete_message(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path((group_id, message_id)): Path<(i64, i64)>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.groups.delete_message(group_id, message_id, auth.id()).await?;
    Ok(ApiResponse::message("Message deleted successfully"))
}
