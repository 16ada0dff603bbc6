/// /api/posts endpoints: posts, likes, comments, feed
use crate::{
    api::{
        extract::{ImageForm, JsonBody},
        response::{listing, ApiResponse},
    },
    auth::{AuthUser, OptionalAuthUser},
    content::{CommentView, CreateCommentRequest, LikeState, PostView, UpdateCaptionRequest},
    context::AppContext,
    error::PlazaResult,
    pagination::{PageQuery, DEFAULT_LIMIT},
    validation::validate_request,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{delete, get, post},
    Router,
};
use serde_json::Value;

/// Build post routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/posts", post(create_post))
        .route("/api/posts/feed/timeline", get(feed))
        .route("/api/posts/user/:username", get(list_user_posts))
        .route("/api/posts/:id", get(get_post).put(update_post).delete(delete_post))
        .route("/api/posts/:id/like", post(like_post).delete(unlike_post))
        .route("/api/posts/:id/comments", post(add_comment).get(list_comments))
        .route("/api/posts/:id/comments/:comment_id", delete(delete_comment))
}

async fn create_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    multipart: Multipart,
) -> PlazaResult<ApiResponse<PostView>> {
    let mut form = ImageForm::read(multipart, ctx.config.media.max_upload_bytes).await?;
    let image = form.require_image()?;

    let post = ctx.content.create_post(auth.id(), form.caption, image).await?;
    Ok(ApiResponse::created("Post created successfully", post))
}

async fn feed(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let posts = ctx.content.feed(auth.id(), page.resolve(DEFAULT_LIMIT)).await?;
    Ok(ApiResponse::ok("Feed retrieved", listing("posts", Some("totalPosts"), posts)))
}

async fn list_user_posts(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthUser,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let posts = ctx
        .content
        .list_user_posts(&username, viewer.id(), page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Posts retrieved", listing("posts", Some("totalPosts"), posts)))
}

async fn get_post(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthUser,
    Path(post_id): Path<i64>,
) -> PlazaResult<ApiResponse<PostView>> {
    let post = ctx.content.get_post(post_id, viewer.id()).await?;
    Ok(ApiResponse::ok("Post retrieved", post))
}

async fn update_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
    JsonBody(req): JsonBody<UpdateCaptionRequest>,
) -> PlazaResult<ApiResponse<PostView>> {
    validate_request(&req)?;

    let post = ctx.content.update_caption(post_id, auth.id(), req.caption).await?;
    Ok(ApiResponse::ok("Post updated successfully", post))
}

async fn delete_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.content.delete_post(post_id, auth.id()).await?;
    Ok(ApiResponse::message("Post deleted successfully"))
}

async fn like_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
) -> PlazaResult<ApiResponse<LikeState>> {
    let state = ctx.content.like(post_id, auth.id()).await?;
    Ok(ApiResponse::ok("Post liked", state))
}

async fn unlike_post(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
) -> PlazaResult<ApiResponse<LikeState>> {
    let state = ctx.content.unlike(post_id, auth.id()).await?;
    Ok(ApiResponse::ok("Post unliked", state))
}

async fn add_comment(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(post_id): Path<i64>,
    JsonBody(req): JsonBody<CreateCommentRequest>,
) -> PlazaResult<ApiResponse<CommentView>> {
    validate_request(&req)?;

    let comment = ctx.content.add_comment(post_id, auth.id(), &req.comment_text).await?;
    Ok(ApiResponse::created("Comment added successfully", comment))
}

async fn list_comments(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthUser,
    Path(post_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let comments = ctx
        .content
        .list_comments(post_id, viewer.id(), page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok(
        "Comments retrieved",
        listing("comments", Some("totalComments"), comments),
    ))
}

async fn delete_comment(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.content.delete_comment(post_id, comment_id, auth.id()).await?;
    Ok(ApiResponse::message("Comment deleted successfully"))
}
