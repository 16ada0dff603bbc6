/// /api/users endpoints: profiles, follows, search
use crate::{
    account::{ChangePasswordRequest, OwnProfile, PublicProfile, UpdateProfileRequest},
    api::{
        extract::{ImageForm, JsonBody},
        response::{listing, ApiResponse},
    },
    auth::{AuthUser, OptionalAuthUser},
    context::AppContext,
    db::models::UserSummary,
    error::{PlazaError, PlazaResult},
    media,
    pagination::{PageQuery, DEFAULT_LIMIT},
    validation::validate_request,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::Value;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/users/profile", get(get_own_profile).put(update_profile))
        .route("/api/users/profile/picture", put(update_profile_picture))
        .route("/api/users/change-password", put(change_password))
        .route("/api/users/search", get(search_users))
        .route("/api/users/:username", get(get_profile))
        .route("/api/users/:username/follow", post(follow).delete(unfollow))
        .route("/api/users/:username/followers", get(list_followers))
        .route("/api/users/:username/following", get(list_following))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

async fn get_own_profile(auth: AuthUser) -> ApiResponse<OwnProfile> {
    ApiResponse::ok("Profile retrieved", OwnProfile::from(&auth.0))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> PlazaResult<ApiResponse<OwnProfile>> {
    validate_request(&req)?;

    let user = ctx.accounts.update_profile(auth.id(), req.into()).await?;
    Ok(ApiResponse::ok("Profile updated successfully", OwnProfile::from(&user)))
}

async fn update_profile_picture(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    multipart: Multipart,
) -> PlazaResult<ApiResponse<OwnProfile>> {
    let image = ImageForm::read(multipart, ctx.config.media.max_upload_bytes).await?.require_image()?;
    let format = media::detect_image_format(&image, "image")?;

    let url = ctx
        .content
        .upload_image(image, format, media::PROFILES_FOLDER)
        .await?;
    let (user, previous) = match ctx.accounts.set_profile_picture(auth.id(), url.clone()).await {
        Ok(updated) => updated,
        Err(e) => {
            media::delete_quietly(ctx.media.as_ref(), Some(&url)).await;
            return Err(e);
        }
    };

    media::delete_quietly(ctx.media.as_ref(), previous.as_deref()).await;

    Ok(ApiResponse::ok("Profile picture updated", OwnProfile::from(&user)))
}

/// Change password and sign out every device
async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> PlazaResult<ApiResponse<()>> {
    validate_request(&req)?;

    ctx.accounts
        .change_password(auth.id(), &req.current_password, &req.new_password)
        .await?;
    ctx.tokens.revoke_all(auth.id()).await?;

    Ok(ApiResponse::message("Password changed successfully"))
}

async fn search_users(
    State(ctx): State<AppContext>,
    Query(query): Query<SearchQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| PlazaError::invalid("q", "Search query is required"))?;

    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .resolve(DEFAULT_LIMIT);

    let results = ctx.accounts.search(term, page).await?;
    Ok(ApiResponse::ok("Users retrieved", listing("users", None, results)))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    viewer: OptionalAuthUser,
    Path(username): Path<String>,
) -> PlazaResult<ApiResponse<PublicProfile>> {
    let user = ctx.accounts.get_by_username(&username).await?;
    let (followers_count, following_count) = ctx.graph.counts(user.id).await?;
    let posts_count = ctx.content.count_user_posts(user.id).await?;

    let is_following = match viewer.id() {
        Some(viewer_id) if viewer_id != user.id => Some(ctx.graph.is_following(viewer_id, user.id).await?),
        Some(_) => Some(false),
        None => None,
    };

    Ok(ApiResponse::ok(
        "Profile retrieved",
        PublicProfile {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            bio: user.bio,
            profile_picture_url: user.profile_picture_url,
            is_verified: user.is_verified,
            created_at: user.created_at,
            followers_count,
            following_count,
            posts_count,
            is_following,
        },
    ))
}

async fn follow(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> PlazaResult<ApiResponse<UserSummary>> {
    let target = ctx.graph.follow(auth.id(), &username).await?;
    Ok(ApiResponse::created(format!("You are now following {}", target.username), target))
}

async fn unfollow(
    State(ctx): State<AppContext>,
    auth: AuthUser,
    Path(username): Path<String>,
) -> PlazaResult<ApiResponse<()>> {
    ctx.graph.unfollow(auth.id(), &username).await?;
    Ok(ApiResponse::message(format!("You unfollowed {}", username)))
}

async fn list_followers(
    State(ctx): State<AppContext>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let followers = ctx
        .graph
        .list_followers(&username, page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Followers retrieved", listing("followers", None, followers)))
}

async fn list_following(
    State(ctx): State<AppContext>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> PlazaResult<ApiResponse<Value>> {
    let following = ctx
        .graph
        .list_following(&username, page.resolve(DEFAULT_LIMIT))
        .await?;
    Ok(ApiResponse::ok("Following retrieved", listing("following", None, following)))
}
