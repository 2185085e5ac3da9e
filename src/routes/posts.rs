use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::media::stored_media;
use crate::routes::{resolve_owner, AppState};
use crate::storage::{is_valid_hash, MediaStoreError};
use crate::validate::Validate;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostQuery {
    pub id: Option<Id>,
}

/// Looks the hash up in the media store so the post carries its mime type.
async fn resolve_media(data: &AppState, hash: Option<String>) -> Result<Option<MediaRef>, ApiError> {
    let Some(hash) = hash else { return Ok(None) };
    let hash = hash.trim().to_ascii_lowercase();
    if !is_valid_hash(&hash) {
        return Err(ApiError::bad_request("media_hash must be a sha256 hex digest"));
    }
    match data.media_store.stat(&hash).await {
        Ok(mime) => Ok(Some(MediaRef { hash, mime })),
        Err(MediaStoreError::NotFound) => Err(ApiError::bad_request("media_hash does not reference an uploaded file")),
        Err(e) => {
            tracing::error!("media store stat failed: {e}");
            Err(ApiError::Internal)
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/post",
    params(PostQuery),
    responses(
        (status = 200, description = "One post when `id` is given, otherwise all", body = [Post]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn get_posts(data: web::Data<AppState>, query: web::Query<PostQuery>) -> Result<HttpResponse, ApiError> {
    match query.id {
        Some(id) => Ok(HttpResponse::Ok().json(data.repo.get_post(id).await?)),
        None => Ok(HttpResponse::Ok().json(data.repo.list_posts().await?)),
    }
}

#[utoipa::path(
    get,
    path = "/api/post/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses((status = 200, description = "Found", body = Post), (status = 404, description = "Post not found"))
)]
pub async fn get_post(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.get_post(path.into_inner()).await?))
}

#[utoipa::path(
    get,
    path = "/api/post/{id}/media",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "The attached file"),
        (status = 404, description = "Post not found or has no media")
    )
)]
pub async fn get_post_media(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post = data.repo.get_post(path.into_inner()).await?;
    let Some(hash) = post.media_hash else {
        return Err(ApiError::NotFound);
    };
    stored_media(&data, &hash).await
}

#[utoipa::path(
    post,
    path = "/api/post",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid payload, unknown location/account or media")
    ),
    security(("bearer" = []))
)]
pub async fn create_post(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    req.validate()?;
    let created_by = resolve_owner(&auth, req.created_by)?;
    let media = resolve_media(&data, req.media_hash).await?;
    let post = data
        .repo
        .create_post(NewPost {
            title: req.title.trim().to_string(),
            content: req.content,
            created_by,
            location_id: req.location_id,
            media,
        })
        .await?;
    info!(post_id = post.id, location_id = post.location_id, created_by, "post created");
    Ok(HttpResponse::Created().json(post))
}

#[utoipa::path(
    put,
    path = "/api/post/{id}",
    params(("id" = Id, Path, description = "Post id")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post replaced", body = Post),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Post not found")
    ),
    security(("bearer" = []))
)]
pub async fn replace_post(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_post(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    let req = payload.into_inner();
    req.validate()?;
    let media = resolve_media(&data, req.media_hash).await?;
    let changes = PostChanges {
        title: req.title.trim().to_string(),
        content: req.content,
        location_id: req.location_id,
        media,
    };
    Ok(HttpResponse::Ok().json(data.repo.replace_post(id, changes).await?))
}

#[utoipa::path(
    delete,
    path = "/api/post/{id}",
    params(("id" = Id, Path, description = "Post id")),
    responses((status = 204, description = "Deleted"), (status = 403, description = "Not the author"), (status = 404, description = "Post not found")),
    security(("bearer" = []))
)]
pub async fn delete_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    remove_post(&auth, &data, path.into_inner()).await
}

#[utoipa::path(
    delete,
    path = "/api/post",
    params(PostQuery),
    responses((status = 204, description = "Deleted"), (status = 400, description = "id missing"), (status = 404, description = "Post not found")),
    security(("bearer" = []))
)]
pub async fn delete_post_by_query(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<PostQuery>,
) -> Result<HttpResponse, ApiError> {
    let Some(id) = query.id else {
        return Err(ApiError::bad_request("id is required"));
    };
    remove_post(&auth, &data, id).await
}

async fn remove_post(auth: &Auth, data: &AppState, id: Id) -> Result<HttpResponse, ApiError> {
    let existing = data.repo.get_post(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    data.repo.delete_post(id).await?;
    info!(post_id = id, "post deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/account/{id}/posts",
    params(("id" = Id, Path, description = "Account id")),
    responses(
        (status = 200, description = "Posts by the account, oldest first", body = [Post]),
        (status = 404, description = "Account not found")
    )
)]
pub async fn list_account_posts(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_account_posts(path.into_inner()).await?))
}
