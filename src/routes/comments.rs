//! Comment threads and likes hanging off posts.

use actix_web::{web, HttpResponse};
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;
use crate::validate::Validate;

/// The comment, provided it sits under `post_id`.
async fn comment_on(data: &AppState, post_id: Id, comment_id: Id) -> Result<Comment, ApiError> {
    let comment = data.repo.get_comment(comment_id).await?;
    if comment.post_id != post_id {
        return Err(ApiError::NotFound);
    }
    Ok(comment)
}

#[utoipa::path(
    get,
    path = "/api/post/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Comments and replies, oldest first", body = [Comment]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_post_comments(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_post_comments(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/post/{id}/comments",
    params(("id" = Id, Path, description = "Post id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 400, description = "Blank content or parent not on this post"),
        (status = 404, description = "Post not found")
    ),
    security(("bearer" = []))
)]
pub async fn create_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    req.validate()?;
    let comment = data
        .repo
        .create_comment(NewComment {
            post_id: path.into_inner(),
            created_by: auth.account_id()?,
            parent_id: req.parent_id,
            content: req.content.trim().to_string(),
        })
        .await?;
    info!(comment_id = comment.id, post_id = comment.post_id, parent_id = ?comment.parent_id, "comment created");
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    delete,
    path = "/api/post/{id}/comments/{comment_id}",
    params(("id" = Id, Path, description = "Post id"), ("comment_id" = Id, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Deleted with its replies"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Comment not found under this post")
    ),
    security(("bearer" = []))
)]
pub async fn delete_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (post_id, comment_id) = path.into_inner();
    let comment = comment_on(&data, post_id, comment_id).await?;
    auth.ensure_self_or_admin(comment.created_by)?;
    data.repo.delete_comment(comment_id).await?;
    info!(comment_id, post_id, "comment deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/post/{id}/comments/{comment_id}/like",
    params(("id" = Id, Path, description = "Post id"), ("comment_id" = Id, Path, description = "Comment id")),
    responses(
        (status = 201, description = "Liked; the comment with its new count", body = Comment),
        (status = 404, description = "Comment not found under this post"),
        (status = 409, description = "Already liked")
    ),
    security(("bearer" = []))
)]
pub async fn like_comment(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (post_id, comment_id) = path.into_inner();
    comment_on(&data, post_id, comment_id).await?;
    let comment = data.repo.like_comment(comment_id, auth.account_id()?).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    get,
    path = "/api/account/{id}/comments",
    params(("id" = Id, Path, description = "Account id")),
    responses(
        (status = 200, description = "Comments by the account, oldest first", body = [Comment]),
        (status = 404, description = "Account not found")
    )
)]
pub async fn list_account_comments(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_account_comments(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/post/{id}/like",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 201, description = "Liked", body = Like),
        (status = 404, description = "Post not found"),
        (status = 409, description = "Already liked")
    ),
    security(("bearer" = []))
)]
pub async fn like_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let post_id = path.into_inner();
    let like = data.repo.like_post(post_id, auth.account_id()?).await?;
    info!(post_id, account_id = like.account_id, "post liked");
    Ok(HttpResponse::Created().json(like))
}

#[utoipa::path(
    delete,
    path = "/api/post/{id}/like",
    params(("id" = Id, Path, description = "Post id")),
    responses((status = 204, description = "Like withdrawn"), (status = 404, description = "Not liked")),
    security(("bearer" = []))
)]
pub async fn unlike_post(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    data.repo.unlike_post(path.into_inner(), auth.account_id()?).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/post/{id}/likes",
    params(("id" = Id, Path, description = "Post id")),
    responses(
        (status = 200, description = "Likes, oldest first", body = [Like]),
        (status = 404, description = "Post not found")
    )
)]
pub async fn list_post_likes(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.list_post_likes(path.into_inner()).await?))
}
