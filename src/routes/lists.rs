//! Per-account wishlist and visited lists. Both share one handler set keyed by
//! the `{kind}` path segment.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::AppState;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RemoveSavedQuery {
    pub location_id: Id,
}

#[utoipa::path(
    get,
    path = "/api/account/{id}/{kind}",
    params(
        ("id" = Id, Path, description = "Account id"),
        ("kind" = String, Path, description = "`wishlist` or `visited`")
    ),
    responses(
        (status = 200, description = "Saved locations, oldest first", body = [SavedLocation]),
        (status = 403, description = "Not your list"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer" = []))
)]
pub async fn list_saved(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, ListKind)>,
) -> Result<HttpResponse, ApiError> {
    let (account_id, kind) = path.into_inner();
    auth.ensure_self_or_admin(account_id)?;
    let entries = data.repo.list_saved(kind, account_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[utoipa::path(
    post,
    path = "/api/account/{id}/{kind}",
    params(
        ("id" = Id, Path, description = "Account id"),
        ("kind" = String, Path, description = "`wishlist` or `visited`")
    ),
    request_body = SaveLocationRequest,
    responses(
        (status = 201, description = "Added", body = SavedLocation),
        (status = 404, description = "Account or location not found"),
        (status = 409, description = "Already in the list")
    ),
    security(("bearer" = []))
)]
pub async fn add_saved(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, ListKind)>,
    payload: web::Json<SaveLocationRequest>,
) -> Result<HttpResponse, ApiError> {
    let (account_id, kind) = path.into_inner();
    auth.ensure_self_or_admin(account_id)?;
    let entry = data.repo.add_saved(kind, account_id, payload.location_id).await?;
    tracing::debug!(account_id, location_id = entry.location_id, list = kind.table(), "location saved");
    Ok(HttpResponse::Created().json(entry))
}

#[utoipa::path(
    delete,
    path = "/api/account/{id}/{kind}",
    params(
        ("id" = Id, Path, description = "Account id"),
        ("kind" = String, Path, description = "`wishlist` or `visited`"),
        RemoveSavedQuery
    ),
    responses((status = 204, description = "Removed"), (status = 404, description = "Not in the list")),
    security(("bearer" = []))
)]
pub async fn remove_saved(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<(Id, ListKind)>,
    query: web::Query<RemoveSavedQuery>,
) -> Result<HttpResponse, ApiError> {
    let (account_id, kind) = path.into_inner();
    auth.ensure_self_or_admin(account_id)?;
    data.repo.remove_saved(kind, account_id, query.location_id).await?;
    Ok(HttpResponse::NoContent().finish())
}
