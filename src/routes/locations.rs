use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::{resolve_owner, AppState};
use crate::validate::{category_set, optional_text, Validate};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    pub id: Option<Id>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OwnerQuery {
    pub username: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/locations",
    params(LocationQuery),
    responses(
        (status = 200, description = "One location when `id` is given, otherwise all", body = [Location]),
        (status = 404, description = "Location not found")
    )
)]
pub async fn get_locations(data: web::Data<AppState>, query: web::Query<LocationQuery>) -> Result<HttpResponse, ApiError> {
    match query.id {
        Some(id) => Ok(HttpResponse::Ok().json(data.repo.get_location(id).await?)),
        None => Ok(HttpResponse::Ok().json(data.repo.list_locations().await?)),
    }
}

#[utoipa::path(
    get,
    path = "/api/locations/{id}",
    params(("id" = Id, Path, description = "Location id")),
    responses((status = 200, description = "Found", body = Location), (status = 404, description = "Location not found"))
)]
pub async fn get_location(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.get_location(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/locations",
    request_body = CreateLocationRequest,
    responses(
        (status = 201, description = "Location created", body = Location),
        (status = 400, description = "Invalid payload or unknown category"),
        (status = 403, description = "created_by names another account")
    ),
    security(("bearer" = []))
)]
pub async fn create_location(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<CreateLocationRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    req.validate()?;
    let created_by = resolve_owner(&auth, req.created_by)?;
    let location = data
        .repo
        .create_location(NewLocation {
            name: req.name.trim().to_string(),
            coordinates: req.coordinates,
            description: req.description,
            cost: optional_text(req.cost),
            category_ids: category_set(&req.category_ids),
            created_by,
        })
        .await?;
    info!(location_id = location.id, created_by, "location created");
    Ok(HttpResponse::Created().json(location))
}

#[utoipa::path(
    put,
    path = "/api/locations/{id}",
    params(("id" = Id, Path, description = "Location id")),
    request_body = LocationUpdate,
    responses(
        (status = 200, description = "Location replaced", body = Location),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Location not found")
    ),
    security(("bearer" = []))
)]
pub async fn replace_location(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<LocationUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_location(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    let mut upd = payload.into_inner();
    upd.validate()?;
    upd.name = upd.name.trim().to_string();
    upd.cost = optional_text(upd.cost);
    upd.category_ids = category_set(&upd.category_ids);
    Ok(HttpResponse::Ok().json(data.repo.replace_location(id, upd).await?))
}

#[utoipa::path(
    delete,
    path = "/api/locations/{id}",
    params(("id" = Id, Path, description = "Location id")),
    responses((status = 204, description = "Deleted with its posts"), (status = 403, description = "Not the owner"), (status = 404, description = "Location not found")),
    security(("bearer" = []))
)]
pub async fn delete_location(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_location(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    data.repo.delete_location(id).await?;
    info!(location_id = id, "location deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    delete,
    path = "/api/locations",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Number of locations removed"),
        (status = 400, description = "username missing"),
        (status = 404, description = "Account not found")
    ),
    security(("bearer" = []))
)]
pub async fn delete_locations_by_owner(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<OwnerQuery>,
) -> Result<HttpResponse, ApiError> {
    let Some(username) = query.into_inner().username else {
        return Err(ApiError::bad_request("username is required"));
    };
    let owner = data.repo.get_account_by_username(&username).await?;
    auth.ensure_self_or_admin(owner.id)?;
    let deleted = data.repo.delete_locations_by_owner(owner.id).await?;
    info!(account_id = owner.id, deleted, "bulk location delete");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": deleted })))
}
