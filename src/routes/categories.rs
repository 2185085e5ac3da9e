use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::*;
use crate::routes::{resolve_owner, AppState};
use crate::validate::Validate;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    pub id: Option<Id>,
}

#[utoipa::path(
    get,
    path = "/api/categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "One category when `id` is given, otherwise all", body = [Category]),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_categories(data: web::Data<AppState>, query: web::Query<CategoryQuery>) -> Result<HttpResponse, ApiError> {
    match query.id {
        Some(id) => Ok(HttpResponse::Ok().json(data.repo.get_category(id).await?)),
        None => Ok(HttpResponse::Ok().json(data.repo.list_categories().await?)),
    }
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(("id" = Id, Path, description = "Category id")),
    responses((status = 200, description = "Found", body = Category), (status = 404, description = "Category not found"))
)]
pub async fn get_category(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(data.repo.get_category(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid payload"),
        (status = 409, description = "Name taken")
    ),
    security(("bearer" = []))
)]
pub async fn create_category(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    req.validate()?;
    let created_by = resolve_owner(&auth, req.created_by)?;
    let category = data
        .repo
        .create_category(NewCategory { name: req.name.trim().to_string(), description: req.description, created_by })
        .await?;
    info!(category_id = category.id, created_by, "category created");
    Ok(HttpResponse::Created().json(category))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(("id" = Id, Path, description = "Category id")),
    request_body = CategoryUpdate,
    responses(
        (status = 200, description = "Category replaced", body = Category),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name taken")
    ),
    security(("bearer" = []))
)]
pub async fn replace_category(
    auth: Auth,
    data: web::Data<AppState>,
    path: web::Path<Id>,
    payload: web::Json<CategoryUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_category(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    let mut upd = payload.into_inner();
    upd.validate()?;
    upd.name = upd.name.trim().to_string();
    Ok(HttpResponse::Ok().json(data.repo.replace_category(id, upd).await?))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(("id" = Id, Path, description = "Category id")),
    responses((status = 204, description = "Deleted and untagged everywhere"), (status = 403, description = "Not the owner"), (status = 404, description = "Category not found")),
    security(("bearer" = []))
)]
pub async fn delete_category(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let existing = data.repo.get_category(id).await?;
    auth.ensure_self_or_admin(existing.created_by)?;
    data.repo.delete_category(id).await?;
    info!(category_id = id, "category deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}/locations",
    params(("id" = Id, Path, description = "Category id")),
    responses(
        (status = 200, description = "Locations tagged with the category", body = [Location]),
        (status = 404, description = "Category not found")
    )
)]
pub async fn list_category_locations(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let locations = data.repo.list_category_locations(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(locations))
}
