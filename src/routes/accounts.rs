use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{hash_password_blocking, verify_password_blocking, Auth, IssuedToken};
use crate::error::ApiError;
use crate::models::*;
use crate::repo::RepoError;
use crate::routes::{single_filter, AppState};
use crate::validate::{normalize_email, Validate};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountQuery {
    pub id: Option<Id>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[utoipa::path(
    get,
    path = "/api/account",
    params(AccountQuery),
    responses(
        (status = 200, description = "One account when filtered, otherwise all accounts", body = [AccountResponse]),
        (status = 400, description = "Both id and username given"),
        (status = 404, description = "Account not found")
    )
)]
pub async fn get_accounts(data: web::Data<AppState>, query: web::Query<AccountQuery>) -> Result<HttpResponse, ApiError> {
    let AccountQuery { id, username } = query.into_inner();
    single_filter(id, username.as_ref())?;
    let account = match (id, username) {
        (Some(id), _) => data.repo.get_account(id).await?,
        (_, Some(username)) => data.repo.get_account_by_username(&username).await?,
        (None, None) => {
            let all: Vec<AccountResponse> =
                data.repo.list_accounts().await?.into_iter().map(AccountResponse::from).collect();
            return Ok(HttpResponse::Ok().json(all));
        }
    };
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[utoipa::path(
    get,
    path = "/api/account/{id}",
    params(("id" = Id, Path, description = "Account id")),
    responses((status = 200, description = "Found", body = AccountResponse), (status = 404, description = "Account not found"))
)]
pub async fn get_account(data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let account = data.repo.get_account(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[utoipa::path(
    post,
    path = "/api/account",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Admin or OAuth accounts need an admin token"),
        (status = 409, description = "Email or username taken")
    )
)]
pub async fn create_account(
    auth: Option<Auth>,
    data: web::Data<AppState>,
    payload: web::Json<CreateAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    req.validate()?;
    let caller_is_admin = auth.as_ref().map(Auth::is_admin).unwrap_or(false);
    if (req.is_admin || req.oauth_identity.is_some()) && !caller_is_admin {
        return Err(ApiError::Forbidden);
    }

    let email = normalize_email(&req.email);
    let password_hash = match req.password {
        Some(pw) => Some(hash_password_blocking(pw).await?),
        None => None,
    };
    let is_admin = req.is_admin || data.is_bootstrap_admin(&email);
    let account = data
        .repo
        .create_account(NewAccount {
            email,
            username: req.username.trim().to_string(),
            password_hash,
            oauth_identity: req.oauth_identity,
            is_admin,
        })
        .await?;
    info!(account_id = account.id, is_admin, "account created");
    Ok(HttpResponse::Created().json(AccountResponse::from(account)))
}

#[utoipa::path(
    put,
    path = "/api/account",
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated", body = AccountResponse),
        (status = 403, description = "Not your account"),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Email or username taken")
    ),
    security(("bearer" = []))
)]
pub async fn update_account(
    auth: Auth,
    data: web::Data<AppState>,
    payload: web::Json<UpdateAccountRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = payload.into_inner();
    auth.ensure_self_or_admin(req.id)?;
    req.validate()?;
    let password_hash = match req.password {
        Some(pw) => Some(hash_password_blocking(pw).await?),
        None => None,
    };
    let changes = AccountChanges {
        email: req.email.as_deref().map(normalize_email),
        username: req.username.map(|u| u.trim().to_string()),
        password_hash,
    };
    let account = data.repo.update_account(req.id, changes).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[utoipa::path(
    delete,
    path = "/api/account/{id}",
    params(("id" = Id, Path, description = "Account id")),
    responses((status = 204, description = "Deleted with everything it owned"), (status = 404, description = "Account not found")),
    security(("bearer" = []))
)]
pub async fn delete_account(auth: Auth, data: web::Data<AppState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    auth.ensure_self_or_admin(id)?;
    data.repo.delete_account(id).await?;
    info!(account_id = id, "account deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    delete,
    path = "/api/account",
    params(AccountQuery),
    responses((status = 204, description = "Deleted"), (status = 400, description = "No filter given"), (status = 404, description = "Account not found")),
    security(("bearer" = []))
)]
pub async fn delete_account_by_query(
    auth: Auth,
    data: web::Data<AppState>,
    query: web::Query<AccountQuery>,
) -> Result<HttpResponse, ApiError> {
    let AccountQuery { id, username } = query.into_inner();
    single_filter(id, username.as_ref())?;
    let id = match (id, username) {
        (Some(id), _) => id,
        (_, Some(username)) => data.repo.get_account_by_username(&username).await?.id,
        (None, None) => return Err(ApiError::bad_request("id or username is required")),
    };
    auth.ensure_self_or_admin(id)?;
    data.repo.delete_account(id).await?;
    info!(account_id = id, "account deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    post,
    path = "/api/account/login",
    request_body = LoginRequest,
    responses((status = 200, description = "Bearer token", body = IssuedToken), (status = 401, description = "Invalid credentials"))
)]
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    const REJECTED: ApiError = ApiError::Unauthorized("invalid email or password");
    let LoginRequest { email, password } = payload.into_inner();
    let account = match data.repo.get_account_by_email(&normalize_email(&email)).await {
        Ok(a) => a,
        Err(RepoError::NotFound) => return Err(REJECTED),
        Err(e) => return Err(e.into()),
    };
    // OAuth-only accounts have nothing to check against.
    let Some(hash) = account.password_hash.clone() else {
        return Err(REJECTED);
    };
    if !verify_password_blocking(hash, password).await? {
        warn!(account_id = account.id, "failed login");
        return Err(REJECTED);
    }
    let token = data.tokens.issue(&account).map_err(|e| {
        tracing::error!("token signing failed: {e}");
        ApiError::Internal
    })?;
    info!(account_id = account.id, "login");
    Ok(HttpResponse::Ok().json(token))
}

#[utoipa::path(
    get,
    path = "/api/account/login",
    responses((status = 200, description = "Account behind the bearer token", body = AccountResponse), (status = 401, description = "Unauthorized")),
    security(("bearer" = []))
)]
pub async fn current_account(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let account = token_account(&auth, &data).await?;
    Ok(HttpResponse::Ok().json(AccountResponse::from(account)))
}

#[utoipa::path(
    post,
    path = "/api/account/login/refresh",
    responses((status = 200, description = "Fresh bearer token", body = IssuedToken), (status = 401, description = "Unauthorized")),
    security(("bearer" = []))
)]
pub async fn refresh_token(auth: Auth, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // Reload so role changes since the last token take effect.
    let account = token_account(&auth, &data).await?;
    let token = data.tokens.issue(&account).map_err(|e| {
        tracing::error!("token signing failed: {e}");
        ApiError::Internal
    })?;
    Ok(HttpResponse::Ok().json(token))
}

async fn token_account(auth: &Auth, data: &AppState) -> Result<Account, ApiError> {
    match data.repo.get_account(auth.account_id()?).await {
        Ok(a) => Ok(a),
        Err(RepoError::NotFound) => Err(ApiError::Unauthorized("account no longer exists")),
        Err(e) => Err(e.into()),
    }
}
