use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::{Account, NewAccount};
use crate::oauth::DiscordUser;
use crate::repo::{messages, RepoError};
use crate::routes::AppState;
use crate::validate::{is_valid_email, normalize_email, MAX_NAME_LEN};

const NOT_CONFIGURED: ApiError = ApiError::ServiceUnavailable("discord login is not configured");
const MAX_USERNAME_ATTEMPTS: usize = 50;

#[derive(Deserialize)]
pub struct DiscordCallback {
    code: String,
}

#[utoipa::path(
    get,
    path = "/api/account/oauth/discord/login",
    responses((status = 302, description = "Redirect to Discord"), (status = 503, description = "Discord login not configured"))
)]
pub async fn discord_login(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let discord = data.discord.as_ref().ok_or(NOT_CONFIGURED)?;
    Ok(HttpResponse::Found().insert_header((header::LOCATION, discord.authorize_url())).finish())
}

#[utoipa::path(
    get,
    path = "/api/account/oauth/discord/callback",
    params(("code" = String, Query, description = "Authorization code from Discord")),
    responses(
        (status = 302, description = "Redirect to the frontend with `?token=`"),
        (status = 401, description = "Code exchange failed"),
        (status = 409, description = "Discord email belongs to another account"),
        (status = 503, description = "Discord login not configured")
    )
)]
pub async fn discord_callback(
    query: web::Query<DiscordCallback>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let discord = data.discord.as_ref().ok_or(NOT_CONFIGURED)?;
    let user = discord.exchange(&query.code).await.map_err(|e| {
        warn!("discord code exchange failed: {e}");
        ApiError::Unauthorized("discord authorization failed")
    })?;

    let account = match data.repo.get_account_by_oauth(&user.identity()).await {
        Ok(a) => a,
        Err(RepoError::NotFound) => create_discord_account(&data, &user).await?,
        Err(e) => return Err(e.into()),
    };

    let token = data.tokens.issue(&account).map_err(|e| {
        tracing::error!("token signing failed: {e}");
        ApiError::Internal
    })?;
    info!(account_id = account.id, "discord login");
    let location = format!("{}/?token={}", data.frontend_url.trim_end_matches('/'), token.access_token);
    Ok(HttpResponse::Found().insert_header((header::LOCATION, location)).finish())
}

async fn create_discord_account(data: &AppState, user: &DiscordUser) -> Result<Account, ApiError> {
    let email = user
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| is_valid_email(e))
        .unwrap_or_else(|| format!("discord-{}@users.noreply.invalid", user.id));
    let is_admin = data.is_bootstrap_admin(&email);
    let base = username_base(&user.username);

    // Usernames are unique; append a counter until one is free.
    for attempt in 1..=MAX_USERNAME_ATTEMPTS {
        let username = if attempt == 1 { base.clone() } else { format!("{base}{attempt}") };
        let new = NewAccount {
            email: email.clone(),
            username,
            password_hash: None,
            oauth_identity: Some(user.identity()),
            is_admin,
        };
        match data.repo.create_account(new).await {
            Ok(account) => {
                info!(account_id = account.id, "account created from discord login");
                return Ok(account);
            }
            Err(RepoError::Conflict(msg)) => {
                // A concurrent callback for the same Discord user may have won the insert.
                if let Ok(existing) = data.repo.get_account_by_oauth(&user.identity()).await {
                    return Ok(existing);
                }
                if msg == messages::USERNAME_TAKEN {
                    continue;
                }
                return Err(ApiError::Conflict(msg));
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(ApiError::Conflict(messages::USERNAME_TAKEN.into()))
}

fn username_base(discord_name: &str) -> String {
    let name: String = discord_name.trim().chars().take(MAX_NAME_LEN - 4).collect();
    if name.is_empty() {
        "discord-user".into()
    } else {
        name
    }
}
