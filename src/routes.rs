use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::auth::{Auth, TokenService};
use crate::config::MediaLimits;
use crate::error::ApiError;
use crate::models::Id;
use crate::oauth::DiscordOAuth;
use crate::repo::Repo;
use crate::storage::MediaStore;

pub mod accounts;
pub mod categories;
pub mod comments;
pub mod lists;
pub mod locations;
pub mod media;
pub mod oauth;
pub mod posts;

pub fn config(cfg: &mut web::ServiceConfig) {
    // Malformed bodies, query strings and path segments answer with the usual `{"error"}` shape.
    cfg.app_data(
        web::JsonConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default().error_handler(|err, _req| ApiError::bad_request(err.to_string()).into()),
    );

    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/account/login")
                    .route(web::get().to(accounts::current_account))
                    .route(web::post().to(accounts::login)),
            )
            .service(web::resource("/account/login/refresh").route(web::post().to(accounts::refresh_token)))
            .service(web::resource("/account/oauth/discord/login").route(web::get().to(oauth::discord_login)))
            .service(web::resource("/account/oauth/discord/callback").route(web::get().to(oauth::discord_callback)))
            .service(
                web::resource("/account")
                    .route(web::get().to(accounts::get_accounts))
                    .route(web::post().to(accounts::create_account))
                    .route(web::put().to(accounts::update_account))
                    .route(web::delete().to(accounts::delete_account_by_query)),
            )
            .service(
                web::resource("/account/{id:\\d+}")
                    .route(web::get().to(accounts::get_account))
                    .route(web::delete().to(accounts::delete_account)),
            )
            .service(web::resource("/account/{id:\\d+}/posts").route(web::get().to(posts::list_account_posts)))
            .service(
                web::resource("/account/{id:\\d+}/comments").route(web::get().to(comments::list_account_comments)),
            )
            .service(
                web::resource("/account/{id:\\d+}/{kind:wishlist|visited}")
                    .route(web::get().to(lists::list_saved))
                    .route(web::post().to(lists::add_saved))
                    .route(web::delete().to(lists::remove_saved)),
            )
            .service(
                web::resource("/locations")
                    .route(web::get().to(locations::get_locations))
                    .route(web::post().to(locations::create_location))
                    .route(web::delete().to(locations::delete_locations_by_owner)),
            )
            .service(
                web::resource("/locations/{id}")
                    .route(web::get().to(locations::get_location))
                    .route(web::put().to(locations::replace_location))
                    .route(web::delete().to(locations::delete_location)),
            )
            .service(
                web::resource("/categories")
                    .route(web::get().to(categories::get_categories))
                    .route(web::post().to(categories::create_category)),
            )
            .service(
                web::resource("/categories/{id}")
                    .route(web::get().to(categories::get_category))
                    .route(web::put().to(categories::replace_category))
                    .route(web::delete().to(categories::delete_category)),
            )
            .service(
                web::resource("/categories/{id}/locations").route(web::get().to(categories::list_category_locations)),
            )
            .service(
                web::resource("/post")
                    .route(web::get().to(posts::get_posts))
                    .route(web::post().to(posts::create_post))
                    .route(web::delete().to(posts::delete_post_by_query)),
            )
            .service(
                web::resource("/post/{id}")
                    .route(web::get().to(posts::get_post))
                    .route(web::put().to(posts::replace_post))
                    .route(web::delete().to(posts::delete_post)),
            )
            .service(web::resource("/post/{id}/media").route(web::get().to(posts::get_post_media)))
            .service(
                web::resource("/post/{id}/comments")
                    .route(web::get().to(comments::list_post_comments))
                    .route(web::post().to(comments::create_comment)),
            )
            .service(
                web::resource("/post/{id}/comments/{comment_id}").route(web::delete().to(comments::delete_comment)),
            )
            .service(
                web::resource("/post/{id}/comments/{comment_id}/like").route(web::post().to(comments::like_comment)),
            )
            .service(
                web::resource("/post/{id}/like")
                    .route(web::post().to(comments::like_post))
                    .route(web::delete().to(comments::unlike_post)),
            )
            .service(web::resource("/post/{id}/likes").route(web::get().to(comments::list_post_likes)))
            .service(web::resource("/media").route(web::post().to(media::upload_media))),
    );
    // Outside /api so `<img src="/media/{hash}">` works.
    cfg.route("/media/{hash}", web::get().to(media::get_media));
    cfg.route("/health", web::get().to(health));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub media_store: Arc<dyn MediaStore>,
    pub tokens: Arc<TokenService>,
    pub media_limits: MediaLimits,
    pub bootstrap_admins: Arc<Vec<String>>,
    pub discord: Option<Arc<DiscordOAuth>>,
    pub frontend_url: String,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repo>, media_store: Arc<dyn MediaStore>, tokens: TokenService) -> Self {
        Self {
            repo,
            media_store,
            tokens: Arc::new(tokens),
            media_limits: MediaLimits::default(),
            bootstrap_admins: Arc::new(Vec::new()),
            discord: None,
            frontend_url: "http://localhost:5173".into(),
        }
    }

    pub fn with_media_limits(mut self, limits: MediaLimits) -> Self {
        self.media_limits = limits;
        self
    }

    /// Emails are compared lowercased.
    pub fn with_bootstrap_admins(mut self, emails: Vec<String>) -> Self {
        self.bootstrap_admins = Arc::new(emails.into_iter().map(|e| e.trim().to_lowercase()).collect());
        self
    }

    pub fn with_discord(mut self, discord: DiscordOAuth) -> Self {
        self.discord = Some(Arc::new(discord));
        self
    }

    pub fn with_frontend_url(mut self, url: impl Into<String>) -> Self {
        self.frontend_url = url.into();
        self
    }

    pub(crate) fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.bootstrap_admins.iter().any(|e| e == email)
    }
}

/// `created_by` of a create body: the caller unless an admin names someone else.
pub(crate) fn resolve_owner(auth: &Auth, requested: Option<Id>) -> Result<Id, ApiError> {
    let caller = auth.account_id()?;
    match requested {
        None => Ok(caller),
        Some(id) if id == caller || auth.is_admin() => Ok(id),
        Some(_) => Err(ApiError::Forbidden),
    }
}

/// Exactly one of `id` / `username` or neither.
pub(crate) fn single_filter<T>(id: Option<Id>, username: Option<T>) -> Result<(), ApiError> {
    if id.is_some() && username.is_some() {
        return Err(ApiError::bad_request("use either id or username, not both"));
    }
    Ok(())
}

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
