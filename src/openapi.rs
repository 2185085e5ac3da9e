use crate::auth::IssuedToken;
use crate::models::{
    AccountResponse, Category, CategoryUpdate, Comment, Coordinates, CreateAccountRequest, CreateCategoryRequest,
    CreateCommentRequest, CreateLocationRequest, CreatePostRequest, Like, Location, LocationUpdate, Post,
    SaveLocationRequest, SavedLocation, UpdateAccountRequest, UpdatePostRequest,
};
use crate::routes::{accounts, categories, comments, lists, locations, media, oauth, posts};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        accounts::get_accounts,
        accounts::get_account,
        accounts::create_account,
        accounts::update_account,
        accounts::delete_account,
        accounts::delete_account_by_query,
        accounts::login,
        accounts::current_account,
        accounts::refresh_token,
        oauth::discord_login,
        oauth::discord_callback,
        lists::list_saved,
        lists::add_saved,
        lists::remove_saved,
        locations::get_locations,
        locations::get_location,
        locations::create_location,
        locations::replace_location,
        locations::delete_location,
        locations::delete_locations_by_owner,
        categories::get_categories,
        categories::get_category,
        categories::create_category,
        categories::replace_category,
        categories::delete_category,
        categories::list_category_locations,
        posts::get_posts,
        posts::get_post,
        posts::create_post,
        posts::replace_post,
        posts::delete_post,
        posts::delete_post_by_query,
        posts::list_account_posts,
        posts::get_post_media,
        comments::list_post_comments,
        comments::create_comment,
        comments::delete_comment,
        comments::like_comment,
        comments::list_account_comments,
        comments::like_post,
        comments::unlike_post,
        comments::list_post_likes,
        media::upload_media,
        media::get_media,
        crate::routes::health,
    ),
    components(schemas(
        AccountResponse, CreateAccountRequest, UpdateAccountRequest, accounts::LoginRequest, IssuedToken,
        Coordinates, Location, CreateLocationRequest, LocationUpdate,
        Category, CreateCategoryRequest, CategoryUpdate,
        Post, CreatePostRequest, UpdatePostRequest,
        Comment, CreateCommentRequest, Like,
        SavedLocation, SaveLocationRequest, media::MediaUploadResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "accounts", description = "Accounts, login and per-account lists"),
        (name = "locations", description = "Locations and categories"),
        (name = "posts", description = "Posts, comments, likes and media"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}
