use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

/// Stored account row. Carries the password hash, so it is never handed to
/// clients directly; routes answer with [`AccountResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub oauth_identity: Option<String>, // "<provider>:<subject>"
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccountResponse {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub oauth_identity: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
            username: a.username,
            oauth_identity: a.oauth_identity,
            is_admin: a.is_admin,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

/// Registration payload. Exactly one of `password` / `oauth_identity`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub email: String,
    pub username: String,
    pub password: Option<String>,
    pub oauth_identity: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateAccountRequest {
    pub id: Id,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Repository-level insert; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub password_hash: Option<String>,
    pub oauth_identity: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Location {
    pub id: Id,
    pub name: String,
    #[sqlx(flatten)]
    pub coordinates: Coordinates,
    pub description: String,
    /// Free-form price hint such as "free" or "5 EUR".
    #[serde(default)]
    pub cost: Option<String>,
    pub category_ids: Vec<Id>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLocationRequest {
    pub name: String,
    pub coordinates: Coordinates,
    pub description: String,
    pub cost: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Id>,
    pub created_by: Option<Id>,
}

/// Full replacement body for `PUT /api/locations/{id}`; ownership is not part of it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LocationUpdate {
    pub name: String,
    pub coordinates: Coordinates,
    pub description: String,
    pub cost: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Id>,
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub name: String,
    pub coordinates: Coordinates,
    pub description: String,
    pub cost: Option<String>,
    pub category_ids: Vec<Id>,
    pub created_by: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Category {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Option<Id>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CategoryUpdate {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub created_by: Id,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub created_by: Id,
    pub location_id: Id,
    pub media_hash: Option<String>,
    pub media_mime: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    pub created_by: Option<Id>,
    pub location_id: Id,
    pub media_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
    pub location_id: Id,
    pub media_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub created_by: Id,
    pub location_id: Id,
    pub media: Option<MediaRef>,
}

#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    pub location_id: Id,
    pub media: Option<MediaRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub created_by: Id,
    /// Set on replies.
    pub parent_id: Option<Id>,
    pub content: String,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<Id>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Id,
    pub created_by: Id,
    pub parent_id: Option<Id>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Like {
    pub account_id: Id,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub hash: String,
    pub mime: String,
}

/// The two per-account location lists share one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Wishlist,
    Visited,
}

impl ListKind {
    pub fn table(self) -> &'static str {
        match self {
            ListKind::Wishlist => "wishlist",
            ListKind::Visited => "visited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct SavedLocation {
    pub location_id: Id,
    pub added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub location: Location,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveLocationRequest {
    pub location_id: Id,
}
