use async_trait::async_trait;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    /// A foreign key in the payload points at nothing.
    #[error("invalid reference: {0}")] InvalidReference(String),
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait AccountRepo: Send + Sync {
    async fn list_accounts(&self) -> RepoResult<Vec<Account>>;
    async fn get_account(&self, id: Id) -> RepoResult<Account>;
    async fn get_account_by_username(&self, username: &str) -> RepoResult<Account>;
    async fn get_account_by_email(&self, email: &str) -> RepoResult<Account>;
    async fn get_account_by_oauth(&self, identity: &str) -> RepoResult<Account>;
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account>;
    async fn update_account(&self, id: Id, changes: AccountChanges) -> RepoResult<Account>;
    /// Removes the account and everything it owns.
    async fn delete_account(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait LocationRepo: Send + Sync {
    async fn list_locations(&self) -> RepoResult<Vec<Location>>;
    async fn get_location(&self, id: Id) -> RepoResult<Location>;
    async fn create_location(&self, new: NewLocation) -> RepoResult<Location>;
    async fn replace_location(&self, id: Id, upd: LocationUpdate) -> RepoResult<Location>;
    async fn delete_location(&self, id: Id) -> RepoResult<()>;
    async fn delete_locations_by_owner(&self, account_id: Id) -> RepoResult<u64>;
}

#[async_trait]
pub trait CategoryRepo: Send + Sync {
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Id) -> RepoResult<Category>;
    async fn create_category(&self, new: NewCategory) -> RepoResult<Category>;
    async fn replace_category(&self, id: Id, upd: CategoryUpdate) -> RepoResult<Category>;
    async fn delete_category(&self, id: Id) -> RepoResult<()>;
    /// `NotFound` when the category itself is missing, empty vec when it is unused.
    async fn list_category_locations(&self, category_id: Id) -> RepoResult<Vec<Location>>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn list_posts(&self) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn replace_post(&self, id: Id, changes: PostChanges) -> RepoResult<Post>;
    async fn delete_post(&self, id: Id) -> RepoResult<()>;
    /// Oldest first.
    async fn list_account_posts(&self, account_id: Id) -> RepoResult<Vec<Post>>;
}

/// Wishlist and visited lists.
#[async_trait]
pub trait SavedLocationRepo: Send + Sync {
    async fn list_saved(&self, kind: ListKind, account_id: Id) -> RepoResult<Vec<SavedLocation>>;
    async fn add_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<SavedLocation>;
    async fn remove_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<()>;
}

/// Comment threads under posts. Deleting a comment removes its replies.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    /// Oldest first; `NotFound` when the post is missing.
    async fn list_post_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
    /// Oldest first; `NotFound` when the account is missing.
    async fn list_account_comments(&self, account_id: Id) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    /// `NotFound` for a missing post; a parent must sit under the same post.
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn delete_comment(&self, id: Id) -> RepoResult<()>;
}

/// One like per account and target.
#[async_trait]
pub trait LikeRepo: Send + Sync {
    async fn like_post(&self, post_id: Id, account_id: Id) -> RepoResult<Like>;
    async fn unlike_post(&self, post_id: Id, account_id: Id) -> RepoResult<()>;
    /// Oldest first.
    async fn list_post_likes(&self, post_id: Id) -> RepoResult<Vec<Like>>;
    /// Returns the comment with its updated `like_count`.
    async fn like_comment(&self, comment_id: Id, account_id: Id) -> RepoResult<Comment>;
}

pub trait Repo: AccountRepo + LocationRepo + CategoryRepo + PostRepo + SavedLocationRepo + CommentRepo + LikeRepo {}

impl<T> Repo for T where
    T: AccountRepo + LocationRepo + CategoryRepo + PostRepo + SavedLocationRepo + CommentRepo + LikeRepo
{
}

pub(crate) mod messages {
    pub const EMAIL_TAKEN: &str = "email already registered";
    pub const USERNAME_TAKEN: &str = "username already taken";
    pub const OAUTH_TAKEN: &str = "oauth identity already linked";
    pub const CATEGORY_TAKEN: &str = "category already exists";
    pub const ALREADY_SAVED: &str = "location already in list";
    pub const ALREADY_LIKED: &str = "already liked";
    pub const UNKNOWN_ACCOUNT: &str = "created_by does not reference an existing account";
    pub const UNKNOWN_LOCATION: &str = "location_id does not reference an existing location";
    pub const UNKNOWN_CATEGORY: &str = "category_ids reference an unknown category";
    pub const UNKNOWN_PARENT: &str = "parent_id does not reference a comment on this post";
}

#[cfg(feature = "inmem-store")]
pub mod inmem;

#[cfg(feature = "postgres-store")]
pub mod pg;
