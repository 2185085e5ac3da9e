//! Process-local repository. Every mutation runs under a single write lock,
//! so uniqueness checks and the write they guard are atomic. With a data
//! directory the state is mirrored to `state.json` after each mutation.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::messages::*;
use super::*;
use crate::validate::category_set;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedRow {
    account_id: Id,
    location_id: Id,
    added_at: DateTime<Utc>,
}

/// A like on a post or a comment, keyed by the liked row's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LikeRow {
    target: Id,
    account_id: Id,
    created_at: DateTime<Utc>,
}

impl LikeRow {
    fn view(&self) -> Like {
        Like { account_id: self.account_id, created_at: self.created_at }
    }
}

#[derive(Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    accounts: BTreeMap<Id, Account>,
    locations: BTreeMap<Id, Location>,
    categories: BTreeMap<Id, Category>,
    posts: BTreeMap<Id, Post>,
    comments: BTreeMap<Id, Comment>,
    post_likes: Vec<LikeRow>,
    comment_likes: Vec<LikeRow>,
    wishlist: Vec<SavedRow>,
    visited: Vec<SavedRow>,
    next_id: Id,
    /// Bumped on every mutation; orders snapshot writes.
    #[serde(skip)]
    revision: u64,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn list(&self, kind: ListKind) -> &Vec<SavedRow> {
        match kind {
            ListKind::Wishlist => &self.wishlist,
            ListKind::Visited => &self.visited,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<SavedRow> {
        match kind {
            ListKind::Wishlist => &mut self.wishlist,
            ListKind::Visited => &mut self.visited,
        }
    }

    fn account_conflict(&self, id: Option<Id>, email: Option<&str>, username: Option<&str>) -> Option<&'static str> {
        let others = || self.accounts.values().filter(move |a| Some(a.id) != id);
        if let Some(email) = email {
            if others().any(|a| a.email == email) {
                return Some(EMAIL_TAKEN);
            }
        }
        if let Some(username) = username {
            if others().any(|a| a.username == username) {
                return Some(USERNAME_TAKEN);
            }
        }
        None
    }

    fn check_categories(&self, ids: &[Id]) -> RepoResult<()> {
        if ids.iter().all(|id| self.categories.contains_key(id)) {
            Ok(())
        } else {
            Err(RepoError::InvalidReference(UNKNOWN_CATEGORY.into()))
        }
    }

    fn remove_location(&mut self, id: Id) -> bool {
        if self.locations.remove(&id).is_none() {
            return false;
        }
        let posts: Vec<Id> = self.posts.values().filter(|p| p.location_id == id).map(|p| p.id).collect();
        for post in posts {
            self.remove_post(post);
        }
        self.wishlist.retain(|r| r.location_id != id);
        self.visited.retain(|r| r.location_id != id);
        true
    }

    fn remove_category(&mut self, id: Id) -> bool {
        if self.categories.remove(&id).is_none() {
            return false;
        }
        for loc in self.locations.values_mut() {
            loc.category_ids.retain(|c| *c != id);
        }
        true
    }

    fn remove_post(&mut self, id: Id) -> bool {
        if self.posts.remove(&id).is_none() {
            return false;
        }
        let comments: Vec<Id> = self.comments.values().filter(|c| c.post_id == id).map(|c| c.id).collect();
        for comment in comments {
            self.remove_comment(comment);
        }
        self.post_likes.retain(|l| l.target != id);
        true
    }

    /// Removes the comment, its replies at any depth, and their likes.
    fn remove_comment(&mut self, id: Id) -> bool {
        if !self.comments.contains_key(&id) {
            return false;
        }
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(self.comments.values().filter(|c| c.parent_id == Some(parent)).map(|c| c.id));
            i += 1;
        }
        for c in &doomed {
            self.comments.remove(c);
        }
        self.comment_likes.retain(|l| !doomed.contains(&l.target));
        true
    }

    fn comment_view(&self, comment: &Comment) -> Comment {
        let like_count = self.comment_likes.iter().filter(|l| l.target == comment.id).count() as i64;
        Comment { like_count, ..comment.clone() }
    }

    fn saved_view(&self, row: &SavedRow) -> Option<SavedLocation> {
        self.locations.get(&row.location_id).map(|loc| SavedLocation {
            location_id: row.location_id,
            added_at: row.added_at,
            location: loc.clone(),
        })
    }
}

/// On-disk copy of the state. Writes go through a temp file and a rename,
/// one at a time, and never replace a newer revision with an older one.
struct Snapshot {
    path: PathBuf,
    written: Mutex<u64>,
}

impl Snapshot {
    fn write(&self, revision: u64, bytes: &[u8]) -> io::Result<()> {
        let mut written =
            self.written.lock().map_err(|_| io::Error::new(io::ErrorKind::Other, "snapshot lock poisoned"))?;
        if revision <= *written {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        *written = revision;
        Ok(())
    }
}

/// State serialised under the write lock, waiting to be written out.
struct PendingSnapshot {
    snapshot: Arc<Snapshot>,
    revision: u64,
    bytes: Vec<u8>,
}

impl PendingSnapshot {
    /// Failures are logged; the in-memory state stays authoritative.
    async fn flush(self) {
        let path = self.snapshot.path.clone();
        let result = tokio::task::spawn_blocking(move || self.snapshot.write(self.revision, &self.bytes)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("failed to write snapshot '{}': {e}", path.display()),
            Err(e) => tracing::error!("snapshot task failed: {e}"),
        }
    }
}

#[derive(Clone)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
    snapshot: Option<Arc<Snapshot>>,
}

impl InMemRepo {
    /// Empty, unpersisted repository.
    pub fn new() -> Self {
        Self { state: Arc::new(RwLock::new(State::default())), snapshot: None }
    }

    /// Repository that loads `state.json` from `data_dir` and rewrites it after every mutation.
    pub fn with_snapshot(data_dir: &Path) -> Self {
        let path = data_dir.join("state.json");
        let state = Self::load_state_from(&path);
        Self {
            state: Arc::new(RwLock::new(state)),
            snapshot: Some(Arc::new(Snapshot { path, written: Mutex::new(0) })),
        }
    }

    fn load_state_from(path: &Path) -> State {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                Ok(s) => {
                    tracing::info!("loaded snapshot '{}'", path.display());
                    s
                }
                Err(e) => {
                    tracing::warn!("failed to parse snapshot '{}': {e}; starting empty", path.display());
                    State::default()
                }
            },
            Err(e) => {
                tracing::info!("no snapshot at '{}': {e}; starting empty", path.display());
                State::default()
            }
        }
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn capture(&self, s: &mut State) -> Option<PendingSnapshot> {
        let snapshot = self.snapshot.as_ref()?;
        s.revision += 1;
        match serde_json::to_vec_pretty(&*s) {
            Ok(bytes) => Some(PendingSnapshot { snapshot: Arc::clone(snapshot), revision: s.revision, bytes }),
            Err(e) => {
                tracing::error!("failed to serialise snapshot: {e}");
                None
            }
        }
    }

    /// Applies `f` under the write lock; on success the resulting state is persisted.
    async fn mutate<T, F>(&self, f: F) -> RepoResult<T>
    where
        T: Send,
        F: FnOnce(&mut State) -> RepoResult<T> + Send,
    {
        let (value, pending) = {
            let mut s = self.write()?;
            let value = f(&mut *s)?;
            (value, self.capture(&mut *s))
        };
        if let Some(pending) = pending {
            pending.flush().await;
        }
        Ok(value)
    }
}

impl Default for InMemRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountRepo for InMemRepo {
    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    async fn get_account(&self, id: Id) -> RepoResult<Account> {
        self.read()?.accounts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_account_by_username(&self, username: &str) -> RepoResult<Account> {
        let s = self.read()?;
        s.accounts.values().find(|a| a.username == username).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_account_by_email(&self, email: &str) -> RepoResult<Account> {
        let s = self.read()?;
        s.accounts.values().find(|a| a.email == email).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_account_by_oauth(&self, identity: &str) -> RepoResult<Account> {
        let s = self.read()?;
        s.accounts
            .values()
            .find(|a| a.oauth_identity.as_deref() == Some(identity))
            .cloned()
            .ok_or(RepoError::NotFound)
    }

    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        self.mutate(move |s| {
            if let Some(msg) = s.account_conflict(None, Some(&new.email), Some(&new.username)) {
                return Err(RepoError::Conflict(msg.into()));
            }
            if let Some(ref identity) = new.oauth_identity {
                if s.accounts.values().any(|a| a.oauth_identity.as_ref() == Some(identity)) {
                    return Err(RepoError::Conflict(OAUTH_TAKEN.into()));
                }
            }
            let now = Utc::now();
            let id = s.next_id();
            let account = Account {
                id,
                email: new.email,
                username: new.username,
                password_hash: new.password_hash,
                oauth_identity: new.oauth_identity,
                is_admin: new.is_admin,
                created_at: now,
                updated_at: now,
            };
            s.accounts.insert(id, account.clone());
            Ok(account)
        })
        .await
    }

    async fn update_account(&self, id: Id, changes: AccountChanges) -> RepoResult<Account> {
        self.mutate(move |s| {
            if !s.accounts.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            // uniqueness check before taking the mutable borrow
            if let Some(msg) = s.account_conflict(Some(id), changes.email.as_deref(), changes.username.as_deref()) {
                return Err(RepoError::Conflict(msg.into()));
            }
            let account = s.accounts.get_mut(&id).ok_or(RepoError::NotFound)?;
            if let Some(email) = changes.email { account.email = email; }
            if let Some(username) = changes.username { account.username = username; }
            if let Some(hash) = changes.password_hash { account.password_hash = Some(hash); }
            account.updated_at = Utc::now();
            Ok(account.clone())
        })
        .await
    }

    async fn delete_account(&self, id: Id) -> RepoResult<()> {
        self.mutate(move |s| {
            if s.accounts.remove(&id).is_none() {
                return Err(RepoError::NotFound);
            }
            let owned_locations: Vec<Id> = s.locations.values().filter(|l| l.created_by == id).map(|l| l.id).collect();
            for loc in owned_locations {
                s.remove_location(loc);
            }
            let owned_categories: Vec<Id> =
                s.categories.values().filter(|c| c.created_by == id).map(|c| c.id).collect();
            for cat in owned_categories {
                s.remove_category(cat);
            }
            let owned_posts: Vec<Id> = s.posts.values().filter(|p| p.created_by == id).map(|p| p.id).collect();
            for post in owned_posts {
                s.remove_post(post);
            }
            let owned_comments: Vec<Id> = s.comments.values().filter(|c| c.created_by == id).map(|c| c.id).collect();
            for comment in owned_comments {
                // may already be gone with an earlier parent
                s.remove_comment(comment);
            }
            s.post_likes.retain(|l| l.account_id != id);
            s.comment_likes.retain(|l| l.account_id != id);
            s.wishlist.retain(|r| r.account_id != id);
            s.visited.retain(|r| r.account_id != id);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocationRepo for InMemRepo {
    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        Ok(self.read()?.locations.values().cloned().collect())
    }

    async fn get_location(&self, id: Id) -> RepoResult<Location> {
        self.read()?.locations.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_location(&self, new: NewLocation) -> RepoResult<Location> {
        self.mutate(move |s| {
            if !s.accounts.contains_key(&new.created_by) {
                return Err(RepoError::InvalidReference(UNKNOWN_ACCOUNT.into()));
            }
            let category_ids = category_set(&new.category_ids);
            s.check_categories(&category_ids)?;
            let now = Utc::now();
            let id = s.next_id();
            let location = Location {
                id,
                name: new.name,
                coordinates: new.coordinates,
                description: new.description,
                cost: new.cost,
                category_ids,
                created_by: new.created_by,
                created_at: now,
                updated_at: now,
            };
            s.locations.insert(id, location.clone());
            Ok(location)
        })
        .await
    }

    async fn replace_location(&self, id: Id, upd: LocationUpdate) -> RepoResult<Location> {
        self.mutate(move |s| {
            if !s.locations.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            let category_ids = category_set(&upd.category_ids);
            s.check_categories(&category_ids)?;
            let loc = s.locations.get_mut(&id).ok_or(RepoError::NotFound)?;
            loc.name = upd.name;
            loc.coordinates = upd.coordinates;
            loc.description = upd.description;
            loc.cost = upd.cost;
            loc.category_ids = category_ids;
            loc.updated_at = Utc::now();
            Ok(loc.clone())
        })
        .await
    }

    async fn delete_location(&self, id: Id) -> RepoResult<()> {
        self.mutate(move |s| if s.remove_location(id) { Ok(()) } else { Err(RepoError::NotFound) }).await
    }

    async fn delete_locations_by_owner(&self, account_id: Id) -> RepoResult<u64> {
        self.mutate(move |s| {
            let owned: Vec<Id> =
                s.locations.values().filter(|l| l.created_by == account_id).map(|l| l.id).collect();
            for id in &owned {
                s.remove_location(*id);
            }
            Ok(owned.len() as u64)
        })
        .await
    }
}

#[async_trait]
impl CategoryRepo for InMemRepo {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        Ok(self.read()?.categories.values().cloned().collect())
    }

    async fn get_category(&self, id: Id) -> RepoResult<Category> {
        self.read()?.categories.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_category(&self, new: NewCategory) -> RepoResult<Category> {
        self.mutate(move |s| {
            if !s.accounts.contains_key(&new.created_by) {
                return Err(RepoError::InvalidReference(UNKNOWN_ACCOUNT.into()));
            }
            if s.categories.values().any(|c| c.name == new.name) {
                return Err(RepoError::Conflict(CATEGORY_TAKEN.into()));
            }
            let now = Utc::now();
            let id = s.next_id();
            let category = Category {
                id,
                name: new.name,
                description: new.description,
                created_by: new.created_by,
                created_at: now,
                updated_at: now,
            };
            s.categories.insert(id, category.clone());
            Ok(category)
        })
        .await
    }

    async fn replace_category(&self, id: Id, upd: CategoryUpdate) -> RepoResult<Category> {
        self.mutate(move |s| {
            if !s.categories.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            if s.categories.values().any(|c| c.name == upd.name && c.id != id) {
                return Err(RepoError::Conflict(CATEGORY_TAKEN.into()));
            }
            let cat = s.categories.get_mut(&id).ok_or(RepoError::NotFound)?;
            cat.name = upd.name;
            cat.description = upd.description;
            cat.updated_at = Utc::now();
            Ok(cat.clone())
        })
        .await
    }

    async fn delete_category(&self, id: Id) -> RepoResult<()> {
        self.mutate(move |s| if s.remove_category(id) { Ok(()) } else { Err(RepoError::NotFound) }).await
    }

    async fn list_category_locations(&self, category_id: Id) -> RepoResult<Vec<Location>> {
        let s = self.read()?;
        if !s.categories.contains_key(&category_id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.locations.values().filter(|l| l.category_ids.contains(&category_id)).cloned().collect())
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        Ok(self.read()?.posts.values().cloned().collect())
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        self.read()?.posts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        self.mutate(move |s| {
            if !s.accounts.contains_key(&new.created_by) {
                return Err(RepoError::InvalidReference(UNKNOWN_ACCOUNT.into()));
            }
            if !s.locations.contains_key(&new.location_id) {
                return Err(RepoError::InvalidReference(UNKNOWN_LOCATION.into()));
            }
            let now = Utc::now();
            let id = s.next_id();
            let (media_hash, media_mime) = new.media.map(|m| (m.hash, m.mime)).unzip();
            let post = Post {
                id,
                title: new.title,
                content: new.content,
                created_by: new.created_by,
                location_id: new.location_id,
                media_hash,
                media_mime,
                created_at: now,
                updated_at: now,
            };
            s.posts.insert(id, post.clone());
            Ok(post)
        })
        .await
    }

    async fn replace_post(&self, id: Id, changes: PostChanges) -> RepoResult<Post> {
        self.mutate(move |s| {
            if !s.posts.contains_key(&id) {
                return Err(RepoError::NotFound);
            }
            if !s.locations.contains_key(&changes.location_id) {
                return Err(RepoError::InvalidReference(UNKNOWN_LOCATION.into()));
            }
            let post = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
            let (media_hash, media_mime) = changes.media.map(|m| (m.hash, m.mime)).unzip();
            post.title = changes.title;
            post.content = changes.content;
            post.location_id = changes.location_id;
            post.media_hash = media_hash;
            post.media_mime = media_mime;
            post.updated_at = Utc::now();
            Ok(post.clone())
        })
        .await
    }

    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        self.mutate(move |s| if s.remove_post(id) { Ok(()) } else { Err(RepoError::NotFound) }).await
    }

    async fn list_account_posts(&self, account_id: Id) -> RepoResult<Vec<Post>> {
        let s = self.read()?;
        if !s.accounts.contains_key(&account_id) {
            return Err(RepoError::NotFound);
        }
        let mut v: Vec<_> = s.posts.values().filter(|p| p.created_by == account_id).cloned().collect();
        v.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(v)
    }
}

#[async_trait]
impl SavedLocationRepo for InMemRepo {
    async fn list_saved(&self, kind: ListKind, account_id: Id) -> RepoResult<Vec<SavedLocation>> {
        let s = self.read()?;
        if !s.accounts.contains_key(&account_id) {
            return Err(RepoError::NotFound);
        }
        // rows are appended, so insertion order is added_at order
        Ok(s.list(kind)
            .iter()
            .filter(|r| r.account_id == account_id)
            .filter_map(|r| s.saved_view(r))
            .collect())
    }

    async fn add_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<SavedLocation> {
        self.mutate(move |s| {
            if !s.accounts.contains_key(&account_id) || !s.locations.contains_key(&location_id) {
                return Err(RepoError::NotFound);
            }
            if s.list(kind).iter().any(|r| r.account_id == account_id && r.location_id == location_id) {
                return Err(RepoError::Conflict(ALREADY_SAVED.into()));
            }
            let row = SavedRow { account_id, location_id, added_at: Utc::now() };
            let view = s.saved_view(&row).ok_or(RepoError::NotFound)?;
            s.list_mut(kind).push(row);
            Ok(view)
        })
        .await
    }

    async fn remove_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<()> {
        self.mutate(move |s| {
            let list = s.list_mut(kind);
            let before = list.len();
            list.retain(|r| !(r.account_id == account_id && r.location_id == location_id));
            if list.len() == before {
                return Err(RepoError::NotFound);
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl CommentRepo for InMemRepo {
    async fn list_post_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        let s = self.read()?;
        if !s.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        // ids grow monotonically, so map order is creation order
        Ok(s.comments.values().filter(|c| c.post_id == post_id).map(|c| s.comment_view(c)).collect())
    }

    async fn list_account_comments(&self, account_id: Id) -> RepoResult<Vec<Comment>> {
        let s = self.read()?;
        if !s.accounts.contains_key(&account_id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.comments.values().filter(|c| c.created_by == account_id).map(|c| s.comment_view(c)).collect())
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        let s = self.read()?;
        s.comments.get(&id).map(|c| s.comment_view(c)).ok_or(RepoError::NotFound)
    }

    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
        self.mutate(move |s| {
            if !s.posts.contains_key(&new.post_id) {
                return Err(RepoError::NotFound);
            }
            if !s.accounts.contains_key(&new.created_by) {
                return Err(RepoError::InvalidReference(UNKNOWN_ACCOUNT.into()));
            }
            if let Some(parent) = new.parent_id {
                if !s.comments.get(&parent).is_some_and(|p| p.post_id == new.post_id) {
                    return Err(RepoError::InvalidReference(UNKNOWN_PARENT.into()));
                }
            }
            let now = Utc::now();
            let id = s.next_id();
            let comment = Comment {
                id,
                post_id: new.post_id,
                created_by: new.created_by,
                parent_id: new.parent_id,
                content: new.content,
                like_count: 0,
                created_at: now,
                updated_at: now,
            };
            s.comments.insert(id, comment.clone());
            Ok(comment)
        })
        .await
    }

    async fn delete_comment(&self, id: Id) -> RepoResult<()> {
        self.mutate(move |s| if s.remove_comment(id) { Ok(()) } else { Err(RepoError::NotFound) }).await
    }
}

#[async_trait]
impl LikeRepo for InMemRepo {
    async fn like_post(&self, post_id: Id, account_id: Id) -> RepoResult<Like> {
        self.mutate(move |s| {
            if !s.posts.contains_key(&post_id) || !s.accounts.contains_key(&account_id) {
                return Err(RepoError::NotFound);
            }
            if s.post_likes.iter().any(|l| l.target == post_id && l.account_id == account_id) {
                return Err(RepoError::Conflict(ALREADY_LIKED.into()));
            }
            let row = LikeRow { target: post_id, account_id, created_at: Utc::now() };
            let like = row.view();
            s.post_likes.push(row);
            Ok(like)
        })
        .await
    }

    async fn unlike_post(&self, post_id: Id, account_id: Id) -> RepoResult<()> {
        self.mutate(move |s| {
            let before = s.post_likes.len();
            s.post_likes.retain(|l| !(l.target == post_id && l.account_id == account_id));
            if s.post_likes.len() == before {
                return Err(RepoError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn list_post_likes(&self, post_id: Id) -> RepoResult<Vec<Like>> {
        let s = self.read()?;
        if !s.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        Ok(s.post_likes.iter().filter(|l| l.target == post_id).map(LikeRow::view).collect())
    }

    async fn like_comment(&self, comment_id: Id, account_id: Id) -> RepoResult<Comment> {
        self.mutate(move |s| {
            if !s.comments.contains_key(&comment_id) || !s.accounts.contains_key(&account_id) {
                return Err(RepoError::NotFound);
            }
            if s.comment_likes.iter().any(|l| l.target == comment_id && l.account_id == account_id) {
                return Err(RepoError::Conflict(ALREADY_LIKED.into()));
            }
            s.comment_likes.push(LikeRow { target: comment_id, account_id, created_at: Utc::now() });
            s.comments.get(&comment_id).map(|c| s.comment_view(c)).ok_or(RepoError::NotFound)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(n: u32) -> NewAccount {
        NewAccount {
            email: format!("user{n}@example.com"),
            username: format!("user{n}"),
            password_hash: Some("hash".into()),
            oauth_identity: None,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemRepo::with_snapshot(dir.path());
        let created = repo.create_account(new_account(1)).await.unwrap();

        let reloaded = InMemRepo::with_snapshot(dir.path());
        let got = reloaded.get_account(created.id).await.unwrap();
        assert_eq!(got.email, "user1@example.com");
        assert_eq!(got.password_hash.as_deref(), Some("hash"));

        // ids keep counting from the snapshot
        let next = reloaded.create_account(new_account(2)).await.unwrap();
        assert!(next.id > created.id);
    }

    #[tokio::test]
    async fn corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("state.json"), b"{not json").unwrap();
        let repo = InMemRepo::with_snapshot(dir.path());
        assert!(repo.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_all_reach_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemRepo::with_snapshot(dir.path());
        let tasks: Vec<_> = (0..32)
            .map(|n| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.create_account(new_account(n)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reloaded = InMemRepo::with_snapshot(dir.path());
        assert_eq!(reloaded.list_accounts().await.unwrap().len(), 32);
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn snapshot_without_comment_tables_loads() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = serde_json::json!({
            "accounts": {}, "locations": {}, "categories": {}, "posts": {},
            "wishlist": [], "visited": [], "next_id": 7
        });
        std::fs::write(dir.path().join("state.json"), serde_json::to_vec(&legacy).unwrap()).unwrap();
        let repo = InMemRepo::with_snapshot(dir.path());
        assert_eq!(repo.create_account(new_account(1)).await.unwrap().id, 8);
    }

    #[tokio::test]
    async fn deleting_a_comment_takes_its_replies() {
        let repo = InMemRepo::new();
        let ann = repo.create_account(new_account(1)).await.unwrap();
        let loc = repo
            .create_location(NewLocation {
                name: "pier".into(),
                coordinates: Coordinates { lat: 1.0, lon: 2.0 },
                description: "d".into(),
                cost: None,
                category_ids: vec![],
                created_by: ann.id,
            })
            .await
            .unwrap();
        let post = repo
            .create_post(NewPost { title: "t".into(), content: "c".into(), created_by: ann.id, location_id: loc.id, media: None })
            .await
            .unwrap();
        let comment = |parent_id| NewComment { post_id: post.id, created_by: ann.id, parent_id, content: "hi".into() };
        let root = repo.create_comment(comment(None)).await.unwrap();
        let reply = repo.create_comment(comment(Some(root.id))).await.unwrap();
        let nested = repo.create_comment(comment(Some(reply.id))).await.unwrap();
        let other = repo.create_comment(comment(None)).await.unwrap();
        repo.like_comment(nested.id, ann.id).await.unwrap();

        repo.delete_comment(root.id).await.unwrap();
        let left: Vec<Id> = repo.list_post_comments(post.id).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(left, vec![other.id]);
        assert!(repo.read().unwrap().comment_likes.is_empty());
    }
}
