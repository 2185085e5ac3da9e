//! Postgres backend. Uniqueness and referential integrity are enforced by the
//! schema in `migrations/`; constraint violations are mapped back to
//! `RepoError` here.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::messages::*;
use super::*;
use crate::validate::category_set;

const ACCOUNT_COLUMNS: &str =
    "id, email, username, password_hash, oauth_identity, is_admin, created_at, updated_at";

const POST_COLUMNS: &str =
    "id, title, content, created_by, location_id, media_hash, media_mime, created_at, updated_at";

const LOCATION_SELECT: &str = r#"
    SELECT l.id, l.name, l.lat, l.lon, l.description, l.cost, l.created_by, l.created_at, l.updated_at,
           ARRAY(SELECT lc.category_id FROM location_categories lc
                 WHERE lc.location_id = l.id ORDER BY lc.category_id) AS category_ids
    FROM locations l
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.created_by, c.parent_id, c.content,
           (SELECT COUNT(*) FROM comment_likes cl WHERE cl.comment_id = c.id) AS like_count,
           c.created_at, c.updated_at
    FROM comments c
"#;

fn unique_message(constraint: &str) -> &'static str {
    match constraint {
        "accounts_email_key" => EMAIL_TAKEN,
        "accounts_username_key" => USERNAME_TAKEN,
        "accounts_oauth_identity_key" => OAUTH_TAKEN,
        "categories_name_key" => CATEGORY_TAKEN,
        "wishlist_pkey" | "visited_pkey" => ALREADY_SAVED,
        "post_likes_pkey" | "comment_likes_pkey" => ALREADY_LIKED,
        _ => "duplicate value",
    }
}

fn reference_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(c) if c.contains("parent_id") => UNKNOWN_PARENT,
        Some(c) if c.contains("created_by") => UNKNOWN_ACCOUNT,
        Some(c) if c.contains("location_id") => UNKNOWN_LOCATION,
        Some(c) if c.contains("category_id") => UNKNOWN_CATEGORY,
        _ => "invalid reference",
    }
}

fn map_err(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => RepoError::Conflict(unique_message(db.constraint().unwrap_or_default()).into()),
            Some("23503") => RepoError::InvalidReference(reference_message(db.constraint()).into()),
            _ => RepoError::Internal(e.to_string()),
        },
        _ => RepoError::Internal(e.to_string()),
    }
}

fn affected(rows: u64) -> RepoResult<()> {
    if rows == 0 { Err(RepoError::NotFound) } else { Ok(()) }
}

/// For inserts keyed by path ids, a dangling reference means the target is gone.
fn missing_target(e: sqlx::Error) -> RepoError {
    match map_err(e) {
        RepoError::InvalidReference(_) => RepoError::NotFound,
        other => other,
    }
}

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub fn pool(&self) -> &Pool<Postgres> { &self.pool }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn account_where(&self, clause: &str, value: &str) -> RepoResult<Account> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {clause} = $1");
        sqlx::query_as::<_, Account>(&sql)
            .bind(value)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn ensure_exists(&self, table: &str, id: Id) -> RepoResult<()> {
        let sql = format!("SELECT 1 FROM {table} WHERE id = $1");
        sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(map_err)?
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn insert_categories(tx: &mut sqlx::Transaction<'_, Postgres>, location_id: Id, ids: &[Id]) -> RepoResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("INSERT INTO location_categories (location_id, category_id) SELECT $1, UNNEST($2::bigint[])")
            .bind(location_id)
            .bind(ids)
            .execute(&mut **tx).await.map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepo for PgRepo {
    async fn list_accounts(&self) -> RepoResult<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id");
        sqlx::query_as::<_, Account>(&sql).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn get_account(&self, id: Id) -> RepoResult<Account> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        sqlx::query_as::<_, Account>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn get_account_by_username(&self, username: &str) -> RepoResult<Account> {
        self.account_where("username", username).await
    }

    async fn get_account_by_email(&self, email: &str) -> RepoResult<Account> {
        self.account_where("email", email).await
    }

    async fn get_account_by_oauth(&self, identity: &str) -> RepoResult<Account> {
        self.account_where("oauth_identity", identity).await
    }

    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        let sql = format!(
            "INSERT INTO accounts (email, username, password_hash, oauth_identity, is_admin) \
             VALUES ($1,$2,$3,$4,$5) RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(&new.email)
            .bind(&new.username)
            .bind(new.password_hash.as_ref())
            .bind(new.oauth_identity.as_ref())
            .bind(new.is_admin)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn update_account(&self, id: Id, changes: AccountChanges) -> RepoResult<Account> {
        let sql = format!(
            "UPDATE accounts SET email = COALESCE($2, email), username = COALESCE($3, username), \
             password_hash = COALESCE($4, password_hash), updated_at = now() \
             WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .bind(changes.email.as_ref())
            .bind(changes.username.as_ref())
            .bind(changes.password_hash.as_ref())
            .fetch_optional(&self.pool).await.map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_account(&self, id: Id) -> RepoResult<()> {
        // owned rows go with it through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }
}

#[async_trait]
impl LocationRepo for PgRepo {
    async fn list_locations(&self) -> RepoResult<Vec<Location>> {
        let sql = format!("{LOCATION_SELECT} ORDER BY l.id");
        sqlx::query_as::<_, Location>(&sql).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn get_location(&self, id: Id) -> RepoResult<Location> {
        let sql = format!("{LOCATION_SELECT} WHERE l.id = $1");
        sqlx::query_as::<_, Location>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn create_location(&self, new: NewLocation) -> RepoResult<Location> {
        let category_ids = category_set(&new.category_ids);
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let id: Id = sqlx::query_scalar(
            "INSERT INTO locations (name, lat, lon, description, cost, created_by) \
             VALUES ($1,$2,$3,$4,$5,$6) RETURNING id",
        )
        .bind(&new.name)
        .bind(new.coordinates.lat)
        .bind(new.coordinates.lon)
        .bind(&new.description)
        .bind(new.cost.as_ref())
        .bind(new.created_by)
        .fetch_one(&mut *tx).await.map_err(map_err)?;
        Self::insert_categories(&mut tx, id, &category_ids).await?;
        tx.commit().await.map_err(map_err)?;
        self.get_location(id).await
    }

    async fn replace_location(&self, id: Id, upd: LocationUpdate) -> RepoResult<Location> {
        let category_ids = category_set(&upd.category_ids);
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let res = sqlx::query(
            "UPDATE locations SET name = $2, lat = $3, lon = $4, description = $5, cost = $6, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&upd.name)
        .bind(upd.coordinates.lat)
        .bind(upd.coordinates.lon)
        .bind(&upd.description)
        .bind(upd.cost.as_ref())
        .execute(&mut *tx).await.map_err(map_err)?;
        affected(res.rows_affected())?;
        sqlx::query("DELETE FROM location_categories WHERE location_id = $1")
            .bind(id)
            .execute(&mut *tx).await.map_err(map_err)?;
        Self::insert_categories(&mut tx, id, &category_ids).await?;
        tx.commit().await.map_err(map_err)?;
        self.get_location(id).await
    }

    async fn delete_location(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }

    async fn delete_locations_by_owner(&self, account_id: Id) -> RepoResult<u64> {
        let res = sqlx::query("DELETE FROM locations WHERE created_by = $1")
            .bind(account_id)
            .execute(&self.pool).await.map_err(map_err)?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl CategoryRepo for PgRepo {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_by, created_at, updated_at FROM categories ORDER BY id",
        )
        .fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn get_category(&self, id: Id) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, created_by, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn create_category(&self, new: NewCategory) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description, created_by) VALUES ($1,$2,$3) \
             RETURNING id, name, description, created_by, created_at, updated_at",
        )
        .bind(&new.name)
        .bind(new.description.as_ref())
        .bind(new.created_by)
        .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn replace_category(&self, id: Id, upd: CategoryUpdate) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2, description = $3, updated_at = now() WHERE id = $1 \
             RETURNING id, name, description, created_by, created_at, updated_at",
        )
        .bind(id)
        .bind(&upd.name)
        .bind(upd.description.as_ref())
        .fetch_optional(&self.pool).await.map_err(map_err)?
        .ok_or(RepoError::NotFound)
    }

    async fn delete_category(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }

    async fn list_category_locations(&self, category_id: Id) -> RepoResult<Vec<Location>> {
        self.ensure_exists("categories", category_id).await?;
        let sql = format!(
            "{LOCATION_SELECT} WHERE EXISTS (SELECT 1 FROM location_categories t \
             WHERE t.location_id = l.id AND t.category_id = $1) ORDER BY l.id"
        );
        sqlx::query_as::<_, Location>(&sql).bind(category_id).fetch_all(&self.pool).await.map_err(map_err)
    }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts ORDER BY id");
        sqlx::query_as::<_, Post>(&sql).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        sqlx::query_as::<_, Post>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        let sql = format!(
            "INSERT INTO posts (title, content, created_by, location_id, media_hash, media_mime) \
             VALUES ($1,$2,$3,$4,$5,$6) RETURNING {POST_COLUMNS}"
        );
        let (hash, mime) = new.media.map(|m| (m.hash, m.mime)).unzip();
        sqlx::query_as::<_, Post>(&sql)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.created_by)
            .bind(new.location_id)
            .bind(hash)
            .bind(mime)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn replace_post(&self, id: Id, changes: PostChanges) -> RepoResult<Post> {
        let sql = format!(
            "UPDATE posts SET title = $2, content = $3, location_id = $4, media_hash = $5, media_mime = $6, \
             updated_at = clock_timestamp() WHERE id = $1 RETURNING {POST_COLUMNS}"
        );
        let (hash, mime) = changes.media.map(|m| (m.hash, m.mime)).unzip();
        sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.location_id)
            .bind(hash)
            .bind(mime)
            .fetch_optional(&self.pool).await.map_err(map_err)?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }

    async fn list_account_posts(&self, account_id: Id) -> RepoResult<Vec<Post>> {
        self.ensure_exists("accounts", account_id).await?;
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE created_by = $1 ORDER BY created_at, id");
        sqlx::query_as::<_, Post>(&sql).bind(account_id).fetch_all(&self.pool).await.map_err(map_err)
    }
}

fn saved_select(kind: ListKind) -> String {
    format!(
        r#"SELECT s.location_id, s.created_at AS added_at,
                  l.id, l.name, l.lat, l.lon, l.description, l.cost, l.created_by, l.created_at, l.updated_at,
                  ARRAY(SELECT lc.category_id FROM location_categories lc
                        WHERE lc.location_id = l.id ORDER BY lc.category_id) AS category_ids
           FROM {} s JOIN locations l ON l.id = s.location_id"#,
        kind.table()
    )
}

#[async_trait]
impl SavedLocationRepo for PgRepo {
    async fn list_saved(&self, kind: ListKind, account_id: Id) -> RepoResult<Vec<SavedLocation>> {
        self.ensure_exists("accounts", account_id).await?;
        let sql = format!("{} WHERE s.account_id = $1 ORDER BY s.created_at, s.location_id", saved_select(kind));
        sqlx::query_as::<_, SavedLocation>(&sql).bind(account_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn add_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<SavedLocation> {
        let insert = format!("INSERT INTO {} (account_id, location_id) VALUES ($1, $2)", kind.table());
        sqlx::query(&insert)
            .bind(account_id)
            .bind(location_id)
            .execute(&self.pool).await
            .map_err(missing_target)?;
        let sql = format!("{} WHERE s.account_id = $1 AND s.location_id = $2", saved_select(kind));
        sqlx::query_as::<_, SavedLocation>(&sql)
            .bind(account_id)
            .bind(location_id)
            .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn remove_saved(&self, kind: ListKind, account_id: Id, location_id: Id) -> RepoResult<()> {
        let sql = format!("DELETE FROM {} WHERE account_id = $1 AND location_id = $2", kind.table());
        let res = sqlx::query(&sql)
            .bind(account_id)
            .bind(location_id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }
}

#[async_trait]
impl CommentRepo for PgRepo {
    async fn list_post_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        self.ensure_exists("posts", post_id).await?;
        let sql = format!("{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at, c.id");
        sqlx::query_as::<_, Comment>(&sql).bind(post_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn list_account_comments(&self, account_id: Id) -> RepoResult<Vec<Comment>> {
        self.ensure_exists("accounts", account_id).await?;
        let sql = format!("{COMMENT_SELECT} WHERE c.created_by = $1 ORDER BY c.created_at, c.id");
        sqlx::query_as::<_, Comment>(&sql).bind(account_id).fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        let sql = format!("{COMMENT_SELECT} WHERE c.id = $1");
        sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
        self.ensure_exists("posts", new.post_id).await?;
        if let Some(parent) = new.parent_id {
            let same_post = sqlx::query("SELECT 1 FROM comments WHERE id = $1 AND post_id = $2")
                .bind(parent)
                .bind(new.post_id)
                .fetch_optional(&self.pool).await.map_err(map_err)?;
            if same_post.is_none() {
                return Err(RepoError::InvalidReference(UNKNOWN_PARENT.into()));
            }
        }
        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (post_id, created_by, parent_id, content) VALUES ($1,$2,$3,$4) \
             RETURNING id, post_id, created_by, parent_id, content, 0::bigint AS like_count, created_at, updated_at",
        )
        .bind(new.post_id)
        .bind(new.created_by)
        .bind(new.parent_id)
        .bind(&new.content)
        .fetch_one(&self.pool).await.map_err(map_err)
    }

    async fn delete_comment(&self, id: Id) -> RepoResult<()> {
        // replies and likes follow through ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }
}

#[async_trait]
impl LikeRepo for PgRepo {
    async fn like_post(&self, post_id: Id, account_id: Id) -> RepoResult<Like> {
        sqlx::query_as::<_, Like>(
            "INSERT INTO post_likes (post_id, account_id) VALUES ($1, $2) RETURNING account_id, created_at",
        )
        .bind(post_id)
        .bind(account_id)
        .fetch_one(&self.pool).await.map_err(missing_target)
    }

    async fn unlike_post(&self, post_id: Id, account_id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND account_id = $2")
            .bind(post_id)
            .bind(account_id)
            .execute(&self.pool).await.map_err(map_err)?;
        affected(res.rows_affected())
    }

    async fn list_post_likes(&self, post_id: Id) -> RepoResult<Vec<Like>> {
        self.ensure_exists("posts", post_id).await?;
        sqlx::query_as::<_, Like>(
            "SELECT account_id, created_at FROM post_likes WHERE post_id = $1 ORDER BY created_at, account_id",
        )
        .bind(post_id)
        .fetch_all(&self.pool).await.map_err(map_err)
    }

    async fn like_comment(&self, comment_id: Id, account_id: Id) -> RepoResult<Comment> {
        sqlx::query("INSERT INTO comment_likes (comment_id, account_id) VALUES ($1, $2)")
            .bind(comment_id)
            .bind(account_id)
            .execute(&self.pool).await.map_err(missing_target)?;
        self.get_comment(comment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_names_map_to_messages() {
        assert_eq!(unique_message("accounts_email_key"), EMAIL_TAKEN);
        assert_eq!(unique_message("visited_pkey"), ALREADY_SAVED);
        assert_eq!(unique_message("comment_likes_pkey"), ALREADY_LIKED);
        assert_eq!(reference_message(Some("comments_parent_id_fkey")), UNKNOWN_PARENT);
        assert_eq!(reference_message(Some("posts_location_id_fkey")), UNKNOWN_LOCATION);
        assert_eq!(reference_message(Some("locations_created_by_fkey")), UNKNOWN_ACCOUNT);
        assert_eq!(reference_message(Some("location_categories_category_id_fkey")), UNKNOWN_CATEGORY);
    }
}
