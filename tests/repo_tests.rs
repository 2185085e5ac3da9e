use anywhere::models::*;
use anywhere::repo::{Repo, RepoError};

fn account(tag: &str, name: &str) -> NewAccount {
    NewAccount {
        email: format!("{name}-{tag}@example.com"),
        username: format!("{name}-{tag}"),
        password_hash: Some("$argon2id$placeholder".into()),
        oauth_identity: None,
        is_admin: false,
    }
}

fn location(name: &str, owner: Id, category_ids: Vec<Id>) -> NewLocation {
    NewLocation {
        name: name.into(),
        coordinates: Coordinates { lat: 45.0, lon: 9.0 },
        description: "somewhere".into(),
        cost: None,
        category_ids,
        created_by: owner,
    }
}

fn post(title: &str, owner: Id, location_id: Id) -> NewPost {
    NewPost { title: title.into(), content: "body".into(), created_by: owner, location_id, media: None }
}

/// Shared scenario; `tag` keeps unique columns apart on a reused database.
async fn conflicts_and_references<R: Repo>(r: &R, tag: &str) {
    let ann = r.create_account(account(tag, "ann")).await.unwrap();

    let mut dup = account(tag, "other");
    dup.email = ann.email.clone();
    match r.create_account(dup).await {
        Err(RepoError::Conflict(msg)) => assert_eq!(msg, "email already registered"),
        other => panic!("expected email conflict, got {other:?}"),
    }
    let mut dup = account(tag, "other");
    dup.username = ann.username.clone();
    match r.create_account(dup).await {
        Err(RepoError::Conflict(msg)) => assert_eq!(msg, "username already taken"),
        other => panic!("expected username conflict, got {other:?}"),
    }

    assert!(matches!(r.create_location(location("x", -1, vec![])).await, Err(RepoError::InvalidReference(_))));
    assert!(matches!(
        r.create_location(location("x", ann.id, vec![-5])).await,
        Err(RepoError::InvalidReference(_))
    ));
    assert!(matches!(r.create_post(post("t", ann.id, -1)).await, Err(RepoError::InvalidReference(_))));
    assert!(matches!(r.get_account(-1).await, Err(RepoError::NotFound)));
    assert!(matches!(r.delete_post(-1).await, Err(RepoError::NotFound)));

    let cat_name = format!("parks-{tag}");
    let cat = r
        .create_category(NewCategory { name: cat_name.clone(), description: None, created_by: ann.id })
        .await
        .unwrap();
    assert!(matches!(
        r.create_category(NewCategory { name: cat_name, description: None, created_by: ann.id }).await,
        Err(RepoError::Conflict(_))
    ));
    assert!(r.list_category_locations(cat.id).await.unwrap().is_empty());
    assert!(matches!(r.list_category_locations(-1).await, Err(RepoError::NotFound)));

    let loc = r.create_location(location("park", ann.id, vec![cat.id, cat.id])).await.unwrap();
    assert_eq!(loc.category_ids, vec![cat.id]);
    assert_eq!(r.list_category_locations(cat.id).await.unwrap().len(), 1);

    r.delete_category(cat.id).await.unwrap();
    assert!(r.get_location(loc.id).await.unwrap().category_ids.is_empty());
}

async fn cascades_and_ordering<R: Repo>(r: &R, tag: &str) {
    let ann = r.create_account(account(tag, "ann")).await.unwrap();
    let bob = r.create_account(account(tag, "bob")).await.unwrap();
    let loc = r.create_location(location("square", ann.id, vec![])).await.unwrap();

    let first = r.create_post(post("first", bob.id, loc.id)).await.unwrap();
    let second = r.create_post(post("second", bob.id, loc.id)).await.unwrap();
    let ids: Vec<Id> = r.list_account_posts(bob.id).await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    let saved = r.add_saved(ListKind::Wishlist, bob.id, loc.id).await.unwrap();
    assert_eq!(saved.location.id, loc.id);
    assert!(matches!(r.add_saved(ListKind::Wishlist, bob.id, loc.id).await, Err(RepoError::Conflict(_))));
    assert!(matches!(r.add_saved(ListKind::Wishlist, bob.id, -1).await, Err(RepoError::NotFound)));
    assert!(r.list_saved(ListKind::Visited, bob.id).await.unwrap().is_empty());
    r.add_saved(ListKind::Visited, bob.id, loc.id).await.unwrap();

    // the location goes, and with it bob's posts and list entries
    r.delete_location(loc.id).await.unwrap();
    assert!(matches!(r.get_post(first.id).await, Err(RepoError::NotFound)));
    assert!(r.list_account_posts(bob.id).await.unwrap().is_empty());
    assert!(r.list_saved(ListKind::Wishlist, bob.id).await.unwrap().is_empty());
    assert!(r.list_saved(ListKind::Visited, bob.id).await.unwrap().is_empty());
    assert!(matches!(r.remove_saved(ListKind::Wishlist, bob.id, loc.id).await, Err(RepoError::NotFound)));

    // deleting an account removes what it owns
    let loc = r.create_location(location("pier", ann.id, vec![])).await.unwrap();
    let p = r.create_post(post("on ann's pier", ann.id, loc.id)).await.unwrap();
    assert_eq!(r.delete_locations_by_owner(bob.id).await.unwrap(), 0);
    r.delete_account(ann.id).await.unwrap();
    assert!(matches!(r.get_location(loc.id).await, Err(RepoError::NotFound)));
    assert!(matches!(r.get_post(p.id).await, Err(RepoError::NotFound)));
    assert!(matches!(r.list_account_posts(ann.id).await, Err(RepoError::NotFound)));
    assert!(matches!(r.delete_account(ann.id).await, Err(RepoError::NotFound)));
}

async fn comments_and_likes<R: Repo>(r: &R, tag: &str) {
    let ann = r.create_account(account(tag, "ann")).await.unwrap();
    let bob = r.create_account(account(tag, "bob")).await.unwrap();
    let loc = r.create_location(location("cafe", ann.id, vec![])).await.unwrap();
    let p = r.create_post(post("latte", ann.id, loc.id)).await.unwrap();
    let other = r.create_post(post("espresso", ann.id, loc.id)).await.unwrap();
    let new = |post_id, created_by, parent_id| NewComment { post_id, created_by, parent_id, content: "nice".into() };

    let root = r.create_comment(new(p.id, bob.id, None)).await.unwrap();
    let reply = r.create_comment(new(p.id, ann.id, Some(root.id))).await.unwrap();
    assert!(matches!(r.create_comment(new(-1, bob.id, None)).await, Err(RepoError::NotFound)));
    assert!(matches!(
        r.create_comment(new(other.id, bob.id, Some(root.id))).await,
        Err(RepoError::InvalidReference(_))
    ));
    let ids: Vec<Id> = r.list_post_comments(p.id).await.unwrap().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![root.id, reply.id]);
    assert_eq!(r.list_account_comments(bob.id).await.unwrap().len(), 1);

    let liked = r.like_comment(root.id, ann.id).await.unwrap();
    assert_eq!(liked.like_count, 1);
    assert!(matches!(r.like_comment(root.id, ann.id).await, Err(RepoError::Conflict(_))));
    assert_eq!(r.get_comment(root.id).await.unwrap().like_count, 1);

    let like = r.like_post(p.id, bob.id).await.unwrap();
    assert_eq!(like.account_id, bob.id);
    assert!(matches!(r.like_post(p.id, bob.id).await, Err(RepoError::Conflict(_))));
    assert!(matches!(r.like_post(-1, bob.id).await, Err(RepoError::NotFound)));
    assert_eq!(r.list_post_likes(p.id).await.unwrap(), vec![like]);

    // bob leaves: his comment, its reply and his like go with him
    r.delete_account(bob.id).await.unwrap();
    assert!(r.list_post_comments(p.id).await.unwrap().is_empty());
    assert!(matches!(r.get_comment(reply.id).await, Err(RepoError::NotFound)));
    assert!(r.list_post_likes(p.id).await.unwrap().is_empty());

    r.create_comment(new(p.id, ann.id, None)).await.unwrap();
    r.delete_post(p.id).await.unwrap();
    assert!(r.list_account_comments(ann.id).await.unwrap().is_empty());
    assert!(matches!(r.list_post_comments(p.id).await, Err(RepoError::NotFound)));
}

async fn partial_account_update<R: Repo>(r: &R, tag: &str) {
    let ann = r.create_account(account(tag, "ann")).await.unwrap();
    let bob = r.create_account(account(tag, "bob")).await.unwrap();

    let renamed = r
        .update_account(ann.id, AccountChanges { username: Some(format!("annie-{tag}")), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(renamed.email, ann.email);
    assert_eq!(renamed.password_hash, ann.password_hash);
    assert_eq!(r.get_account_by_username(&format!("annie-{tag}")).await.unwrap().id, ann.id);

    let taken = AccountChanges { email: Some(bob.email.clone()), ..Default::default() };
    assert!(matches!(r.update_account(ann.id, taken).await, Err(RepoError::Conflict(_))));
    // keeping your own email is not a conflict
    let same = AccountChanges { email: Some(ann.email.clone()), ..Default::default() };
    assert!(r.update_account(ann.id, same).await.is_ok());
    assert!(matches!(r.update_account(-1, AccountChanges::default()).await, Err(RepoError::NotFound)));
}

#[cfg(feature = "inmem-store")]
mod inmem {
    use super::*;
    use anywhere::repo::inmem::InMemRepo;

    #[tokio::test]
    async fn conflicts_and_references() {
        super::conflicts_and_references(&InMemRepo::new(), "mem").await;
    }

    #[tokio::test]
    async fn cascades_and_ordering() {
        super::cascades_and_ordering(&InMemRepo::new(), "mem").await;
    }

    #[tokio::test]
    async fn partial_account_update() {
        super::partial_account_update(&InMemRepo::new(), "mem").await;
    }

    #[tokio::test]
    async fn comments_and_likes() {
        super::comments_and_likes(&InMemRepo::new(), "mem").await;
    }
}

#[cfg(feature = "postgres-store")]
mod pg {
    use anywhere::repo::pg::PgRepo;
    use sqlx::postgres::PgPoolOptions;

    /// `None` (test skipped) unless DATABASE_URL points at a reachable server.
    async fn repo() -> Option<PgRepo> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.ok()?;
        let repo = PgRepo::new(pool);
        repo.migrate().await.expect("migrations apply");
        Some(repo)
    }

    fn tag() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn conflicts_and_references() {
        let Some(r) = repo().await else { return };
        super::conflicts_and_references(&r, &tag()).await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn cascades_and_ordering() {
        let Some(r) = repo().await else { return };
        super::cascades_and_ordering(&r, &tag()).await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn partial_account_update() {
        let Some(r) = repo().await else { return };
        super::partial_account_update(&r, &tag()).await;
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn comments_and_likes() {
        let Some(r) = repo().await else { return };
        super::comments_and_likes(&r, &tag()).await;
    }
}
