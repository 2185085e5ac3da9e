#![cfg(feature = "inmem-store")]

#[macro_use]
mod common;

use actix_web::{dev::Payload, test, web, FromRequest};
use anywhere::auth::{Auth, Role, TokenService};
use common::{bearer, json, TestEnv, SECRET};

#[actix_web::test]
async fn extractor_resolves_claims() {
    let env = TestEnv::new();
    let (ann, token) = env.account("ann", false).await;
    let req = test::TestRequest::default()
        .app_data(web::Data::new(env.state.clone()))
        .insert_header(bearer(&token))
        .to_http_request();
    let auth = Auth::from_request(&req, &mut Payload::None).await.expect("extract");
    assert_eq!(auth.account_id().unwrap(), ann.id);
    assert_eq!(auth.0.username, "ann");
    assert_eq!(auth.0.roles, vec![Role::User]);
    assert!(!auth.is_admin());
    assert!(auth.ensure_self_or_admin(ann.id).is_ok());
    assert!(auth.ensure_self_or_admin(ann.id + 1).is_err());
}

#[actix_web::test]
async fn admin_claims_pass_ownership_checks() {
    let env = TestEnv::new();
    let (_, token) = env.account("root", true).await;
    let claims = env.state.tokens.verify(&token).unwrap();
    assert!(claims.roles.contains(&Role::Admin));
    let auth = Auth(claims);
    assert!(auth.ensure_self_or_admin(12345).is_ok());
}

#[actix_web::test]
async fn expired_and_tampered_tokens_are_401() {
    let env = TestEnv::new();
    let (ann, token) = env.account("ann", false).await;
    let app = app!(env);

    let expired = TokenService::new(SECRET, chrono::Duration::minutes(-1))
        .issue(&ann)
        .unwrap()
        .access_token;
    // flip one character of the signature
    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    let foreign = TokenService::new("another-secret-that-is-32-bytes-long", chrono::Duration::minutes(5))
        .issue(&ann)
        .unwrap()
        .access_token;

    for bad in [expired, tampered, foreign, "notatoken".to_string()] {
        let req = test::TestRequest::get().uri("/api/account/login").insert_header(bearer(&bad)).to_request();
        let (status, body) = json(test::call_service(&app, req).await).await;
        assert_eq!(status, 401);
        assert!(body["error"].is_string());
    }

    let req = test::TestRequest::get().uri("/api/account/login").to_request();
    let (status, body) = json(test::call_service(&app, req).await).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "authorization required");
}

#[actix_web::test]
async fn mutations_require_a_token() {
    let env = TestEnv::new();
    let app = app!(env);
    let cases = [
        test::TestRequest::post().uri("/api/locations").set_json(common::location_body("x")),
        test::TestRequest::post().uri("/api/categories").set_json(serde_json::json!({ "name": "parks" })),
        test::TestRequest::post().uri("/api/post").set_json(serde_json::json!({ "title": "t", "content": "c", "location_id": 1 })),
        test::TestRequest::delete().uri("/api/post/1"),
        test::TestRequest::put().uri("/api/account").set_json(serde_json::json!({ "id": 1 })),
    ];
    for req in cases {
        assert_eq!(test::call_service(&app, req.to_request()).await.status(), 401);
    }
}
