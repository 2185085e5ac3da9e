#![cfg(feature = "inmem-store")]

#[macro_use]
mod common;

use actix_web::test;
use anywhere::config::DiscordConfig;
use anywhere::oauth::DiscordOAuth;
use anywhere::repo::AccountRepo;
use common::{json, TestEnv};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FRONTEND: &str = "http://front.test";

/// Fake Discord answering every code with `user`.
async fn discord(user: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=good"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "discord-token", "token_type": "Bearer" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("code=bad"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/@me"))
        .and(header("authorization", "Bearer discord-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user))
        .mount(&server)
        .await;
    server
}

fn env_for(server: &MockServer) -> TestEnv {
    let cfg = DiscordConfig {
        client_id: "client-1".into(),
        client_secret: "shh".into(),
        redirect_uri: "http://localhost:8080/api/account/oauth/discord/callback".into(),
        api_base: server.uri(),
    };
    TestEnv::with(|s| s.with_discord(DiscordOAuth::new(cfg)).with_frontend_url(format!("{FRONTEND}/")))
}

/// Token carried by the frontend redirect.
fn redirect_token<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    let token = location.strip_prefix(&format!("{FRONTEND}/?token=")).expect("frontend redirect");
    token.to_string()
}

#[actix_web::test]
async fn callback_creates_account_once() {
    let server = discord(json!({ "id": "42", "username": "ann", "email": "Ann@Discord.example" })).await;
    let env = env_for(&server);
    let app = app!(env);

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback?code=good").to_request();
    let resp = test::call_service(&app, req).await;
    let token = redirect_token(&resp);
    let claims = env.state.tokens.verify(&token).unwrap();
    assert_eq!(claims.username, "ann");

    let account = env.repo.get_account_by_oauth("discord:42").await.unwrap();
    assert_eq!(account.email, "ann@discord.example");
    assert!(account.password_hash.is_none());
    assert!(!account.is_admin);

    // a second login reuses the account
    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback?code=good").to_request();
    let resp = test::call_service(&app, req).await;
    let again = env.state.tokens.verify(&redirect_token(&resp)).unwrap();
    assert_eq!(again.sub, claims.sub);
    assert_eq!(env.repo.list_accounts().await.unwrap().len(), 1);

    // the issued token works against the API
    let req = test::TestRequest::get().uri("/api/account/login").insert_header(common::bearer(&token)).to_request();
    let (status, me) = json(test::call_service(&app, req).await).await;
    assert_eq!(status, 200);
    assert_eq!(me["oauth_identity"], "discord:42");
}

#[actix_web::test]
async fn taken_username_gets_a_suffix() {
    let server = discord(json!({ "id": "7", "username": "ann" })).await;
    let env = env_for(&server);
    env.account("ann", false).await;
    let app = app!(env);

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback?code=good").to_request();
    let resp = test::call_service(&app, req).await;
    redirect_token(&resp);

    let account = env.repo.get_account_by_oauth("discord:7").await.unwrap();
    assert_eq!(account.username, "ann2");
    // no email from Discord
    assert_eq!(account.email, "discord-7@users.noreply.invalid");
}

#[actix_web::test]
async fn email_of_another_account_conflicts() {
    let server = discord(json!({ "id": "9", "username": "imposter", "email": "ann@example.com" })).await;
    let env = env_for(&server);
    env.account("ann", false).await;
    let app = app!(env);

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback?code=good").to_request();
    let (status, body) = json(test::call_service(&app, req).await).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "email already registered");
    assert!(env.repo.get_account_by_oauth("discord:9").await.is_err());
}

#[actix_web::test]
async fn rejected_code_is_unauthorized() {
    let server = discord(json!({ "id": "1", "username": "x" })).await;
    let env = env_for(&server);
    let app = app!(env);

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback?code=bad").to_request();
    let (status, body) = json(test::call_service(&app, req).await).await;
    assert_eq!(status, 401);
    assert_eq!(body["error"], "discord authorization failed");

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/callback").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn login_redirects_to_discord() {
    let server = MockServer::start().await;
    let env = env_for(&server);
    let app = app!(env);

    let req = test::TestRequest::get().uri("/api/account/oauth/discord/login").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 302);
    let location = resp.headers().get("location").unwrap().to_str().unwrap();
    assert!(location.starts_with(&format!("{}/oauth2/authorize?client_id=client-1", server.uri())));
    assert!(location.contains("response_type=code"));
}

#[actix_web::test]
async fn unconfigured_discord_is_unavailable() {
    let env = TestEnv::new();
    let app = app!(env);
    for uri in ["/api/account/oauth/discord/login", "/api/account/oauth/discord/callback?code=x"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let (status, body) = json(test::call_service(&app, req).await).await;
        assert_eq!(status, 503, "{uri}");
        assert_eq!(body["error"], "discord login is not configured");
    }
}
