#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::Value;

use anywhere::auth::{hash_password, TokenService};
use anywhere::models::{Account, NewAccount};
use anywhere::repo::inmem::InMemRepo;
use anywhere::repo::AccountRepo;
use anywhere::storage::FsMediaStore;
use anywhere::AppState;
use std::sync::{Arc, OnceLock};

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const PASSWORD: &str = "correct horse battery";

/// Argon2 is slow in debug builds; hash the shared password once.
pub fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap()).clone()
}

pub fn token_service() -> TokenService {
    TokenService::new(SECRET, chrono::Duration::minutes(30))
}

/// Fresh repository, media dir and state for one test.
pub struct TestEnv {
    pub repo: InMemRepo,
    pub state: AppState,
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with(|s| s)
    }

    pub fn with(customize: impl FnOnce(AppState) -> AppState) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = InMemRepo::new();
        let media = FsMediaStore::new(dir.path().join("media")).unwrap();
        let state = customize(AppState::new(Arc::new(repo.clone()), Arc::new(media), token_service()));
        Self { repo, state, dir }
    }

    /// Seeds an account directly and returns it with a bearer token.
    pub async fn account(&self, username: &str, is_admin: bool) -> (Account, String) {
        let account = self
            .repo
            .create_account(NewAccount {
                email: format!("{username}@example.com"),
                username: username.into(),
                password_hash: Some(password_hash()),
                oauth_identity: None,
                is_admin,
            })
            .await
            .unwrap();
        let token = self.state.tokens.issue(&account).unwrap().access_token;
        (account, token)
    }
}

/// Test service over the env's state; use with `#[macro_use] mod common;`.
macro_rules! app {
    ($env:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(anywhere::SecurityHeaders::default())
                .app_data(actix_web::web::Data::new($env.state.clone()))
                .configure(anywhere::config),
        )
        .await
    };
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// Status plus parsed JSON body (`Null` when empty).
pub async fn json<B: MessageBody>(resp: ServiceResponse<B>) -> (StatusCode, Value) {
    let status = resp.status();
    let body = test::read_body(resp).await;
    let value = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, value)
}

pub fn location_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "coordinates": { "lat": 48.1486, "lon": 17.1077 },
        "description": "old town square",
    })
}

pub const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];
pub const MP4_HEADER: &[u8] = &[0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];

pub fn padded(header: &[u8], len: usize) -> Vec<u8> {
    let mut v = header.to_vec();
    v.resize(len.max(header.len()), 0x2a);
    v
}

/// Single-field multipart body and its content type.
pub fn multipart(field: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "anywhere-test-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.bin\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
