use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::{Account, Id};
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn for_account(account: &Account) -> Vec<Role> {
        if account.is_admin { vec![Role::User, Role::Admin] } else { vec![Role::User] }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub username: String,
    pub roles: Vec<Role>,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64, // seconds
}

/// Signs and verifies HS256 bearer tokens.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, account: &Account) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        self.issue_for(account.id, &account.username, Role::for_account(account))
    }

    pub fn issue_for(&self, id: Id, username: &str, roles: Vec<Role>) -> Result<IssuedToken, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: id.to_string(),
            username: username.to_string(),
            roles,
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { access_token, token_type: "bearer".into(), expires_in: self.ttl.num_seconds() })
    }

    /// Validate a JWT and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn account_id(&self) -> Result<Id, ApiError> {
        self.0.sub.parse().map_err(|_| ApiError::Unauthorized("invalid token subject"))
    }

    pub fn is_admin(&self) -> bool {
        self.0.roles.iter().any(|r| matches!(r, Role::Admin))
    }

    /// Passes for the account itself or any admin.
    pub fn ensure_self_or_admin(&self, account_id: Id) -> Result<(), ApiError> {
        if self.is_admin() || self.account_id()? == account_id {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState missing from app data");
            return ready(Err(ApiError::Internal));
        };
        // Delegate to BearerAuth to parse the header.
        let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() else {
            return ready(Err(ApiError::Unauthorized("authorization required")));
        };
        ready(match state.tokens.verify(bearer.token()) {
            Ok(claims) => Ok(Auth(claims)),
            Err(e) => {
                tracing::debug!("rejected bearer token: {e}");
                Err(ApiError::Unauthorized("invalid or expired token"))
            }
        })
    }
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
}

/// False for malformed hashes as well as mismatches.
pub fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Runs argon2 on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String, ApiError> {
    web::block(move || hash_password(&password))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(|e| {
            tracing::error!("password hashing failed: {e}");
            ApiError::Internal
        })
}

pub async fn verify_password_blocking(hash: String, password: String) -> Result<bool, ApiError> {
    web::block(move || verify_password(&hash, &password))
        .await
        .map_err(|_| ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse battery"));
        assert!(!verify_password(&hash, "wrong horse battery"));
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn tokens_expire() {
        let svc = TokenService::new("0123456789abcdef0123456789abcdef", chrono::Duration::minutes(-5));
        let t = svc.issue_for(1, "ann", vec![Role::User]).unwrap();
        assert!(svc.verify(&t.access_token).is_err());
    }

    #[test]
    fn tokens_from_other_secret_are_rejected() {
        let a = TokenService::new("0123456789abcdef0123456789abcdef", chrono::Duration::minutes(5));
        let b = TokenService::new("fedcba9876543210fedcba9876543210", chrono::Duration::minutes(5));
        let t = a.issue_for(7, "bob", vec![Role::User]).unwrap();
        assert_eq!(a.verify(&t.access_token).unwrap().sub, "7");
        assert!(b.verify(&t.access_token).is_err());
    }
}
