//! Discord authorization-code login.

use reqwest::header;
use serde::Deserialize;
use thiserror::Error;

use crate::config::DiscordConfig;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("discord request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("discord rejected the code exchange ({0})")]
    Rejected(reqwest::StatusCode),
}

#[derive(Deserialize)]
struct DiscordTokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl DiscordUser {
    /// Value stored in `Account::oauth_identity`.
    pub fn identity(&self) -> String {
        format!("discord:{}", self.id)
    }
}

pub struct DiscordOAuth {
    cfg: DiscordConfig,
    http: reqwest::Client,
}

impl DiscordOAuth {
    pub fn new(cfg: DiscordConfig) -> Self {
        Self { cfg, http: reqwest::Client::new() }
    }

    pub fn authorize_url(&self) -> String {
        format!(
            "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope=identify%20email",
            self.cfg.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.cfg.client_id),
            urlencoding::encode(&self.cfg.redirect_uri)
        )
    }

    /// Trade an authorization code for the Discord user it belongs to.
    pub async fn exchange(&self, code: &str) -> Result<DiscordUser, OAuthError> {
        let base = self.cfg.api_base.trim_end_matches('/');
        let resp = self
            .http
            .post(format!("{base}/oauth2/token"))
            .form(&[
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.cfg.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(OAuthError::Rejected(resp.status()));
        }
        let token = resp.json::<DiscordTokenResponse>().await?;

        let user = self
            .http
            .get(format!("{base}/users/@me"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token.access_token))
            .send()
            .await?
            .error_for_status()?
            .json::<DiscordUser>()
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_encodes_redirect() {
        let oauth = DiscordOAuth::new(DiscordConfig {
            client_id: "123".into(),
            client_secret: "s".into(),
            redirect_uri: "http://localhost:8080/api/account/oauth/discord/callback".into(),
            api_base: "https://discord.com/api/".into(),
        });
        let url = oauth.authorize_url();
        assert!(url.starts_with("https://discord.com/api/oauth2/authorize?client_id=123&"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fapi%2Faccount%2Foauth%2Fdiscord%2Fcallback"));
    }
}
