// src/services/github.rs

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::{config::GithubOAuthConfig, error::AppError, models::session::GithubUser};

const AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_URL: &str = "https://api.github.com/user";
const USER_AGENT: &str = "exam-hub";

/// The slice of the GitHub API used by the OAuth login.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;

    async fn fetch_user(&self, access_token: &str) -> Result<GithubUser, AppError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct ReqwestGithub {
    client: reqwest::Client,
    oauth: GithubOAuthConfig,
}

impl ReqwestGithub {
    pub fn new(oauth: GithubOAuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            oauth,
        }
    }
}

#[async_trait]
impl GithubApi for ReqwestGithub {
    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let form = [
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("code", code),
        ];

        let response: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.access_token {
            Some(token) => Ok(token),
            None => {
                let reason = response
                    .error_description
                    .or(response.error)
                    .unwrap_or_else(|| "no access token returned".to_string());
                tracing::warn!("GitHub code exchange failed: {}", reason);
                Err(AppError::AuthError("GitHub authorization failed".to_string()))
            }
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GithubUser, AppError> {
        let user = self
            .client
            .get(USER_URL)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json::<GithubUser>()
            .await?;
        Ok(user)
    }
}

/// GitHub authorize URL for the login redirect.
pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> Result<Url, AppError> {
    let mut url =
        Url::parse(AUTHORIZE_URL).map_err(|e| AppError::InternalServerError(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", "read:user")
        .append_pair("state", state);
    Ok(url)
}
