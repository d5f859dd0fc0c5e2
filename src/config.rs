// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Minimum percentage for a quiz to count as passed.
pub const PASSING_SCORE_PERCENTAGE: f64 = 70.0;

/// Maximum chat message length, counted in characters.
pub const CHAT_MESSAGE_MAX_CHARS: usize = 500;
/// Reply previews are cut down to this many characters.
pub const REPLY_PREVIEW_MAX_CHARS: usize = 100;
/// Size of the live chat feed.
pub const CHAT_FEED_LIMIT: usize = 50;

/// Cap of the materialized per-module leaderboard document.
pub const MATERIALIZED_LEADERBOARD_CAP: usize = 50;
/// Attempts pulled when the leaderboard has to be computed on read.
pub const FALLBACK_ATTEMPT_FETCH: usize = 100;
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

/// Fingerprint logging: requests allowed per fingerprint inside one window.
pub const FINGERPRINT_RATE_LIMIT: usize = 3;
pub const FINGERPRINT_RATE_WINDOW: Duration = Duration::from_secs(60);
/// The limiter prunes idle fingerprints once it tracks more than this many.
pub const RATE_LIMITER_PRUNE_THRESHOLD: usize = 1000;

/// Fingerprint logging retry policy (client side).
pub const FINGERPRINT_LOG_RETRIES: u32 = 2;
pub const FINGERPRINT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const FINGERPRINT_BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Lifetime of the OAuth session cookie.
pub const SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

const DEV_JWT_SECRET: &str = "exam-hub-development-secret";

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without it the server runs on the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub public_base_url: String,
    /// Directory with the static exam pages, served as the router fallback.
    pub static_dir: Option<String>,
    pub github: Option<GithubOAuthConfig>,
    /// GitHub logins holding the admin claim.
    pub admin_github_users: Vec<String>,
    /// Fingerprint hashes allowed through the access gate.
    pub fingerprint_allow_list: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GithubOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(SESSION_TTL_SECONDS as u64);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

        let static_dir = env::var("STATIC_DIR").ok().filter(|v| !v.is_empty());

        let github = match (env::var("GITHUB_CLIENT_ID"), env::var("GITHUB_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(GithubOAuthConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("GITHUB_REDIRECT_URI").ok(),
            }),
            _ => None,
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            public_base_url,
            static_dir,
            github,
            admin_github_users: split_list(&env::var("ADMIN_GITHUB_USERS").unwrap_or_default()),
            fingerprint_allow_list: split_list(
                &env::var("FINGERPRINT_ALLOW_LIST").unwrap_or_default(),
            ),
        }
    }

    /// True when JWT_SECRET was not set and tokens are signed with the built-in secret.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Whether the given GitHub login holds the admin claim (case-insensitive, like GitHub logins).
    pub fn is_admin(&self, login: &str) -> bool {
        self.admin_github_users
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(login))
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_ignores_blanks() {
        assert_eq!(split_list(" alice, ,bob,"), vec!["alice", "bob"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn admin_check_is_case_insensitive() {
        let config = Config {
            database_url: None,
            jwt_secret: "s".into(),
            jwt_expiration: 60,
            rust_log: "info".into(),
            bind_addr: "127.0.0.1:0".into(),
            public_base_url: "http://localhost".into(),
            static_dir: None,
            github: None,
            admin_github_users: vec!["Octocat".into()],
            fingerprint_allow_list: vec![],
        };
        assert!(config.is_admin("octocat"));
        assert!(!config.is_admin("someone"));
        assert!(!config.uses_dev_jwt_secret());
    }

    #[test]
    fn missing_jwt_secret_falls_back_to_dev_secret() {
        // SAFETY: no other test in this binary reads JWT_SECRET.
        unsafe { env::remove_var("JWT_SECRET") };
        assert!(Config::from_env().uses_dev_jwt_secret());
    }
}
