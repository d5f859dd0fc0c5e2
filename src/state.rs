use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::Config,
    services::{
        chat::ChatService,
        github::{GithubApi, ReqwestGithub},
        leaderboard::LeaderboardService,
        rate_limit::FingerprintRateLimiter,
    },
    store::SharedStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Config,
    pub leaderboard: LeaderboardService,
    pub chat: ChatService,
    pub rate_limiter: FingerprintRateLimiter,
    /// `None` when GitHub OAuth is not configured.
    pub github: Option<Arc<dyn GithubApi>>,
}

impl AppState {
    /// Wires the services around one store. GitHub access comes from the config.
    pub fn new(store: SharedStore, config: Config) -> Self {
        let github = config
            .github
            .clone()
            .map(|oauth| Arc::new(ReqwestGithub::new(oauth)) as Arc<dyn GithubApi>);
        Self::with_github(store, config, github)
    }

    pub fn with_github(
        store: SharedStore,
        config: Config,
        github: Option<Arc<dyn GithubApi>>,
    ) -> Self {
        Self {
            leaderboard: LeaderboardService::new(store.clone()),
            chat: ChatService::new(store.clone()),
            rate_limiter: FingerprintRateLimiter::default(),
            store,
            config,
            github,
        }
    }
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for LeaderboardService {
    fn from_ref(state: &AppState) -> Self {
        state.leaderboard.clone()
    }
}

impl FromRef<AppState> for ChatService {
    fn from_ref(state: &AppState) -> Self {
        state.chat.clone()
    }
}

impl FromRef<AppState> for FingerprintRateLimiter {
    fn from_ref(state: &AppState) -> Self {
        state.rate_limiter.clone()
    }
}
