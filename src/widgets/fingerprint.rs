// src/widgets/fingerprint.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::{
    config::{
        Config, FINGERPRINT_BACKOFF_BASE, FINGERPRINT_BACKOFF_CAP, FINGERPRINT_LOG_RETRIES,
    },
    models::fingerprint::{FingerprintLogRequest, FingerprintLogResponse},
    widgets::persistence::{FINGERPRINT_LOGS_KEY, LocalStore},
};

/// Records kept under `fingerprint_logs`; older ones are dropped first.
pub const MAX_LOCAL_LOG_RECORDS: usize = 20;

pub const RESTRICTED_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Access restricted</title></head>
<body>
<h1>Access restricted</h1>
<p>This device is not on the access list for these pages.</p>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("environment property '{0}' is unavailable")]
    MissingProperty(&'static str),
    #[error("hashing failed: {0}")]
    Hash(String),
}

/// Environment properties that make up the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProps {
    pub user_agent: String,
    pub language: String,
    pub hardware_concurrency: u32,
    pub device_memory: Option<f64>,
    pub platform: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    /// Minutes from UTC, as the browser reports it.
    pub timezone_offset: i32,
    pub local_storage: bool,
    pub session_storage: bool,
    pub indexed_db: bool,
    pub cookie_enabled: bool,
    /// IANA zone name. Sent with log records, not hashed.
    #[serde(default)]
    pub time_zone_name: Option<String>,
}

impl EnvironmentProps {
    /// The one concatenation every call site hashes. Field order is fixed.
    pub fn canonical_string(&self) -> String {
        let device_memory = self
            .device_memory
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        [
            self.user_agent.clone(),
            self.language.clone(),
            self.hardware_concurrency.to_string(),
            device_memory,
            self.platform.clone(),
            format!("{}x{}", self.screen_width, self.screen_height),
            self.color_depth.to_string(),
            self.timezone_offset.to_string(),
            self.local_storage.to_string(),
            self.session_storage.to_string(),
            self.indexed_db.to_string(),
            self.cookie_enabled.to_string(),
        ]
        .join("|")
    }

    /// Lowercase hex SHA-256 of [`EnvironmentProps::canonical_string`].
    pub fn fingerprint_hash(&self) -> Result<String, FingerprintError> {
        if self.user_agent.is_empty() {
            return Err(FingerprintError::MissingProperty("user_agent"));
        }
        let digest = Sha256::digest(self.canonical_string().as_bytes());
        Ok(hex::encode(digest))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    /// Replace the whole page with this document.
    Restricted(String),
}

/// Decides whether a device fingerprint may see the page.
pub struct AccessGate {
    allow_list: HashSet<String>,
}

impl AccessGate {
    /// An empty list lets every device through.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allow_list: allowed
                .into_iter()
                .map(|h| h.as_ref().trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.fingerprint_allow_list)
    }

    /// Hashing problems render the page rather than lock a device out.
    pub fn decide(&self, props: Result<EnvironmentProps, FingerprintError>) -> GateDecision {
        if self.allow_list.is_empty() {
            return GateDecision::Render;
        }

        let hash = match props.and_then(|p| p.fingerprint_hash()) {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!("Fingerprint unavailable, letting page render: {}", e);
                return GateDecision::Render;
            }
        };

        if self.allow_list.contains(&hash) {
            GateDecision::Render
        } else {
            tracing::info!(fingerprint = %hash, "Device not on access list");
            GateDecision::Restricted(RESTRICTED_PAGE.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rate limited")]
    RateLimited,
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
}

/// Delivers log requests to the fingerprint endpoint.
#[async_trait]
pub trait FingerprintTransport: Send + Sync {
    async fn post(
        &self,
        req: &FingerprintLogRequest,
    ) -> Result<FingerprintLogResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl ReqwestTransport {
    /// `base_url` is the site root, e.g. `https://exams.example.org`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/fingerprint", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl FingerprintTransport for ReqwestTransport {
    async fn post(
        &self,
        req: &FingerprintLogRequest,
    ) -> Result<FingerprintLogResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(req)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }
}

/// One entry of the local `fingerprint_logs` history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintLogRecord {
    pub fp: String,
    pub ts: i64,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
    pub rate_limited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutcome {
    Logged { client_ip: Option<String> },
    RateLimited,
    Failed,
    /// The fingerprint could not be computed, nothing was sent.
    Skipped,
}

/// Wait before retry number `retry` (0-based): base * 2^retry, capped.
pub fn backoff_delay(retry: u32, base: Duration, cap: Duration) -> Duration {
    base.checked_mul(2u32.saturating_pow(retry))
        .map_or(cap, |delay| delay.min(cap))
}

pub struct FingerprintLogger {
    transport: Arc<dyn FingerprintTransport>,
    store: LocalStore,
    max_retries: u32,
    backoff_base: Duration,
    backoff_cap: Duration,
}

impl FingerprintLogger {
    pub fn new(transport: Arc<dyn FingerprintTransport>, store: LocalStore) -> Self {
        Self {
            transport,
            store,
            max_retries: FINGERPRINT_LOG_RETRIES,
            backoff_base: FINGERPRINT_BACKOFF_BASE,
            backoff_cap: FINGERPRINT_BACKOFF_CAP,
        }
    }

    /// Reports a visit. Failures are logged and never reach the caller.
    pub async fn log(&self, props: &EnvironmentProps, page_url: &str, name: Option<&str>) -> LogOutcome {
        let fp = match props.fingerprint_hash() {
            Ok(fp) => fp,
            Err(e) => {
                tracing::warn!("Skipping visit log: {}", e);
                return LogOutcome::Skipped;
            }
        };

        let req = FingerprintLogRequest {
            fp: fp.clone(),
            ua: Some(props.user_agent.clone()),
            lang: Some(props.language.clone()),
            tz: props.time_zone_name.clone(),
            ts: Some(chrono::Utc::now().timestamp_millis()),
            url: Some(page_url.to_string()),
            name: name.map(str::to_string),
        };

        let mut retry = 0;
        loop {
            match self.transport.post(&req).await {
                Ok(response) => {
                    self.record(&req, response.client_ip.clone(), false);
                    return LogOutcome::Logged {
                        client_ip: response.client_ip,
                    };
                }
                Err(TransportError::RateLimited) => {
                    tracing::info!(fingerprint = %fp, "Visit log rate limited");
                    self.record(&req, None, true);
                    return LogOutcome::RateLimited;
                }
                Err(e) if retry < self.max_retries => {
                    let delay = backoff_delay(retry, self.backoff_base, self.backoff_cap);
                    tracing::debug!(retry, ?delay, "Visit log failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    tracing::warn!(fingerprint = %fp, "Giving up on visit log: {}", e);
                    return LogOutcome::Failed;
                }
            }
        }
    }

    fn record(&self, req: &FingerprintLogRequest, client_ip: Option<String>, rate_limited: bool) {
        let mut records: Vec<FingerprintLogRecord> =
            self.store.load(FINGERPRINT_LOGS_KEY).unwrap_or_default();
        records.push(FingerprintLogRecord {
            fp: req.fp.clone(),
            ts: req.ts.unwrap_or_default(),
            url: req.url.clone().unwrap_or_default(),
            name: req.name.clone(),
            client_ip,
            rate_limited,
        });
        if records.len() > MAX_LOCAL_LOG_RECORDS {
            let excess = records.len() - MAX_LOCAL_LOG_RECORDS;
            records.drain(..excess);
        }
        if let Err(e) = self.store.save(FINGERPRINT_LOGS_KEY, &records) {
            tracing::warn!("Failed to store visit log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn props() -> EnvironmentProps {
        EnvironmentProps {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64)".into(),
            language: "en-US".into(),
            hardware_concurrency: 8,
            device_memory: Some(8.0),
            platform: "Linux x86_64".into(),
            screen_width: 1920,
            screen_height: 1080,
            color_depth: 24,
            timezone_offset: -120,
            local_storage: true,
            session_storage: true,
            indexed_db: true,
            cookie_enabled: true,
            time_zone_name: Some("Europe/Berlin".into()),
        }
    }

    /// Replays scripted responses and counts calls.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<FingerprintLogResponse, TransportError>>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<FingerprintLogResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl FingerprintTransport for ScriptedTransport {
        async fn post(
            &self,
            _req: &FingerprintLogRequest,
        ) -> Result<FingerprintLogResponse, TransportError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(TransportError::Status(500)))
        }
    }

    fn ok_response() -> Result<FingerprintLogResponse, TransportError> {
        Ok(FingerprintLogResponse {
            success: true,
            client_ip: Some("203.0.113.7".into()),
            ipv4: Some("203.0.113.7".into()),
            ipv6: None,
        })
    }

    #[test]
    fn hash_is_deterministic_and_ignores_zone_name() {
        let a = props();
        let mut b = props();
        b.time_zone_name = None;

        let hash = a.fingerprint_hash().unwrap();
        assert_eq!(hash, b.fingerprint_hash().unwrap());
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let mut c = props();
        c.screen_width = 1280;
        assert_ne!(hash, c.fingerprint_hash().unwrap());
    }

    #[test]
    fn canonical_string_has_fixed_order() {
        assert_eq!(
            props().canonical_string(),
            "Mozilla/5.0 (X11; Linux x86_64)|en-US|8|8|Linux x86_64|1920x1080|24|-120|true|true|true|true"
        );
    }

    #[test]
    fn gate_checks_allow_list_and_fails_open() {
        let hash = props().fingerprint_hash().unwrap();
        let gate = AccessGate::new([hash.to_uppercase()]);
        assert_eq!(gate.decide(Ok(props())), GateDecision::Render);

        let mut stranger = props();
        stranger.language = "fr-FR".into();
        assert!(matches!(gate.decide(Ok(stranger)), GateDecision::Restricted(_)));

        assert_eq!(
            gate.decide(Err(FingerprintError::Hash("no crypto".into()))),
            GateDecision::Render
        );
        let mut broken = props();
        broken.user_agent.clear();
        assert_eq!(gate.decide(Ok(broken)), GateDecision::Render);

        let open = AccessGate::new(Vec::<String>::new());
        assert_eq!(open.decide(Ok(props())), GateDecision::Render);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(5);
        assert_eq!(backoff_delay(0, base, cap), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, base, cap), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, base, cap), Duration::from_secs(4));
        assert_eq!(backoff_delay(3, base, cap), Duration::from_secs(5));
        assert_eq!(backoff_delay(40, base, cap), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_twice_then_gives_up() {
        let transport = ScriptedTransport::new(vec![]);
        let store = LocalStore::in_memory();
        let logger = FingerprintLogger::new(transport.clone(), store.clone());

        let started = tokio::time::Instant::now();
        assert_eq!(logger.log(&props(), "/exam", None).await, LogOutcome::Failed);
        assert_eq!(transport.calls(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
        assert_eq!(store.load::<Vec<FingerprintLogRecord>>(FINGERPRINT_LOGS_KEY), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Network("reset".into())),
            ok_response(),
        ]);
        let store = LocalStore::in_memory();
        let logger = FingerprintLogger::new(transport.clone(), store.clone());

        let outcome = logger.log(&props(), "/exam", Some("alice")).await;
        assert_eq!(
            outcome,
            LogOutcome::Logged {
                client_ip: Some("203.0.113.7".into())
            }
        );
        assert_eq!(transport.calls(), 2);

        let records: Vec<FingerprintLogRecord> = store.load(FINGERPRINT_LOGS_KEY).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].client_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(records[0].name.as_deref(), Some("alice"));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_not_retried_and_recorded_without_ip() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::RateLimited)]);
        let store = LocalStore::in_memory();
        let logger = FingerprintLogger::new(transport.clone(), store.clone());

        assert_eq!(logger.log(&props(), "/exam", None).await, LogOutcome::RateLimited);
        assert_eq!(transport.calls(), 1);

        let records: Vec<FingerprintLogRecord> = store.load(FINGERPRINT_LOGS_KEY).unwrap();
        assert!(records[0].rate_limited);
        assert_eq!(records[0].client_ip, None);
    }

    #[tokio::test]
    async fn local_history_keeps_latest_twenty() {
        let responses = (0..25).map(|_| ok_response()).collect();
        let transport = ScriptedTransport::new(responses);
        let store = LocalStore::in_memory();
        let logger = FingerprintLogger::new(transport, store.clone());

        for i in 0..25 {
            logger.log(&props(), &format!("/page{i}"), None).await;
        }

        let records: Vec<FingerprintLogRecord> = store.load(FINGERPRINT_LOGS_KEY).unwrap();
        assert_eq!(records.len(), MAX_LOCAL_LOG_RECORDS);
        assert_eq!(records[0].url, "/page5");
        assert_eq!(records[19].url, "/page24");
    }
}
