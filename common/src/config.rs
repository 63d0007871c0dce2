use serde::Deserialize;
use std::{collections::HashMap, error::Error, fs, path::PathBuf};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    pub project_name: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            project_name: "beneficiary-risk-portal".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub server_address: String,
    pub log_level: String,
    pub cors_origin: String,
    /// Upper bound for uploaded CSV files and request bodies.
    pub max_upload_bytes: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            cors_origin: "http://localhost:8080".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Fixed-window limit per client address on `/api` routes.
/// `max_requests: 0` turns the limiter off.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    #[default]
    Http,
    Expression,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GatewayConfig {
    pub kind: GatewayKind,
    pub url: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Used when `kind` is `expression`; evaluated over
    /// `bank_dup_count`, `mobile_dup_count` and `age_anomaly`.
    pub expression: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: GatewayKind::Http,
            url: None,
            timeout_ms: 3_000,
            max_retries: 2,
            retry_backoff_ms: 200,
            expression: "min(100.0, 25.0 * (bank_dup_count - 1.0) + 25.0 * (mobile_dup_count - 1.0) + 50.0 * age_anomaly)"
                .to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DuplicatesConfig {
    pub default_bank_count: u64,
    pub default_mobile_count: u64,
    /// Historical beneficiary CSV used for single-record duplicate lookups.
    pub reference_csv: Option<PathBuf>,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            default_bank_count: 1,
            default_mobile_count: 1,
            reference_csv: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlobStoreKind {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BlobStoreConfig {
    pub kind: BlobStoreKind,
    pub root_dir: PathBuf,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            kind: BlobStoreKind::Memory,
            root_dir: PathBuf::from("target/uploads"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: "gov".to_string(),
            password: "pass".to_string(),
            jwt_secret: String::new(),
            token_ttl_minutes: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub top_n: usize,
    /// Estimated loss per scored record, keyed by tier name (`low`, `medium`, `high`).
    pub leakage_per_record: HashMap<String, f64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            top_n: 10,
            leakage_per_record: HashMap::from([
                ("low".to_string(), 500.0),
                ("medium".to_string(), 2_000.0),
                ("high".to_string(), 10_000.0),
            ]),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub common: CommonConfig,
    pub backend: BackendConfig,
    pub gateway: GatewayConfig,
    pub duplicates: DuplicatesConfig,
    pub blob_store: BlobStoreConfig,
    pub auth: AuthConfig,
    pub batch: BatchConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let contents = fs::read_to_string(config_path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let config = serde_yml::from_str(contents)?;
        Ok(config)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(address) = lookup("SERVER_ADDRESS") {
            self.backend.server_address = address;
        }
        if let Some(url) = lookup("SCORING_GATEWAY_URL") {
            self.gateway.url = Some(url);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            tracing::debug!("JWT secret taken from environment");
            self.auth.jwt_secret = secret;
        }
        if let Some(username) = lookup("PORTAL_USERNAME") {
            self.auth.username = username;
        }
        if let Some(password) = lookup("PORTAL_PASSWORD") {
            self.auth.password = password;
        }
    }

    pub fn validate(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.batch.concurrency == 0 {
            return Err("batch.concurrency must be at least 1".into());
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err("auth.jwt_secret must be set (or JWT_SECRET exported)".into());
        }
        if self.backend.rate_limit.max_requests > 0 && self.backend.rate_limit.window_secs == 0 {
            return Err("backend.rate_limit.window_secs must be positive".into());
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err("auth.token_ttl_minutes must be positive".into());
        }
        if self.gateway.kind == GatewayKind::Http
            && self.gateway.url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err("gateway.url is required when gateway.kind is http".into());
        }
        Ok(())
    }
}
