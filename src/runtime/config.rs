use crate::rpc::auth::RpcCredentials;
use crate::rpc::options::{DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::runtime::telemetry;
use anyhow::{bail, Result};
use std::time::Duration;

pub const DEFAULT_NODE_URL: &str = "http://localhost:8088/v2";
pub const DEFAULT_WALLET_URL: &str = "http://localhost:8089/v2";
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Runtime configuration for one watch run.
///
/// All instances must be constructed via [`WatchConfig::builder`] or [`WatchConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    node_url: String,
    wallet_url: String,
    rpc_credentials: Option<RpcCredentials>,
    settle_delay: Duration,
    fetch_timeout: Duration,
    rpc_timeout: Duration,
    rpc_max_attempts: usize,
    metrics_interval: Duration,
    max_concurrent_jobs: Option<usize>,
}

pub struct WatchConfigParams {
    pub node_url: String,
    pub wallet_url: String,
    pub rpc_credentials: Option<RpcCredentials>,
    pub settle_delay: Duration,
    pub fetch_timeout: Duration,
    pub rpc_timeout: Duration,
    pub rpc_max_attempts: usize,
    pub metrics_interval: Duration,
    pub max_concurrent_jobs: Option<usize>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            node_url: DEFAULT_NODE_URL.to_owned(),
            wallet_url: DEFAULT_WALLET_URL.to_owned(),
            rpc_credentials: None,
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            rpc_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rpc_max_attempts: DEFAULT_MAX_ATTEMPTS,
            metrics_interval: telemetry::DEFAULT_METRICS_INTERVAL,
            max_concurrent_jobs: None,
        }
    }
}

impl WatchConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> WatchConfigBuilder {
        WatchConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: WatchConfigParams) -> Result<Self> {
        let WatchConfigParams {
            node_url,
            wallet_url,
            rpc_credentials,
            settle_delay,
            fetch_timeout,
            rpc_timeout,
            rpc_max_attempts,
            metrics_interval,
            max_concurrent_jobs,
        } = params;

        let config = Self {
            node_url: trimmed_string(node_url),
            wallet_url: trimmed_string(wallet_url),
            rpc_credentials,
            settle_delay,
            fetch_timeout,
            rpc_timeout,
            rpc_max_attempts,
            metrics_interval,
            max_concurrent_jobs,
        };

        config.validate()?;
        Ok(config)
    }

    /// JSON-RPC URL of the ledger node receiving commits and reveals.
    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// JSON-RPC URL of the wallet that composes commits.
    pub fn wallet_url(&self) -> &str {
        &self.wallet_url
    }

    pub fn rpc_credentials(&self) -> Option<&RpcCredentials> {
        self.rpc_credentials.as_ref()
    }

    /// Wait between a successful commit and the matching reveal.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Timeout for one GET against a watched endpoint.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub fn rpc_max_attempts(&self) -> usize {
        self.rpc_max_attempts
    }

    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Cap on jobs running at once; `None` launches every job immediately.
    pub fn max_concurrent_jobs(&self) -> Option<usize> {
        self.max_concurrent_jobs
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.node_url, "node_url")?;
        validate_url(&self.wallet_url, "wallet_url")?;

        if let Some(credentials) = &self.rpc_credentials {
            ensure_not_empty(&credentials.user, "rpc_user")?;
        }

        if self.fetch_timeout.is_zero() {
            bail!("fetch_timeout must be greater than 0");
        }

        if self.rpc_timeout.is_zero() {
            bail!("rpc_timeout must be greater than 0");
        }

        if self.rpc_max_attempts == 0 {
            bail!("rpc_max_attempts must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.max_concurrent_jobs == Some(0) {
            bail!("max_concurrent_jobs must be greater than 0 when set");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct WatchConfigBuilder {
    node_url: Option<String>,
    wallet_url: Option<String>,
    rpc_user: Option<String>,
    rpc_password: Option<String>,
    settle_delay: Option<Duration>,
    fetch_timeout: Option<Duration>,
    rpc_timeout: Option<Duration>,
    rpc_max_attempts: Option<usize>,
    metrics_interval: Option<Duration>,
    max_concurrent_jobs: Option<usize>,
}

impl WatchConfigBuilder {
    pub fn node_url(mut self, url: impl Into<String>) -> Self {
        self.node_url = Some(url.into());
        self
    }

    pub fn wallet_url(mut self, url: impl Into<String>) -> Self {
        self.wallet_url = Some(url.into());
        self
    }

    pub fn rpc_user(mut self, user: impl Into<String>) -> Self {
        self.rpc_user = Some(user.into());
        self
    }

    pub fn rpc_password(mut self, password: impl Into<String>) -> Self {
        self.rpc_password = Some(password.into());
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = Some(delay);
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = Some(timeout);
        self
    }

    pub fn rpc_max_attempts(mut self, attempts: usize) -> Self {
        self.rpc_max_attempts = Some(attempts);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = Some(jobs);
        self
    }

    pub fn build(self) -> Result<WatchConfig> {
        let rpc_credentials = match (self.rpc_user, self.rpc_password) {
            (Some(user), Some(password)) => Some(RpcCredentials {
                user: trimmed_string(user),
                password,
            }),
            (None, None) => None,
            (Some(_), None) => bail!("rpc_password is required when rpc_user is set"),
            (None, Some(_)) => bail!("rpc_user is required when rpc_password is set"),
        };

        let params = WatchConfigParams {
            node_url: self
                .node_url
                .unwrap_or_else(|| DEFAULT_NODE_URL.to_owned()),
            wallet_url: self
                .wallet_url
                .unwrap_or_else(|| DEFAULT_WALLET_URL.to_owned()),
            rpc_credentials,
            settle_delay: self
                .settle_delay
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS)),
            fetch_timeout: self
                .fetch_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS)),
            rpc_timeout: self
                .rpc_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            rpc_max_attempts: self.rpc_max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            max_concurrent_jobs: self.max_concurrent_jobs,
        };

        WatchConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
