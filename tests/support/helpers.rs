use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use apiwatch::{CapturedResponse, EndpointFetcher, WatchConfig};
use ed25519_dalek::SigningKey;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use serde_json::json;
use tempfile::NamedTempFile;
use tracing_subscriber::EnvFilter;

pub const FUNDING_ADDRESS: &str = "EC2DKSYyRcNWf7RS963VFYgMExoHRYLHVeCfQ9PGPmNzwrcmgm2r";

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Hex form of the 64-byte keypair (seed followed by public key).
pub fn secret_key_hex(seed: u8) -> String {
    hex::encode(signing_key(seed).to_keypair_bytes())
}

pub fn chain_id(fill: u8) -> String {
    hex::encode([fill; 32])
}

pub fn job_record(api_method: &str, chain_id: &str, secret_key: &str) -> String {
    json!({
        "APIMethod": api_method,
        "ChainID": chain_id,
        "SecKey": secret_key,
        "ECAddr": FUNDING_ADDRESS,
    })
    .to_string()
}

/// Writes records back to back, the way the job file is laid out on disk.
pub fn write_job_file<S: AsRef<str>>(records: &[S]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new().context("failed to create job file")?;
    for record in records {
        writeln!(file, "{}", record.as_ref()).context("failed to write job record")?;
    }
    file.flush().context("failed to flush job file")?;
    Ok(file)
}

pub fn test_config(node_url: &str, settle_delay: Duration) -> Result<WatchConfig> {
    WatchConfig::builder()
        .node_url(node_url)
        .wallet_url(node_url)
        .settle_delay(settle_delay)
        .fetch_timeout(Duration::from_secs(5))
        .rpc_timeout(Duration::from_secs(5))
        .build()
}

/// In-memory endpoint answering every URL with the same response.
pub struct StaticFetcher {
    response: CapturedResponse,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(status: u16, body: &str) -> Self {
        Self {
            response: CapturedResponse {
                body: body.as_bytes().to_vec(),
                status,
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EndpointFetcher for StaticFetcher {
    fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<CapturedResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.clone();
        Box::pin(async move { Ok(response) })
    }
}
