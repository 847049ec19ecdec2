use anyhow::Result;
use apiwatch::{init_tracing, Runner, WatchConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Fetches every watched endpoint listed in the job file once and anchors
/// each signed response on the ledger.
struct Args {
    /// Job file of concatenated JSON records
    #[arg(value_name = "JOB_FILE")]
    job_file: PathBuf,

    /// Ledger node JSON-RPC URL
    #[arg(long, env = "APIWATCH_NODE_URL", value_name = "URL")]
    node_url: Option<String>,

    /// Wallet JSON-RPC URL used to compose commits
    #[arg(long, env = "APIWATCH_WALLET_URL", value_name = "URL")]
    wallet_url: Option<String>,

    /// Basic auth user for the node and wallet
    #[arg(long, env = "APIWATCH_RPC_USER")]
    rpc_user: Option<String>,

    /// Basic auth password for the node and wallet
    #[arg(long, env = "APIWATCH_RPC_PASSWORD", hide_env_values = true)]
    rpc_password: Option<String>,

    /// Seconds to wait between commit and reveal
    #[arg(long, env = "APIWATCH_SETTLE_SECS", value_name = "SECS")]
    settle_secs: Option<u64>,

    /// Timeout in seconds for one endpoint fetch
    #[arg(long, env = "APIWATCH_FETCH_TIMEOUT_SECS", value_name = "SECS")]
    fetch_timeout_secs: Option<u64>,

    /// Timeout in seconds for one ledger RPC call
    #[arg(long, env = "APIWATCH_RPC_TIMEOUT_SECS", value_name = "SECS")]
    rpc_timeout_secs: Option<u64>,

    /// Attempts per ledger RPC call before giving up
    #[arg(long, env = "APIWATCH_RPC_MAX_ATTEMPTS")]
    rpc_max_attempts: Option<usize>,

    /// Seconds between metrics log lines
    #[arg(long, env = "APIWATCH_METRICS_INTERVAL_SECS", value_name = "SECS")]
    metrics_interval_secs: Option<u64>,

    /// Maximum number of jobs in flight (unbounded when omitted)
    #[arg(long, env = "APIWATCH_MAX_CONCURRENT_JOBS")]
    max_concurrent_jobs: Option<usize>,
}

impl Args {
    fn watch_config(&self) -> Result<WatchConfig> {
        let mut builder = WatchConfig::builder();
        if let Some(url) = &self.node_url {
            builder = builder.node_url(url);
        }
        if let Some(url) = &self.wallet_url {
            builder = builder.wallet_url(url);
        }
        if let Some(user) = &self.rpc_user {
            builder = builder.rpc_user(user);
        }
        if let Some(password) = &self.rpc_password {
            builder = builder.rpc_password(password);
        }
        if let Some(secs) = self.settle_secs {
            builder = builder.settle_delay(Duration::from_secs(secs));
        }
        if let Some(secs) = self.fetch_timeout_secs {
            builder = builder.fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.rpc_timeout_secs {
            builder = builder.rpc_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.rpc_max_attempts {
            builder = builder.rpc_max_attempts(attempts);
        }
        if let Some(secs) = self.metrics_interval_secs {
            builder = builder.metrics_interval(Duration::from_secs(secs));
        }
        if let Some(jobs) = self.max_concurrent_jobs {
            builder = builder.max_concurrent_jobs(jobs);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = args.watch_config()?;
    let runner = Runner::new(config)?;
    let report = runner.run(&args.job_file).await?;

    if !report.is_clean() {
        tracing::warn!(
            failures = report.failures.len(),
            "run finished with failures; see log for details"
        );
    }
    Ok(())
}
