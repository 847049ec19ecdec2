use crate::dispatch::{failure_channel, Failure, JobDispatcher, JobSource};
use crate::job::{EndpointFetcher, HttpFetcher, JobContext, LedgerSubmitter};
use crate::rpc::{LedgerClient, LedgerRpcClient};
use crate::runtime::config::WatchConfig;
use crate::runtime::telemetry::{spawn_metrics_reporter, Telemetry};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Outcome of one run once every launched job has finished.
#[derive(Debug, Default)]
pub struct RunReport {
    pub launched: usize,
    pub succeeded: usize,
    pub failures: Vec<Failure>,
}

impl RunReport {
    /// True when every job succeeded and the job source was read to the end.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn job_failures(&self) -> impl Iterator<Item = &Failure> {
        self.failures.iter().filter(|failure| !failure.is_source())
    }
}

/// Wires the job source, dispatcher, error collector, and metrics reporter
/// together for a single pass over a job file.
pub struct Runner {
    config: WatchConfig,
    fetcher: Arc<dyn EndpointFetcher>,
    ledger: Arc<dyn LedgerClient>,
    telemetry: Arc<Telemetry>,
}

impl Runner {
    /// Builds the HTTP fetcher and ledger RPC client described by `config`.
    pub fn new(config: WatchConfig) -> Result<Self> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.fetch_timeout())
            .context("failed to build endpoint HTTP client")?;
        let ledger =
            LedgerRpcClient::from_config(&config).context("failed to build ledger RPC client")?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(fetcher),
            Arc::new(ledger),
        ))
    }

    /// Uses caller-supplied collaborators in place of the network-backed ones.
    pub fn with_collaborators(
        config: WatchConfig,
        fetcher: Arc<dyn EndpointFetcher>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        Self {
            config,
            fetcher,
            ledger,
            telemetry: Arc::new(Telemetry::default()),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Runs every job listed in the file at `path`. Only an unreadable job
    /// file is an error; job and record failures are returned in the report.
    pub async fn run(&self, path: impl AsRef<Path>) -> Result<RunReport> {
        let path = path.as_ref();
        let source = JobSource::open(path).await?;
        tracing::info!(path = %path.display(), "job source opened");
        self.run_source(source).await
    }

    pub async fn run_source<R>(&self, source: JobSource<R>) -> Result<RunReport>
    where
        R: Read + Send + 'static,
    {
        let (failures_tx, collector) = failure_channel();

        let shutdown = CancellationToken::new();
        let reporter = spawn_metrics_reporter(
            self.telemetry.clone(),
            shutdown.clone(),
            self.config.metrics_interval(),
        );

        let context = JobContext {
            fetcher: self.fetcher.clone(),
            submitter: LedgerSubmitter::new(
                self.ledger.clone(),
                self.config.settle_delay(),
                self.telemetry.clone(),
            ),
        };
        let dispatcher = JobDispatcher::new(context, self.telemetry.clone())
            .with_max_concurrent_jobs(self.config.max_concurrent_jobs());
        let dispatch = tokio::spawn(dispatcher.dispatch(source, failures_tx));

        // Completes once the dispatcher and every job task dropped their senders.
        let failures = collector.drain().await;
        let summary = dispatch.await.context("job dispatcher task failed");

        shutdown.cancel();
        if let Err(err) = reporter.await {
            tracing::warn!(error = %err, "metrics reporter task did not shut down cleanly");
        }
        let summary = summary?;

        let report = RunReport {
            launched: summary.launched,
            succeeded: summary.succeeded,
            failures,
        };

        let snapshot = self.telemetry.snapshot();
        tracing::info!(
            launched = report.launched,
            succeeded = report.succeeded,
            failed = report.failures.len(),
            committed = snapshot.entries_committed,
            revealed = snapshot.entries_revealed,
            source_failed = summary.source_failed,
            "run complete"
        );

        Ok(report)
    }
}
