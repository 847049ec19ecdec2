use crate::job::entry::Entry;
use crate::job::error::{JobError, JobStage};
use crate::rpc::LedgerClient;
use crate::runtime::telemetry::Telemetry;
use anyhow::anyhow;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::yield_now;
use tokio::time::sleep;

/// Drives the two-phase commit/reveal protocol for one entry.
#[derive(Clone)]
pub struct LedgerSubmitter {
    client: Arc<dyn LedgerClient>,
    settle_delay: Duration,
    telemetry: Arc<Telemetry>,
}

impl LedgerSubmitter {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        settle_delay: Duration,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            client,
            settle_delay,
            telemetry,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Commits, waits out the settling delay, then reveals. `on_stage` is told
    /// about each phase before it starts.
    pub async fn submit(
        &self,
        entry: &Entry,
        funding_address: &str,
        mut on_stage: impl FnMut(JobStage),
    ) -> Result<(), JobError> {
        let entry_hash = entry.hash_hex().map_err(JobError::InvalidEntry)?;

        on_stage(JobStage::Committing);
        self.client
            .commit_entry(entry, funding_address)
            .await
            .map_err(JobError::Commit)?;
        self.telemetry.record_commit();
        tracing::debug!(entry_hash = %entry_hash, "entry committed");

        on_stage(JobStage::Waiting);
        self.settle().await;

        on_stage(JobStage::Revealing);
        match self.client.reveal_entry(entry).await {
            Ok(()) => {
                self.telemetry.record_reveal();
                tracing::debug!(entry_hash = %entry_hash, "entry revealed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    entry_hash = %entry_hash,
                    error = %err,
                    "reveal failed; entry remains committed without content"
                );
                Err(JobError::Reveal {
                    entry_hash,
                    source: err,
                })
            }
        }
    }

    async fn settle(&self) {
        if self.settle_delay.is_zero() {
            yield_now().await;
        } else {
            sleep(self.settle_delay).await;
        }
    }
}
