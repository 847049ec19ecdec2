use crate::job::descriptor::JobDescriptor;
use crate::job::entry::Entry;
use crate::job::error::{FetchError, JobError, JobStage};
use crate::job::fetch::{CapturedResponse, EndpointFetcher};
use crate::job::record::build_record;
use crate::job::signer::SecretKey;
use crate::job::submit::LedgerSubmitter;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Collaborators shared by every job of a run.
#[derive(Clone)]
pub struct JobContext {
    pub fetcher: Arc<dyn EndpointFetcher>,
    pub submitter: LedgerSubmitter,
}

/// Summary of a job that reached `Done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub api_method: String,
    pub chain_id: String,
    pub entry_hash: String,
    pub captured_at: i64,
}

/// One watch-and-anchor task.
pub struct Job {
    descriptor: JobDescriptor,
    stage: JobStage,
}

impl Job {
    pub fn new(descriptor: JobDescriptor) -> Self {
        Self {
            descriptor,
            stage: JobStage::Created,
        }
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Runs the job to a terminal stage. Consumes the job so its descriptor is
    /// dropped once the outcome is known.
    #[tracing::instrument(
        name = "job",
        skip_all,
        fields(api_method = %self.descriptor.api_method(), chain_id = %self.descriptor.chain_id())
    )]
    pub async fn run(mut self, context: &JobContext) -> Result<JobReport, JobError> {
        match self.execute(context).await {
            Ok(report) => {
                self.transition(JobStage::Done);
                Ok(report)
            }
            Err(err) => {
                tracing::debug!(failed_stage = %err.stage(), error = %err, "job failed");
                self.transition(JobStage::Failed);
                Err(err)
            }
        }
    }

    async fn execute(&mut self, context: &JobContext) -> Result<JobReport, JobError> {
        let Self { descriptor, stage } = self;

        advance(stage, JobStage::Fetching);
        let response = context
            .fetcher
            .fetch(descriptor.api_method())
            .await
            .map_err(FetchError::Transport)?;
        let captured_at = unix_now();

        let entry = prepare_entry(descriptor, &response, captured_at, |next| {
            advance(stage, next)
        })?;
        let entry_hash = entry.hash_hex().map_err(JobError::InvalidEntry)?;

        context
            .submitter
            .submit(&entry, descriptor.funding_address(), |next| {
                advance(stage, next)
            })
            .await?;

        Ok(JobReport {
            api_method: descriptor.api_method().to_owned(),
            chain_id: entry.chain_id().to_owned(),
            entry_hash,
            captured_at,
        })
    }

    fn transition(&mut self, next: JobStage) {
        advance(&mut self.stage, next);
    }
}

fn advance(stage: &mut JobStage, next: JobStage) {
    tracing::trace!(from = %stage, to = %next, "job stage transition");
    *stage = next;
}

/// Turns a captured response into a signed entry: status check, record
/// serialization, then a signature over the serialized record stored as the
/// first external id. Pure apart from `on_stage` notifications.
pub fn prepare_entry(
    descriptor: &JobDescriptor,
    response: &CapturedResponse,
    captured_at: i64,
    mut on_stage: impl FnMut(JobStage),
) -> Result<Entry, JobError> {
    if !response.is_success() {
        return Err(FetchError::Status {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        }
        .into());
    }

    on_stage(JobStage::Building);
    let content = build_record(descriptor.api_method(), &response.body, captured_at)
        .map_err(JobError::InvalidEntry)?;
    let mut entry =
        Entry::new(descriptor.chain_id(), content).map_err(JobError::InvalidEntry)?;

    on_stage(JobStage::Signing);
    let key = SecretKey::from_hex(descriptor.secret_key())?;
    let signature = key.sign(entry.content());
    entry.push_ext_id(signature.to_vec());

    Ok(entry)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
