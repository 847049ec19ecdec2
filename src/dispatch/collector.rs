//! Many-producer, single-consumer aggregation of run failures.
//!
//! Every job task holds a [`FailureSender`] clone. The channel closes once the
//! dispatcher and all of its jobs have dropped theirs, which is what lets
//! [`ErrorCollector::drain`] return.

use crate::dispatch::source::SourceError;
use crate::job::error::JobError;
use std::fmt;
use tokio::sync::mpsc;

/// A failure observed during a run.
#[derive(Debug)]
pub enum Failure {
    Source(SourceError),
    Job { api_method: String, error: JobError },
}

impl Failure {
    pub fn job(api_method: impl Into<String>, error: JobError) -> Self {
        Failure::Job {
            api_method: api_method.into(),
            error,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Failure::Source(_))
    }

    pub fn job_error(&self) -> Option<&JobError> {
        match self {
            Failure::Job { error, .. } => Some(error),
            Failure::Source(_) => None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Source(err) => write!(f, "{err}"),
            Failure::Job { api_method, error } => {
                write!(f, "{api_method} [{}]: {error}", error.stage())
            }
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Failure::Source(err) => Some(err),
            Failure::Job { error, .. } => Some(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FailureSender {
    tx: mpsc::UnboundedSender<Failure>,
}

impl FailureSender {
    /// Never blocks. A report made after the collector is gone is only logged.
    pub fn report(&self, failure: Failure) {
        if let Err(mpsc::error::SendError(failure)) = self.tx.send(failure) {
            tracing::error!(failure = %failure, "failure reported after collector closed");
        }
    }
}

#[derive(Debug)]
pub struct ErrorCollector {
    rx: mpsc::UnboundedReceiver<Failure>,
}

pub fn failure_channel() -> (FailureSender, ErrorCollector) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FailureSender { tx }, ErrorCollector { rx })
}

impl ErrorCollector {
    /// Logs and returns every failure, resolving once all senders are dropped
    /// and the buffer is empty.
    pub async fn drain(mut self) -> Vec<Failure> {
        let mut failures = Vec::new();
        while let Some(failure) = self.rx.recv().await {
            match &failure {
                Failure::Source(err) => {
                    tracing::error!(record = err.record(), error = %err, "job source failure");
                }
                Failure::Job { api_method, error } => {
                    tracing::error!(
                        api_method = %api_method,
                        stage = %error.stage(),
                        error = %error,
                        "job failed"
                    );
                }
            }
            failures.push(failure);
        }
        failures
    }
}
