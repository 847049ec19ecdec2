use anyhow::Error as AnyError;
use std::fmt;

/// Execution stages of a single watch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Created,
    Fetching,
    Building,
    Signing,
    Committing,
    Waiting,
    Revealing,
    Done,
    Failed,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStage::Done | JobStage::Failed)
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStage::Created => "created",
            JobStage::Fetching => "fetching",
            JobStage::Building => "building",
            JobStage::Signing => "signing",
            JobStage::Committing => "committing",
            JobStage::Waiting => "waiting",
            JobStage::Revealing => "revealing",
            JobStage::Done => "done",
            JobStage::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Failure to obtain a usable response from a watched endpoint.
#[derive(Debug)]
pub enum FetchError {
    /// The endpoint answered with something other than 200. Displays as the body.
    Status { status: u16, body: String },
    Transport(AnyError),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Status { body, .. } => f.write_str(body),
            FetchError::Transport(err) => write!(f, "{err:#}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Status { .. } => None,
            FetchError::Transport(err) => Some(err.as_ref()),
        }
    }
}

/// Signing key material that cannot be used.
#[derive(Debug)]
pub enum KeyError {
    InvalidHex(hex::FromHexError),
    InvalidLength { expected: usize, actual: usize },
    Mismatched(ed25519_dalek::SignatureError),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::InvalidHex(err) => write!(f, "secret key is not valid hex: {err}"),
            KeyError::InvalidLength { expected, actual } => {
                write!(f, "secret key must be {expected} bytes, got {actual}")
            }
            KeyError::Mismatched(_) => {
                write!(f, "secret key public half does not match its seed")
            }
        }
    }
}

impl std::error::Error for KeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KeyError::InvalidHex(err) => Some(err),
            KeyError::InvalidLength { .. } => None,
            KeyError::Mismatched(err) => Some(err),
        }
    }
}

/// Error that terminates a single job. Never escapes the job boundary except
/// through the failure channel.
#[derive(Debug)]
pub enum JobError {
    Fetch(FetchError),
    InvalidEntry(AnyError),
    Key(KeyError),
    Commit(AnyError),
    /// Commit succeeded but reveal did not; the entry is paid for and unpublished.
    Reveal { entry_hash: String, source: AnyError },
    Panicked(String),
}

impl JobError {
    /// Stage in which the job failed.
    pub fn stage(&self) -> JobStage {
        match self {
            JobError::Fetch(_) => JobStage::Fetching,
            JobError::InvalidEntry(_) => JobStage::Building,
            JobError::Key(_) => JobStage::Signing,
            JobError::Commit(_) => JobStage::Committing,
            JobError::Reveal { .. } => JobStage::Revealing,
            JobError::Panicked(_) => JobStage::Failed,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Fetch(err) => write!(f, "{err}"),
            JobError::InvalidEntry(err) => write!(f, "invalid entry: {err}"),
            JobError::Key(err) => write!(f, "{err}"),
            JobError::Commit(err) => write!(f, "commit failed: {err:#}"),
            JobError::Reveal { entry_hash, source } => write!(
                f,
                "reveal failed after commit (entry {entry_hash} left committed): {source:#}"
            ),
            JobError::Panicked(message) => write!(f, "job panicked: {message}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Fetch(err) => Some(err),
            JobError::InvalidEntry(err) | JobError::Commit(err) => Some(err.as_ref()),
            JobError::Key(err) => Some(err),
            JobError::Reveal { source, .. } => Some(source.as_ref()),
            JobError::Panicked(_) => None,
        }
    }
}

impl From<FetchError> for JobError {
    fn from(err: FetchError) -> Self {
        JobError::Fetch(err)
    }
}

impl From<KeyError> for JobError {
    fn from(err: KeyError) -> Self {
        JobError::Key(err)
    }
}
