//! Single watch-and-anchor job split across focused submodules:
//! - `descriptor`: the configured task as read from the job file
//! - `fetch`: watched endpoint boundary and the reqwest-backed fetcher
//! - `record`: canonical payload serialization
//! - `signer`: Ed25519 signing of payloads
//! - `entry`: ledger entry model, binary encoding and hash
//! - `submit`: commit, settle, reveal
//! - `process`: the per-job state machine

pub mod descriptor;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod process;
pub mod record;
pub mod signer;
pub mod submit;

pub use descriptor::JobDescriptor;
pub use entry::Entry;
pub use error::{FetchError, JobError, JobStage, KeyError};
pub use fetch::{CapturedResponse, EndpointFetcher, HttpFetcher};
pub use process::{prepare_entry, Job, JobContext, JobReport};
pub use record::{build_record, RecordPayload};
pub use signer::{sign, SecretKey};
pub use submit::LedgerSubmitter;
