//! Fan-out of job descriptors into concurrent jobs and aggregation of their
//! failures.

pub mod collector;
pub mod dispatcher;
pub mod source;

pub use collector::{failure_channel, ErrorCollector, Failure, FailureSender};
pub use dispatcher::{DispatchSummary, JobDispatcher};
pub use source::{JobSource, SourceError};
