pub mod dispatch;
pub mod job;
pub mod rpc;
pub mod runtime;

pub use dispatch::{
    failure_channel, DispatchSummary, ErrorCollector, Failure, FailureSender, JobDispatcher,
    JobSource, SourceError,
};
pub use job::{
    build_record, prepare_entry, sign, CapturedResponse, EndpointFetcher, Entry, FetchError,
    HttpFetcher, Job, JobContext, JobDescriptor, JobError, JobReport, JobStage, KeyError,
    LedgerSubmitter, RecordPayload, SecretKey,
};
pub use rpc::{
    LedgerClient, LedgerRpcClient, RpcClientOptions, RpcCredentials, RpcError, RpcMetricsSnapshot,
};
pub use runtime::config::{WatchConfig, WatchConfigBuilder, WatchConfigParams};
pub use runtime::runner::{RunReport, Runner};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
