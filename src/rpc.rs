//! Ledger JSON-RPC plumbing: authentication, client options, metrics, and the
//! retry policy shared by the compose, commit, and reveal calls.

pub mod auth;
pub mod client;
pub mod metrics;
pub mod options;
pub(crate) mod retry;

pub use auth::RpcCredentials;
pub use client::{LedgerClient, LedgerRpcClient, RpcError};
pub use metrics::RpcMetricsSnapshot;
pub use options::RpcClientOptions;
