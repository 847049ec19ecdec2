//! Ledger client boundary and its JSON-RPC implementation.
//!
//! Commits go through the wallet, which composes and signs the commit message
//! for the funding address, and are then submitted to the ledger node. Reveals
//! are sent straight to the node as the hex binary encoding of the entry.

use crate::job::entry::{Entry, EntryJson};
use crate::rpc::auth::{build_auth_headers, RpcCredentials};
use crate::rpc::metrics::{RpcMetrics, RpcMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{
    RetryContext, COMMIT_ENTRY_RETRY, COMPOSE_ENTRY_RETRY, REVEAL_ENTRY_RETRY,
};
use crate::runtime::config::WatchConfig;
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use jsonrpsee::core::{
    client::{ClientT, Error as JsonRpcError},
    http_helpers::HttpError,
    params::ObjectParams,
};
use jsonrpsee::http_client::transport::Error as HttpTransportError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{future::Future, sync::Arc};
use tokio::time::{sleep, timeout, Instant};

#[derive(Debug)]
pub enum RpcError {
    Timeout {
        method: &'static str,
    },
    /// The endpoint answered with a JSON-RPC error object. Never retried.
    Rejected {
        method: &'static str,
        code: i32,
        message: String,
    },
    ResponseTooLarge {
        method: &'static str,
    },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::Rejected {
                method,
                code,
                message,
            } => write!(f, "rpc {method} rejected (code={code}): {message}"),
            RpcError::ResponseTooLarge { method } => {
                write!(f, "rpc {method} response exceeded HTTP size limits")
            }
        }
    }
}

impl std::error::Error for RpcError {}

/// Two-phase submission surface of the ledger.
pub trait LedgerClient: Send + Sync {
    /// Registers and pays for `entry` using `funding_address`.
    fn commit_entry<'a>(
        &'a self,
        entry: &'a Entry,
        funding_address: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Publishes the content of a previously committed entry.
    fn reveal_entry<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<()>>;
}

/// Node answer to a commit whose message it has already accepted.
const REPEATED_COMMIT_CODE: i32 = -32011;

#[derive(Debug, Deserialize)]
struct ComposedEntry {
    commit: ComposedCall<CommitParams>,
}

#[derive(Debug, Deserialize)]
struct ComposedCall<P> {
    params: P,
}

#[derive(Debug, Deserialize)]
struct CommitParams {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubmissionAck {
    message: String,
    txid: String,
    entryhash: String,
}

#[derive(Debug, Clone)]
pub struct LedgerRpcClient {
    node_url: Arc<String>,
    wallet_url: Arc<String>,
    node: HttpClient,
    wallet: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<RpcMetrics>,
}

impl LedgerClient for LedgerRpcClient {
    fn commit_entry<'a>(
        &'a self,
        entry: &'a Entry,
        funding_address: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.commit(entry, funding_address))
    }

    fn reveal_entry<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.reveal(entry))
    }
}

impl LedgerRpcClient {
    pub fn new(node_url: impl Into<String>, wallet_url: impl Into<String>) -> Result<Self> {
        Self::with_options(node_url, wallet_url, None, RpcClientOptions::default())
    }

    pub fn with_options(
        node_url: impl Into<String>,
        wallet_url: impl Into<String>,
        credentials: Option<RpcCredentials>,
        options: RpcClientOptions,
    ) -> Result<Self> {
        options.validate()?;

        let node_url = node_url.into();
        let wallet_url = wallet_url.into();
        let node = build_http_client(&node_url, credentials.as_ref(), &options)?;
        let wallet = build_http_client(&wallet_url, credentials.as_ref(), &options)?;

        Ok(Self {
            node_url: Arc::new(node_url),
            wallet_url: Arc::new(wallet_url),
            node,
            wallet,
            options,
            metrics: Arc::new(RpcMetrics::default()),
        })
    }

    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        config.validate()?;
        let options = RpcClientOptions {
            request_timeout: config.rpc_timeout(),
            max_attempts: config.rpc_max_attempts(),
            ..RpcClientOptions::default()
        };
        Self::with_options(
            config.node_url().to_owned(),
            config.wallet_url().to_owned(),
            config.rpc_credentials().cloned(),
            options,
        )
    }

    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    pub fn wallet_url(&self) -> &str {
        &self.wallet_url
    }

    pub fn metrics(&self) -> RpcMetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn commit(&self, entry: &Entry, funding_address: &str) -> Result<()> {
        let entry_hash = entry.hash_hex()?;
        let entry_json = entry.to_json();

        let composed: ComposedEntry = self
            .call_with_retry(
                RetryContext::new(&COMPOSE_ENTRY_RETRY, &entry_hash),
                &self.wallet,
                || compose_params(&entry_json, funding_address),
            )
            .await
            .context("wallet could not compose the entry commit")?;

        let message = composed.commit.params.message;
        let mut attempts = 0usize;
        let outcome: Result<SubmissionAck> = self
            .call_with_retry(
                RetryContext::new(&COMMIT_ENTRY_RETRY, &entry_hash),
                &self.node,
                || {
                    attempts += 1;
                    single_param("message", &message)
                },
            )
            .await;

        // A retry after a lost response can hit the commit the node already took.
        let ack = match outcome {
            Err(err) if attempts > 1 && is_repeated_commit(&err) => {
                tracing::warn!(
                    entry_hash = %entry_hash,
                    attempts,
                    "commit-entry retry reported a repeated commit; treating the earlier attempt as accepted"
                );
                SubmissionAck::default()
            }
            other => other?,
        };

        tracing::debug!(
            entry_hash = %entry_hash,
            txid = %ack.txid,
            response = %ack.message,
            "commit-entry accepted"
        );
        Ok(())
    }

    async fn reveal(&self, entry: &Entry) -> Result<()> {
        let entry_hash = entry.hash_hex()?;
        let encoded = hex::encode(entry.marshal_binary()?);

        let ack: SubmissionAck = self
            .call_with_retry(
                RetryContext::new(&REVEAL_ENTRY_RETRY, &entry_hash),
                &self.node,
                || single_param("entry", &encoded),
            )
            .await?;

        if !ack.entryhash.is_empty() && !ack.entryhash.eq_ignore_ascii_case(&entry_hash) {
            tracing::warn!(
                expected = %entry_hash,
                reported = %ack.entryhash,
                "ledger node reported a different entry hash on reveal"
            );
        }
        tracing::debug!(entry_hash = %entry_hash, response = %ack.message, "reveal-entry accepted");
        Ok(())
    }

    /// Issues one JSON-RPC call, retrying timeouts and transport failures with
    /// exponential backoff. Error objects returned by the endpoint abort at once.
    async fn call_with_retry<R, F>(
        &self,
        context: RetryContext<'_>,
        client: &HttpClient,
        mut params: F,
    ) -> Result<R>
    where
        R: DeserializeOwned,
        F: FnMut() -> Result<ObjectParams>,
    {
        self.retry(context, || {
            let built = params();
            async move { self.request(client, context.method(), built?).await }
        })
        .await
    }

    async fn retry<T, F, Fut>(&self, context: RetryContext<'_>, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            let err = match operation().await {
                Ok(value) => {
                    self.metrics.record_success(start.elapsed());
                    return Ok(value);
                }
                Err(err) => err,
            };

            let elapsed = start.elapsed();
            let timed_out = match err.downcast_ref::<RpcError>() {
                Some(RpcError::Rejected { .. }) => {
                    self.metrics.record_failure(elapsed);
                    context.log_rejected(attempt, &err);
                    return Err(err);
                }
                Some(RpcError::ResponseTooLarge { .. }) => {
                    self.metrics.record_failure(elapsed);
                    context.log_exhausted(attempt, &err);
                    return Err(err);
                }
                Some(RpcError::Timeout { .. }) => {
                    self.metrics.record_timeout(elapsed);
                    true
                }
                None => {
                    self.metrics.record_failure(elapsed);
                    false
                }
            };

            if attempt >= self.options.max_attempts {
                context.log_exhausted(attempt, &err);
                return Err(err);
            }

            let backoff = self.options.backoff_delay(attempt);
            context.log_retry(attempt, backoff, &err, timed_out);
            self.metrics.record_retry();
            sleep(backoff).await;
        }
    }

    async fn request<R: DeserializeOwned>(
        &self,
        client: &HttpClient,
        method: &'static str,
        params: ObjectParams,
    ) -> Result<R> {
        timeout(
            self.options.request_timeout,
            client.request::<R, _>(method, params),
        )
        .await
        .map_err(|_| RpcError::Timeout { method })?
        .map_err(|err| map_rpc_error(method, err))
    }
}

fn build_http_client(
    url: &str,
    credentials: Option<&RpcCredentials>,
    options: &RpcClientOptions,
) -> Result<HttpClient> {
    let headers = build_auth_headers(credentials)?;
    let max_body_size = options.max_body_bytes.min(u32::MAX as usize) as u32;

    HttpClientBuilder::default()
        .set_headers(headers)
        .request_timeout(options.request_timeout)
        .max_concurrent_requests(options.max_concurrent_requests)
        .max_request_size(max_body_size)
        .max_response_size(max_body_size)
        .build(url)
        .map_err(|err| anyhow!("failed to build RPC client for {url}: {err}"))
}

fn compose_params(entry: &EntryJson, funding_address: &str) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    params
        .insert("entry", entry)
        .context("failed to serialize compose-entry entry")?;
    params
        .insert("ecpub", funding_address)
        .context("failed to serialize compose-entry address")?;
    Ok(params)
}

fn single_param(name: &str, value: &str) -> Result<ObjectParams> {
    let mut params = ObjectParams::new();
    params
        .insert(name, value)
        .with_context(|| format!("failed to serialize {name} param"))?;
    Ok(params)
}

fn map_rpc_error(method: &'static str, err: JsonRpcError) -> anyhow::Error {
    if response_too_large(&err) {
        return RpcError::ResponseTooLarge { method }.into();
    }
    match err {
        JsonRpcError::Call(object) => RpcError::Rejected {
            method,
            code: object.code(),
            message: match object.data() {
                Some(data) => format!("{} ({})", object.message(), data.get()),
                None => object.message().to_owned(),
            },
        }
        .into(),
        JsonRpcError::RequestTimeout => RpcError::Timeout { method }.into(),
        other => anyhow!("rpc {method} call failed: {other}"),
    }
}

fn response_too_large(err: &JsonRpcError) -> bool {
    match err {
        JsonRpcError::Transport(inner) => {
            if let Some(transport_err) = inner.downcast_ref::<HttpTransportError>() {
                match transport_err {
                    HttpTransportError::Http(http_err) => matches!(http_err, HttpError::TooLarge),
                    HttpTransportError::RequestTooLarge => true,
                    _ => false,
                }
            } else {
                false
            }
        }
        _ => false,
    }
}

fn is_repeated_commit(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RpcError>(),
        Some(RpcError::Rejected {
            code: REPEATED_COMMIT_CODE,
            ..
        })
    )
}
