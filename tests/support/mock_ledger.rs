use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{body, Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use sha2::{Digest, Sha256, Sha512};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A `compose-entry` request as received by the wallet side.
#[derive(Debug, Clone)]
pub struct ComposeCall {
    pub chain_id: String,
    pub ext_ids: Vec<String>,
    pub content: String,
    pub funding_address: String,
}

#[derive(Default)]
struct LedgerLog {
    composed: Vec<ComposeCall>,
    commits: Vec<String>,
    reveals: Vec<String>,
    authorization: Option<String>,
}

/// Shared state behind the mock node/wallet. Both roles answer on one URL.
#[derive(Clone, Default)]
pub struct MockLedger {
    log: Arc<Mutex<LedgerLog>>,
    reject_commits: Arc<AtomicBool>,
    reject_reveals: Arc<AtomicBool>,
    unavailable_requests: Arc<AtomicUsize>,
    commit_stall_ms: Arc<AtomicU64>,
    requests: Arc<AtomicUsize>,
}

impl MockLedger {
    /// Answers `commit-entry` with a JSON-RPC error object.
    pub fn reject_commits(&self) {
        self.reject_commits.store(true, Ordering::SeqCst);
    }

    /// Answers `reveal-entry` with a JSON-RPC error object.
    pub fn reject_reveals(&self) {
        self.reject_reveals.store(true, Ordering::SeqCst);
    }

    /// Answers the next `count` HTTP requests with 503.
    pub fn fail_next_requests(&self, count: usize) {
        self.unavailable_requests.store(count, Ordering::SeqCst);
    }

    /// Records the next `commit-entry` but holds its response back for
    /// `delay`, so the caller sees a timeout for a commit the node accepted.
    pub fn stall_next_commit(&self, delay: Duration) {
        self.commit_stall_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn composed(&self) -> Vec<ComposeCall> {
        self.log.lock().expect("mock ledger poisoned").composed.clone()
    }

    pub fn commits(&self) -> Vec<String> {
        self.log.lock().expect("mock ledger poisoned").commits.clone()
    }

    pub fn reveals(&self) -> Vec<String> {
        self.log.lock().expect("mock ledger poisoned").reveals.clone()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.log
            .lock()
            .expect("mock ledger poisoned")
            .authorization
            .clone()
    }

    fn take_unavailable(&self) -> bool {
        self.unavailable_requests
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

/// Message the wallet hands back for a composed commit.
pub fn commit_message_for(chain_id: &str, funding_address: &str) -> String {
    hex::encode(format!("{funding_address}:{chain_id}"))
}

pub struct MockLedgerServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockLedgerServer {
    pub async fn start(ledger: MockLedger) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock ledger listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock ledger address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock ledger listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock ledger listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let ledger = ledger.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| serve_request(ledger.clone(), req)))
            }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock ledger server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock ledger stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{addr}/v2"),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(ledger: MockLedger, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    ledger.requests.fetch_add(1, Ordering::SeqCst);

    if ledger.take_unavailable() {
        let mut response = Response::new(Body::from("service unavailable"));
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        return Ok(response);
    }

    if req.method() != Method::POST {
        let mut response = Response::new(Body::from("Unsupported method"));
        *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
        return Ok(response);
    }

    if let Some(value) = req.headers().get(hyper::header::AUTHORIZATION) {
        let value = value.to_str().unwrap_or_default().to_owned();
        ledger.log.lock().expect("mock ledger poisoned").authorization = Some(value);
    }

    let bytes = match body::to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("failed to read body: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let payload: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(err) => {
            let mut response = Response::new(Body::from(format!("invalid JSON payload: {err}")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    let stall = match payload.get("method").and_then(Value::as_str) {
        Some("commit-entry") => ledger.commit_stall_ms.swap(0, Ordering::SeqCst),
        _ => 0,
    };
    let response_value = handle_call(&ledger, payload);
    if stall > 0 {
        tokio::time::sleep(Duration::from_millis(stall)).await;
    }
    let mut response = Response::new(Body::from(response_value.to_string()));
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

fn handle_call(ledger: &MockLedger, call: Value) -> Value {
    let id = call.get("id").cloned().unwrap_or(Value::Null);
    let method = call
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let params = call.get("params").cloned().unwrap_or(Value::Null);
    let text = |key: &str| {
        params
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };

    match method.as_str() {
        "compose-entry" => {
            let entry = params.get("entry").cloned().unwrap_or(Value::Null);
            let field = |key: &str| {
                entry
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned()
            };
            let call = ComposeCall {
                chain_id: field("chainid"),
                ext_ids: entry
                    .get("extids")
                    .and_then(Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_owned)
                            .collect()
                    })
                    .unwrap_or_default(),
                content: field("content"),
                funding_address: text("ecpub"),
            };
            let message = commit_message_for(&call.chain_id, &call.funding_address);
            ledger
                .log
                .lock()
                .expect("mock ledger poisoned")
                .composed
                .push(call);

            success(
                id,
                json!({
                    "commit": {
                        "jsonrpc": "2.0",
                        "id": 0,
                        "method": "commit-entry",
                        "params": { "message": message },
                    },
                    "reveal": {
                        "jsonrpc": "2.0",
                        "id": 0,
                        "method": "reveal-entry",
                        "params": { "entry": "" },
                    },
                }),
            )
        }
        "commit-entry" => {
            if ledger.reject_commits.load(Ordering::SeqCst) {
                return error(id, -32011, "Repeated Commit");
            }
            let message = text("message");
            let mut log = ledger.log.lock().expect("mock ledger poisoned");
            if log.commits.contains(&message) {
                return error(id, -32011, "Repeated Commit");
            }
            log.commits.push(message);
            drop(log);
            success(
                id,
                json!({
                    "message": "Entry Commit Success",
                    "txid": "00".repeat(32),
                }),
            )
        }
        "reveal-entry" => {
            if ledger.reject_reveals.load(Ordering::SeqCst) {
                return error(id, -32603, "Entry reveal rejected");
            }
            let entry = text("entry");
            let entry_hash = hex::decode(&entry)
                .map(|data| entry_hash_hex(&data))
                .unwrap_or_default();
            ledger
                .log
                .lock()
                .expect("mock ledger poisoned")
                .reveals
                .push(entry);
            success(
                id,
                json!({
                    "message": "Entry Reveal Success",
                    "entryhash": entry_hash,
                }),
            )
        }
        _ => error(id, -32601, format!("unknown method {method}")),
    }
}

fn entry_hash_hex(data: &[u8]) -> String {
    let mut outer = Sha256::new();
    outer.update(Sha512::digest(data));
    outer.update(data);
    hex::encode(outer.finalize())
}

fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id,
    })
}

fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": {
            "code": code,
            "message": message.into(),
        },
        "id": id,
    })
}
