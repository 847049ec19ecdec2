use std::time::Duration;

use crate::support::{
    helpers::{
        chain_id, init_tracing, job_record, secret_key_hex, test_config, write_job_file,
        FUNDING_ADDRESS,
    },
    mock_endpoint::{EndpointRoutes, MockEndpoint},
    mock_ledger::{commit_message_for, MockLedger, MockLedgerServer},
};
use anyhow::Result;
use apiwatch::{
    Entry, LedgerClient, LedgerRpcClient, RpcClientOptions, RpcCredentials, RpcError, Runner,
};

fn sample_entry() -> Result<Entry> {
    let mut entry = Entry::new(chain_id(0x5a), br#"{"k":"v"}"#.to_vec())?;
    entry.push_ext_id(vec![0xee; 64]);
    Ok(entry)
}

fn fast_options() -> RpcClientOptions {
    RpcClientOptions {
        request_timeout: Duration::from_secs(2),
        max_attempts: 3,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        ..RpcClientOptions::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_anchors_responses_through_json_rpc() -> Result<()> {
    init_tracing();
    let endpoint =
        MockEndpoint::start(EndpointRoutes::default().route("/quote", 200, r#"{"q":1}"#)).await?;
    let ledger = MockLedger::default();
    let server = MockLedgerServer::start(ledger.clone()).await?;

    let url = endpoint.url("/quote");
    let file = write_job_file(&[job_record(&url, &chain_id(0x42), &secret_key_hex(3))])?;

    let runner = Runner::new(test_config(server.url(), Duration::ZERO)?)?;
    let report = runner.run(file.path()).await?;

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.succeeded, 1);

    let composed = ledger.composed();
    assert_eq!(composed.len(), 1);
    assert_eq!(composed[0].chain_id, chain_id(0x42));
    assert_eq!(composed[0].funding_address, FUNDING_ADDRESS);
    assert_eq!(composed[0].ext_ids.len(), 1);
    assert_eq!(composed[0].ext_ids[0].len(), 128);

    assert_eq!(
        ledger.commits(),
        vec![commit_message_for(&chain_id(0x42), FUNDING_ADDRESS)]
    );

    let reveals = ledger.reveals();
    assert_eq!(reveals.len(), 1);
    let encoded = hex::decode(&reveals[0])?;
    assert_eq!(encoded[0], 0, "entry version byte");
    assert_eq!(&encoded[1..33], &[0x42; 32][..]);
    assert!(reveals[0].ends_with(&composed[0].content));

    server.shutdown().await;
    endpoint.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_commit_is_not_retried() -> Result<()> {
    init_tracing();
    let ledger = MockLedger::default();
    ledger.reject_commits();
    let server = MockLedgerServer::start(ledger.clone()).await?;
    let client =
        LedgerRpcClient::with_options(server.url(), server.url(), None, fast_options())?;

    let entry = sample_entry()?;
    let err = client
        .commit_entry(&entry, FUNDING_ADDRESS)
        .await
        .expect_err("node rejects the commit");

    assert!(matches!(
        err.downcast_ref::<RpcError>(),
        Some(RpcError::Rejected { code: -32011, .. })
    ));
    // compose-entry plus a single commit-entry.
    assert_eq!(ledger.requests(), 2);
    assert_eq!(ledger.composed().len(), 1);
    assert!(ledger.commits().is_empty());
    assert_eq!(client.metrics().total_retries, 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn commit_accepted_before_a_timeout_is_not_reported_as_failed() -> Result<()> {
    init_tracing();
    let ledger = MockLedger::default();
    let server = MockLedgerServer::start(ledger.clone()).await?;
    let options = RpcClientOptions {
        request_timeout: Duration::from_millis(200),
        ..fast_options()
    };
    let client = LedgerRpcClient::with_options(server.url(), server.url(), None, options)?;

    ledger.stall_next_commit(Duration::from_secs(1));
    let entry = sample_entry()?;
    client.commit_entry(&entry, FUNDING_ADDRESS).await?;

    assert_eq!(
        ledger.commits(),
        vec![commit_message_for(&chain_id(0x5a), FUNDING_ADDRESS)]
    );
    // compose-entry, the stalled commit-entry and its retry.
    assert_eq!(ledger.requests(), 3);
    let metrics = client.metrics();
    assert_eq!(metrics.total_timeouts, 1);
    assert_eq!(metrics.total_retries, 1);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unavailable_node_is_retried_with_backoff() -> Result<()> {
    init_tracing();
    let ledger = MockLedger::default();
    let server = MockLedgerServer::start(ledger.clone()).await?;
    let client =
        LedgerRpcClient::with_options(server.url(), server.url(), None, fast_options())?;

    ledger.fail_next_requests(2);
    let entry = sample_entry()?;
    client.reveal_entry(&entry).await?;

    assert_eq!(ledger.requests(), 3);
    assert_eq!(ledger.reveals(), vec![hex::encode(entry.marshal_binary()?)]);
    let metrics = client.metrics();
    assert_eq!(metrics.total_retries, 2);
    assert_eq!(metrics.total_errors, 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn retries_stop_after_max_attempts() -> Result<()> {
    init_tracing();
    let ledger = MockLedger::default();
    let server = MockLedgerServer::start(ledger.clone()).await?;
    let client =
        LedgerRpcClient::with_options(server.url(), server.url(), None, fast_options())?;

    ledger.fail_next_requests(10);
    let entry = sample_entry()?;
    client
        .reveal_entry(&entry)
        .await
        .expect_err("node never becomes available");

    assert_eq!(ledger.requests(), 3);
    assert!(ledger.reveals().is_empty());

    server.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn basic_auth_header_is_sent() -> Result<()> {
    init_tracing();
    let ledger = MockLedger::default();
    let server = MockLedgerServer::start(ledger.clone()).await?;
    let credentials = RpcCredentials {
        user: "user".into(),
        password: "pass".into(),
    };
    let client = LedgerRpcClient::with_options(
        server.url(),
        server.url(),
        Some(credentials),
        fast_options(),
    )?;

    client.reveal_entry(&sample_entry()?).await?;

    assert_eq!(
        ledger.last_authorization().as_deref(),
        Some("Basic dXNlcjpwYXNz")
    );

    server.shutdown().await;
    Ok(())
}
