use std::sync::Mutex;

use anyhow::{bail, Result};
use apiwatch::{Entry, LedgerClient};
use futures::future::BoxFuture;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerCall {
    Commit,
    Reveal,
}

/// One ledger call as observed in-process.
#[derive(Debug, Clone)]
pub struct LedgerEvent {
    pub call: LedgerCall,
    pub at: Instant,
    pub chain_id: String,
    pub entry_hash: String,
    pub ext_ids: Vec<Vec<u8>>,
    pub content: Vec<u8>,
    pub funding_address: Option<String>,
}

/// In-memory ledger that records every call and can be told to reject
/// commits or reveals for a given chain.
#[derive(Default)]
pub struct RecordingLedger {
    events: Mutex<Vec<LedgerEvent>>,
    reject_commit_chains: Mutex<Vec<String>>,
    reject_reveal_chains: Mutex<Vec<String>>,
}

impl RecordingLedger {
    pub fn reject_commits_for(&self, chain_id: &str) {
        self.reject_commit_chains
            .lock()
            .expect("recording ledger poisoned")
            .push(chain_id.to_owned());
    }

    pub fn reject_reveals_for(&self, chain_id: &str) {
        self.reject_reveal_chains
            .lock()
            .expect("recording ledger poisoned")
            .push(chain_id.to_owned());
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().expect("recording ledger poisoned").clone()
    }

    pub fn calls(&self, call: LedgerCall) -> Vec<LedgerEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.call == call)
            .collect()
    }

    fn record(
        &self,
        call: LedgerCall,
        entry: &Entry,
        funding_address: Option<&str>,
    ) -> Result<()> {
        let rejected = match call {
            LedgerCall::Commit => &self.reject_commit_chains,
            LedgerCall::Reveal => &self.reject_reveal_chains,
        };
        if rejected
            .lock()
            .expect("recording ledger poisoned")
            .iter()
            .any(|chain| chain == entry.chain_id())
        {
            bail!("ledger refused {call:?} for chain {}", entry.chain_id());
        }

        let event = LedgerEvent {
            call,
            at: Instant::now(),
            chain_id: entry.chain_id().to_owned(),
            entry_hash: entry.hash_hex()?,
            ext_ids: entry.ext_ids().to_vec(),
            content: entry.content().to_vec(),
            funding_address: funding_address.map(str::to_owned),
        };
        self.events
            .lock()
            .expect("recording ledger poisoned")
            .push(event);
        Ok(())
    }
}

impl LedgerClient for RecordingLedger {
    fn commit_entry<'a>(
        &'a self,
        entry: &'a Entry,
        funding_address: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.record(LedgerCall::Commit, entry, Some(funding_address)) })
    }

    fn reveal_entry<'a>(&'a self, entry: &'a Entry) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.record(LedgerCall::Reveal, entry, None) })
    }
}
