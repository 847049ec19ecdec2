//! Shared retry context, logging helpers, and canned message templates used by
//! the ledger client to keep instrumentation consistent across operations.

use anyhow::Error;
use std::time::Duration;

macro_rules! log_with_retry_ctx {
    ($level:ident, $ctx:expr, $($rest:tt)*) => {{
        tracing::$level!(
            method = $ctx.messages.method,
            entry_hash = $ctx.entry_hash,
            $($rest)*
        );
    }};
}

/// Logging labels for one ledger RPC operation.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) method: &'static str,
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) rejected: &'static str,
}

/// Context passed into the client's retry loop so callers can attach the
/// entry being submitted and reuse consistent log messaging.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    entry_hash: &'a str,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(messages: &'a RetryMessages, entry_hash: &'a str) -> Self {
        Self {
            entry_hash,
            messages,
        }
    }

    pub(crate) fn method(&self) -> &'static str {
        self.messages.method
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error, timeout: bool) {
        let backoff_ms = backoff.as_millis().min(u128::from(u64::MAX)) as u64;
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            backoff_ms,
            timeout,
            error = %err,
            "{}",
            self.messages.retry
        );
    }

    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(error, self, attempt, error = %err, "{}", self.messages.exhausted);
    }

    pub(crate) fn log_rejected(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(warn, self, attempt, error = %err, "{}", self.messages.rejected);
    }
}

pub(crate) const COMPOSE_ENTRY_RETRY: RetryMessages = RetryMessages {
    method: "compose-entry",
    retry: "wallet compose-entry failed; retrying",
    exhausted: "wallet compose-entry exhausted retries",
    rejected: "wallet rejected compose-entry",
};

pub(crate) const COMMIT_ENTRY_RETRY: RetryMessages = RetryMessages {
    method: "commit-entry",
    retry: "commit-entry failed; retrying",
    exhausted: "commit-entry exhausted retries",
    rejected: "ledger node rejected commit-entry",
};

pub(crate) const REVEAL_ENTRY_RETRY: RetryMessages = RetryMessages {
    method: "reveal-entry",
    retry: "reveal-entry failed; retrying",
    exhausted: "reveal-entry exhausted retries",
    rejected: "ledger node rejected reveal-entry",
};
