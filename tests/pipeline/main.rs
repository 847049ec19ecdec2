#[path = "../support/mod.rs"]
mod support;

mod ledger_rpc;
