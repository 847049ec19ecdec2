//! HTTP basic authentication for the ledger node and wallet endpoints.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use jsonrpsee::http_client::{HeaderMap, HeaderValue};

/// Credentials shared by the node and wallet clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcCredentials {
    pub user: String,
    pub password: String,
}

pub(crate) fn build_auth_headers(credentials: Option<&RpcCredentials>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    if let Some(RpcCredentials { user, password }) = credentials {
        let encoded = BASE64_STANDARD.encode(format!("{user}:{password}"));
        let value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .context("failed to build Authorization header")?;
        headers.insert("Authorization", value);
    }
    Ok(headers)
}
