use serde::Deserialize;
use std::fmt;

/// One configured watch task as it appears in the job file.
///
/// Field names follow the on-disk format (`APIMethod`, `ChainID`, `SecKey`,
/// `ECAddr`), with all-lowercase spellings accepted too. Absent fields decode
/// as empty strings; the job then fails on its own at the step that needs them.
/// The API method doubles as the human-readable label of the job.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    #[serde(rename = "APIMethod", alias = "apimethod")]
    api_method: String,
    #[serde(rename = "ChainID", alias = "chainid")]
    chain_id: String,
    #[serde(rename = "SecKey", alias = "seckey")]
    secret_key: String,
    #[serde(rename = "ECAddr", alias = "ecaddr")]
    funding_address: String,
}

impl JobDescriptor {
    pub fn new(
        api_method: impl Into<String>,
        chain_id: impl Into<String>,
        secret_key: impl Into<String>,
        funding_address: impl Into<String>,
    ) -> Self {
        Self {
            api_method: api_method.into(),
            chain_id: chain_id.into(),
            secret_key: secret_key.into(),
            funding_address: funding_address.into(),
        }
    }

    /// URL of the watched endpoint, also used as the record's method label.
    pub fn api_method(&self) -> &str {
        &self.api_method
    }

    /// Hex chain identifier the record is anchored into.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Hex-encoded signing key material.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Entry-credit address paying for the commit.
    pub fn funding_address(&self) -> &str {
        &self.funding_address
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("api_method", &self.api_method)
            .field("chain_id", &self.chain_id)
            .field("secret_key", &"<redacted>")
            .field("funding_address", &self.funding_address)
            .finish()
    }
}
