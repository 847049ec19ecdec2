//! Ledger entry model plus its binary encoding and hash.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};

pub const CHAIN_ID_LENGTH: usize = 32;
pub const MAX_ENTRY_BYTES: usize = 10_240;
const ENTRY_VERSION: u8 = 0;

/// A signed record ready for commit/reveal.
///
/// The signature over `content` travels as the first external id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    chain_id: String,
    content: Vec<u8>,
    ext_ids: Vec<Vec<u8>>,
}

/// Hex view of an entry, as accepted by the wallet's `compose-entry`.
#[derive(Debug, Clone, Serialize)]
pub struct EntryJson {
    pub chainid: String,
    pub extids: Vec<String>,
    pub content: String,
}

impl Entry {
    /// Creates an entry after checking the chain id is 32 bytes of hex.
    pub fn new(chain_id: impl Into<String>, content: Vec<u8>) -> Result<Self> {
        let chain_id = chain_id.into().trim().to_ascii_lowercase();
        let decoded = hex::decode(&chain_id).context("chain id is not valid hex")?;
        if decoded.len() != CHAIN_ID_LENGTH {
            bail!(
                "chain id must be {CHAIN_ID_LENGTH} bytes, got {}",
                decoded.len()
            );
        }

        Ok(Self {
            chain_id,
            content,
            ext_ids: Vec::new(),
        })
    }

    pub fn push_ext_id(&mut self, ext_id: impl Into<Vec<u8>>) {
        self.ext_ids.push(ext_id.into());
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn ext_ids(&self) -> &[Vec<u8>] {
        &self.ext_ids
    }

    /// Signature carried in the first external id, if any.
    pub fn signature(&self) -> Option<&[u8]> {
        self.ext_ids.first().map(Vec::as_slice)
    }

    /// Binary layout: version, chain id, u16 ext-id block size, each ext id as
    /// u16 length plus bytes, then content. Integers are big-endian.
    pub fn marshal_binary(&self) -> Result<Vec<u8>> {
        let chain_id = hex::decode(&self.chain_id).context("chain id is not valid hex")?;

        let ext_block: usize = self.ext_ids.iter().map(|ext| ext.len() + 2).sum();
        let ext_block = u16::try_from(ext_block).context("external ids exceed 65535 bytes")?;

        let mut data =
            Vec::with_capacity(1 + CHAIN_ID_LENGTH + 2 + ext_block as usize + self.content.len());
        data.push(ENTRY_VERSION);
        data.extend_from_slice(&chain_id);
        data.extend_from_slice(&ext_block.to_be_bytes());
        for ext in &self.ext_ids {
            let len = u16::try_from(ext.len()).context("external id exceeds 65535 bytes")?;
            data.extend_from_slice(&len.to_be_bytes());
            data.extend_from_slice(ext);
        }
        data.extend_from_slice(&self.content);

        if data.len() > MAX_ENTRY_BYTES {
            bail!(
                "entry is {} bytes, above the {MAX_ENTRY_BYTES} byte limit",
                data.len()
            );
        }

        Ok(data)
    }

    /// SHA-256 over SHA-512(data) followed by data.
    pub fn hash(&self) -> Result<[u8; 32]> {
        let data = self.marshal_binary()?;
        let inner = Sha512::digest(&data);
        let mut hasher = Sha256::new();
        hasher.update(inner);
        hasher.update(&data);
        Ok(hasher.finalize().into())
    }

    pub fn hash_hex(&self) -> Result<String> {
        self.hash().map(hex::encode)
    }

    pub fn to_json(&self) -> EntryJson {
        EntryJson {
            chainid: self.chain_id.clone(),
            extids: self.ext_ids.iter().map(hex::encode).collect(),
            content: hex::encode(&self.content),
        }
    }
}
