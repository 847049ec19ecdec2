use std::io;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::{CompactFormatter, Formatter};

/// Canonical record anchored for every successful fetch.
///
/// Serialized as a JSON object whose key order is fixed by the field order
/// below; signatures are computed over that exact byte sequence. Strings
/// are written with `<`, `>`, `&`, U+2028 and U+2029 as `\uXXXX` escapes, so
/// records read by existing consumers hash and verify byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    #[serde(rename = "APIMethod")]
    pub api_method: String,
    #[serde(rename = "ReturnData")]
    pub return_data: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

impl RecordPayload {
    pub fn new(api_method: &str, fetched: &[u8], captured_at_unix: i64) -> Self {
        Self {
            api_method: api_method.to_owned(),
            return_data: String::from_utf8_lossy(fetched).into_owned(),
            timestamp: captured_at_unix,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(128);
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, HtmlSafeFormatter);
        self.serialize(&mut serializer)
            .context("failed to serialize record payload")?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("failed to deserialize record payload")
    }
}

/// Compact JSON output with HTML-sensitive characters escaped.
struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            let escape = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            CompactFormatter.write_string_fragment(writer, &fragment[start..index])?;
            writer.write_all(escape.as_bytes())?;
            start = index + ch.len_utf8();
        }
        CompactFormatter.write_string_fragment(writer, &fragment[start..])
    }
}

/// Builds and serializes the payload for one captured response.
pub fn build_record(api_method: &str, fetched: &[u8], captured_at_unix: i64) -> Result<Vec<u8>> {
    RecordPayload::new(api_method, fetched, captured_at_unix).encode()
}
