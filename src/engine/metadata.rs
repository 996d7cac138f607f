// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The metadata envelope carried by every stage result.
//!
//! Each stage wraps the envelope it received under `source_metadata` instead
//! of editing it, so a result that went through N stages carries N nested
//! envelopes and upstream fields are never rewritten.
//!
//! # Example
//! ```rust
//! use filechain::engine::metadata::{chain_depth, Metadata};
//!
//! let whisper = Metadata::new("whisper", "1.0", "memo.wav", None, Default::default());
//! let upstream = serde_json::to_value(&whisper).unwrap();
//! let extractor = Metadata::new("extractor", "1.0", "memo_transcript.json", Some(upstream), Default::default());
//!
//! assert_eq!(chain_depth(&serde_json::to_value(&extractor).unwrap()), 2);
//! ```

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level key holding the envelope in every result document.
pub const METADATA_KEY: &str = "metadata";
pub const SOURCE_METADATA_KEY: &str = "source_metadata";

const RESERVED_KEYS: [&str; 5] = [
    "timestamp",
    "processing_module",
    "version",
    "source_file",
    SOURCE_METADATA_KEY,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub processing_module: String,
    pub version: String,
    pub source_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<Value>,
    /// Stage-specific extras such as counts
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Metadata {
    pub fn new(
        processing_module: &str,
        version: &str,
        source_file: &str,
        source_metadata: Option<Value>,
        mut details: Map<String, Value>,
    ) -> Self {
        // extras may add fields but never shadow the envelope
        for key in RESERVED_KEYS {
            details.remove(key);
        }
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            processing_module: processing_module.to_string(),
            version: version.to_string(),
            source_file: source_file.to_string(),
            source_metadata,
            details,
        }
    }
}

/// A transform's output body together with its envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub body: Map<String, Value>,
    pub metadata: Metadata,
}

impl StageResult {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut document = self.body.clone();
        document.insert(METADATA_KEY.to_string(), serde_json::to_value(&self.metadata)?);
        Ok(Value::Object(document))
    }

    /// Pretty-printed UTF-8 JSON with sorted keys and a trailing newline.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(&self.to_value()?)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Separate an upstream document into its body and its envelope.
pub fn split_document(mut document: Map<String, Value>) -> (Map<String, Value>, Option<Value>) {
    let upstream = document.remove(METADATA_KEY);
    (document, upstream)
}

/// Number of envelopes in a metadata chain, counting the outermost one.
pub fn chain_depth(metadata: &Value) -> usize {
    let mut depth = 0;
    let mut current = Some(metadata);
    while let Some(Value::Object(envelope)) = current {
        depth += 1;
        current = envelope.get(SOURCE_METADATA_KEY);
    }
    depth
}

/// The `source_file` recorded in a serialized result, if it has one.
pub fn source_file_of(document: &[u8]) -> Option<String> {
    let document: Value = serde_json::from_slice(document).ok()?;
    document
        .get(METADATA_KEY)?
        .get("source_file")?
        .as_str()
        .map(str::to_string)
}
