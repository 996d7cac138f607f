// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::TransformError;

/// How the worker hands an inbox file to a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Bytes as found on disk (audio, arbitrary deliverables)
    Raw,
    /// A JSON object produced by the previous stage
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Vec<u8>),
    /// The upstream document with its `metadata` key removed
    Json(Map<String, Value>),
}

/// Everything a transform may look at. Transforms never touch the filesystem.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// File name of the input as it arrived in the inbox
    pub source_name: String,
    pub payload: Payload,
    /// The upstream stage's metadata envelope, if the input carried one
    pub upstream: Option<Value>,
    /// Output formats enabled for this module
    pub formats: Vec<String>,
}

impl StageInput {
    pub fn json(&self) -> Option<&Map<String, Value>> {
        match &self.payload {
            Payload::Json(doc) => Some(doc),
            Payload::Raw(_) => None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes.as_slice()),
            Payload::Json(_) => None,
        }
    }

    pub fn format_enabled(&self, format: &str) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case(format))
    }

    /// Timestamp recorded by the previous stage.
    pub fn upstream_timestamp(&self) -> Option<&str> {
        self.upstream
            .as_ref()
            .and_then(|meta| meta.get("timestamp"))
            .and_then(Value::as_str)
    }
}

/// A side output written by the worker next to the primary result.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    /// A file under the module's `final_output` directory
    File {
        relative_path: String,
        contents: Vec<u8>,
    },
    /// A copy of the primary result document under `final_output`
    ResultCopy { relative_path: String },
    /// A dispatched deliverable: stored under `final_output/<date>/` and
    /// recorded in the dispatch manifest
    Delivery { file_name: String, contents: Vec<u8> },
}

/// What a transform produces: the result body plus extra metadata fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub body: Map<String, Value>,
    /// Merged into the result's `metadata` envelope
    pub details: Map<String, Value>,
    pub artifacts: Vec<Artifact>,
}

impl StageOutput {
    pub fn new(body: Map<String, Value>) -> Self {
        Self {
            body,
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// Stage-specific business logic plugged into the generic worker runtime.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError>;

    fn name(&self) -> &'static str;

    fn version(&self) -> &'static str {
        "1.0"
    }

    fn input_format(&self) -> InputFormat {
        InputFormat::Json
    }
}
