// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Transforms with scripted behaviour for exercising the worker runtime.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::errors::TransformError;
use crate::traits::{InputFormat, StageInput, StageOutput, Transform};

/// Echoes the JSON body back unchanged
pub struct PassthroughTransform;

#[async_trait]
impl Transform for PassthroughTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = input
            .json()
            .cloned()
            .ok_or_else(|| TransformError::InvalidInput("expected JSON".to_string()))?;
        Ok(StageOutput::new(body))
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

/// A transform that always fails with a retryable error
pub struct FailingTransform;

#[async_trait]
impl Transform for FailingTransform {
    async fn transform(&self, _input: StageInput) -> Result<StageOutput, TransformError> {
        Err(TransformError::Failed("Simulated transform failure".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }

    fn input_format(&self) -> InputFormat {
        InputFormat::Raw
    }
}

/// Fails the first `failures` calls, then passes the input through.
pub struct FlakyTransform {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyTransform {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for FlakyTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(TransformError::Failed(format!("flaky failure {}", call)));
        }
        PassthroughTransform.transform(input).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Rejects every input as a schema violation
pub struct InvalidInputTransform;

#[async_trait]
impl Transform for InvalidInputTransform {
    async fn transform(&self, _input: StageInput) -> Result<StageOutput, TransformError> {
        Err(TransformError::InvalidInput("missing required field 'facts'".to_string()))
    }

    fn name(&self) -> &'static str {
        "invalid_input"
    }
}
