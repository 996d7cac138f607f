// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::TransformError;
use crate::traits::{InputFormat, StageInput, StageOutput, Transform};

/// Whisper stage - audio to transcript. Placeholder for a speech-to-text model.
pub struct WhisperTransform;

impl WhisperTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WhisperTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for WhisperTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let size = input
            .bytes()
            .map(|bytes| bytes.len())
            .ok_or_else(|| TransformError::InvalidInput("expected raw audio bytes".to_string()))?;

        let mut body = Map::new();
        body.insert(
            "transcript".to_string(),
            Value::String(format!(
                "[PLACEHOLDER TRANSCRIPT] Audio file '{}' would be transcribed here.",
                input.source_name
            )),
        );

        Ok(StageOutput::new(body).with_detail("file_size", json!(size)))
    }

    fn name(&self) -> &'static str {
        "whisper"
    }

    fn input_format(&self) -> InputFormat {
        InputFormat::Raw
    }
}
