// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::TransformError;
use crate::stages::json_body;
use crate::traits::{StageInput, StageOutput, Transform};

/// Extractor stage - facts and open questions from a transcript.
pub struct ExtractorTransform;

impl ExtractorTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExtractorTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for ExtractorTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let transcript = body
            .get("transcript")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if transcript.is_empty() {
            return Err(TransformError::InvalidInput(
                "no transcript found".to_string(),
            ));
        }

        // PLACEHOLDER: LLM-based extraction goes here
        let facts = [
            "[PLACEHOLDER FACT 1] Extracted from transcript",
            "[PLACEHOLDER FACT 2] Another extracted fact",
            "[PLACEHOLDER FACT 3] Third extracted fact",
        ];
        let unknown = [
            "[PLACEHOLDER UNKNOWN 1] Item requiring clarification",
            "[PLACEHOLDER UNKNOWN 2] Another uncertain item",
        ];

        let mut out = Map::new();
        out.insert("facts".to_string(), json!(facts));
        out.insert("unknown".to_string(), json!(unknown));

        Ok(StageOutput::new(out)
            .with_detail("facts_count", facts.len())
            .with_detail("unknown_count", unknown.len()))
    }

    fn name(&self) -> &'static str {
        "extractor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{json_input, raw_input};

    #[tokio::test]
    async fn test_extracts_facts_and_unknowns() {
        let input = json_input("memo_transcript.json", json!({"transcript": "call the bank"}), None);
        let output = ExtractorTransform::new().transform(input).await.unwrap();

        assert_eq!(output.body["facts"].as_array().unwrap().len(), 3);
        assert_eq!(output.details["facts_count"], 3);
        assert_eq!(output.details["unknown_count"], 2);
    }

    #[tokio::test]
    async fn test_missing_or_blank_transcript_is_invalid() {
        let transform = ExtractorTransform::new();
        for body in [json!({}), json!({"transcript": "   "}), json!({"transcript": 7})] {
            let err = transform
                .transform(json_input("x.json", body, None))
                .await
                .unwrap_err();
            assert!(matches!(err, TransformError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_raw_payload_is_invalid() {
        let err = ExtractorTransform::new()
            .transform(raw_input("x.bin", b"\x00"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidInput(_)));
    }
}
