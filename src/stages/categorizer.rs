// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map};

use crate::errors::TransformError;
use crate::stages::{array_field, json_body};
use crate::traits::{StageInput, StageOutput, Transform};

/// Categorizer stage - sorts extracted facts into tasks, events and notes.
pub struct CategorizerTransform;

impl CategorizerTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CategorizerTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for CategorizerTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let _facts = array_field(body, "facts", true)?;
        let unknown = array_field(body, "unknown", false)?;

        // PLACEHOLDER: LLM-based categorization goes here
        let tasks = json!([
            {"task": "[PLACEHOLDER TASK] Action item from facts", "priority": "medium", "status": "pending"},
            {"task": "[PLACEHOLDER TASK] Another action item", "priority": "low", "status": "pending"}
        ]);
        let events = json!([
            {"event": "[PLACEHOLDER EVENT] Meeting or deadline", "date": "TBD", "type": "meeting"},
            {"event": "[PLACEHOLDER EVENT] Another scheduled item", "date": "TBD", "type": "deadline"}
        ]);
        let notes = json!([
            "[PLACEHOLDER NOTE] General information from facts",
            "[PLACEHOLDER NOTE] Additional context or observation"
        ]);

        let count = |value: &serde_json::Value| value.as_array().map_or(0, Vec::len);
        let (tasks_count, events_count, notes_count) = (count(&tasks), count(&events), count(&notes));

        let mut out = Map::new();
        out.insert("tasks".to_string(), tasks);
        out.insert("events".to_string(), events);
        out.insert("notes".to_string(), notes);

        Ok(StageOutput::new(out)
            .with_detail("tasks_count", tasks_count)
            .with_detail("events_count", events_count)
            .with_detail("notes_count", notes_count)
            .with_detail("unknown_items", unknown.len()))
    }

    fn name(&self) -> &'static str {
        "categorizer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::json_input;

    #[tokio::test]
    async fn test_categorizes_into_three_buckets() {
        let input = json_input(
            "memo_extracted.json",
            json!({"facts": ["a", "b"], "unknown": ["?"]}),
            None,
        );
        let output = CategorizerTransform::new().transform(input).await.unwrap();

        assert_eq!(output.body["tasks"][0]["priority"], "medium");
        assert_eq!(output.details["tasks_count"], 2);
        assert_eq!(output.details["events_count"], 2);
        assert_eq!(output.details["notes_count"], 2);
        assert_eq!(output.details["unknown_items"], 1);
    }

    #[tokio::test]
    async fn test_facts_must_be_an_array() {
        let transform = CategorizerTransform::new();
        for body in [json!({}), json!({"facts": "not a list"})] {
            let err = transform
                .transform(json_input("x.json", body, None))
                .await
                .unwrap_err();
            assert!(matches!(err, TransformError::InvalidInput(_)));
        }
    }

    #[tokio::test]
    async fn test_empty_facts_are_accepted() {
        let output = CategorizerTransform::new()
            .transform(json_input("x.json", json!({"facts": []}), None))
            .await
            .unwrap();
        assert_eq!(output.details["unknown_items"], 0);
    }
}
