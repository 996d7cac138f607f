// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::TransformError;
use crate::stages::{array_field, json_body, output_file_name, StageKind};
use crate::traits::{Artifact, StageInput, StageOutput, Transform};

/// Prime stage - analysis and actionable items from normalized data.
///
/// Besides the hand-off result, a copy of the result document is published
/// under the module's final output directory.
pub struct PrimeTransform;

impl PrimeTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrimeTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn priority_breakdown(actionable: &[Value]) -> Value {
    let count = |level: &str| {
        actionable
            .iter()
            .filter(|item| item.get("priority").and_then(Value::as_str) == Some(level))
            .count()
    };
    json!({"high": count("high"), "medium": count("medium"), "low": count("low")})
}

#[async_trait]
impl Transform for PrimeTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let tasks = array_field(body, "tasks", false)?;
        let events = array_field(body, "events", false)?;
        let notes = array_field(body, "notes", false)?;

        // PLACEHOLDER: LLM-based analysis goes here
        let analysis = format!(
            "[PLACEHOLDER ANALYSIS]\n\
             This is a summary analysis of the preprocessed data.\n\
             - Total tasks identified: {}\n\
             - Total events identified: {}\n\
             - Total notes captured: {}\n\n\
             Key insights would be generated here by an LLM.",
            tasks.len(),
            events.len(),
            notes.len()
        );
        let actionable = vec![
            json!({
                "action": "[PLACEHOLDER ACTION 1] High-priority action item",
                "source": "tasks",
                "priority": "high",
                "deadline": "TBD"
            }),
            json!({
                "action": "[PLACEHOLDER ACTION 2] Follow-up required",
                "source": "events",
                "priority": "medium",
                "deadline": "TBD"
            }),
        ];
        let context = json!({
            "total_tasks": tasks.len(),
            "total_events": events.len(),
            "total_notes": notes.len(),
            "priority_breakdown": priority_breakdown(&actionable),
        });
        let actionable_count = actionable.len();

        let mut out = Map::new();
        out.insert("analysis".to_string(), Value::String(analysis));
        out.insert("actionable".to_string(), Value::Array(actionable));
        out.insert("context".to_string(), context);

        Ok(StageOutput::new(out)
            .with_detail("actionable_count", actionable_count)
            .with_artifact(Artifact::ResultCopy {
                relative_path: output_file_name(&input.source_name, StageKind::Prime),
            }))
    }

    fn name(&self) -> &'static str {
        "prime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::json_input;

    #[tokio::test]
    async fn test_analysis_reflects_input_counts() {
        let input = json_input(
            "memo_preprocessed.json",
            json!({"tasks": [{"task": "a"}, {"task": "b"}], "events": [], "notes": ["n"]}),
            None,
        );
        let output = PrimeTransform::new().transform(input).await.unwrap();

        let analysis = output.body["analysis"].as_str().unwrap();
        assert!(analysis.contains("Total tasks identified: 2"));
        assert!(analysis.contains("Total notes captured: 1"));
        assert_eq!(output.body["context"]["total_events"], 0);
        assert_eq!(
            output.body["context"]["priority_breakdown"],
            json!({"high": 1, "medium": 1, "low": 0})
        );
        assert_eq!(output.details["actionable_count"], 2);
    }

    #[tokio::test]
    async fn test_publishes_copy_of_result() {
        let output = PrimeTransform::new()
            .transform(json_input("memo_preprocessed.json", json!({}), None))
            .await
            .unwrap();

        assert_eq!(
            output.artifacts,
            vec![Artifact::ResultCopy {
                relative_path: "memo_primed.json".to_string()
            }]
        );
    }
}
