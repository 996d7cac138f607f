// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::TransformError;
use crate::stages::{array_field, base_name, json_body, plain_text};
use crate::traits::{Artifact, StageInput, StageOutput, Transform};

/// Synthesis stage - long-form narrative from the formatted analysis.
pub struct SynthesisTransform;

impl SynthesisTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SynthesisTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn compose_narrative(analysis: &str, actionable: &[Value]) -> String {
    // PLACEHOLDER: long-form generation goes here
    let mut narrative = String::from("[PLACEHOLDER NARRATIVE]\n\n");
    if !analysis.is_empty() {
        narrative.push_str(analysis);
        narrative.push_str("\n\n");
    }
    if actionable.is_empty() {
        narrative.push_str("No follow-up actions were identified.\n");
    } else {
        narrative.push_str("Recommended next steps:\n");
        for item in actionable {
            let action = item
                .get("action")
                .map(plain_text)
                .unwrap_or_else(|| "N/A".to_string());
            narrative.push_str(&format!("- {}\n", action));
        }
    }
    narrative
}

fn render_markdown(title: &str, narrative: &str) -> String {
    format!("# {}\n\n{}", title, narrative)
}

#[async_trait]
impl Transform for SynthesisTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let actionable = array_field(body, "actionable", false)?;
        let analysis = body.get("analysis").map(plain_text).unwrap_or_default();
        let base = base_name(&input.source_name);

        let title = format!("Pipeline Narrative: {}", base);
        let narrative = compose_narrative(&analysis, actionable);
        let word_count = narrative.split_whitespace().count();

        let mut output = StageOutput::new(Map::new());
        if input.format_enabled("markdown") {
            output = output.with_artifact(Artifact::File {
                relative_path: format!("{}_narrative.md", base),
                contents: render_markdown(&title, &narrative).into_bytes(),
            });
        }

        output.body.insert("title".to_string(), Value::String(title));
        output.body.insert("narrative".to_string(), Value::String(narrative));
        output.body.insert("word_count".to_string(), Value::from(word_count));
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "synthesis"
    }
}
