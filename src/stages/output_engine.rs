// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Output engine stage - human-readable reports from prime's analysis.
//!
//! Each enabled output format becomes one artifact under
//! `structured_<base>/` in the module's final output directory:
//!
//! | format    | artifact               |
//! |-----------|------------------------|
//! | `table`   | `<base>_table.txt`     |
//! | `list`    | `<base>_list.txt`      |
//! | `summary` | `<base>_summary.txt`   |
//! | `json`    | `<base>_data.json`     |

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::engine::metadata::{METADATA_KEY, SOURCE_METADATA_KEY};
use crate::errors::TransformError;
use crate::stages::{array_field, base_name, json_body, plain_text};
use crate::traits::{Artifact, StageInput, StageOutput, Transform};

const TABLE_WIDTH: usize = 80;
const LIST_WIDTH: usize = 60;
const ACTION_COLUMN: usize = 48;

pub struct OutputEngineTransform;

impl OutputEngineTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OutputEngineTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn field_text(item: &Value, key: &str, default: &str) -> String {
    item.get(key)
        .filter(|value| !value.is_null())
        .map(plain_text)
        .unwrap_or_else(|| default.to_string())
}

pub fn format_as_table(actionable: &[Value]) -> String {
    if actionable.is_empty() {
        return "No actionable items.\n".to_string();
    }
    let rule = "=".repeat(TABLE_WIDTH);
    let mut table = format!("ACTIONABLE ITEMS TABLE\n{}\n", rule);
    table.push_str(&format!("{:<50} {:<15} {:<15}\n", "Action", "Priority", "Deadline"));
    table.push_str(&format!("{}\n", "-".repeat(TABLE_WIDTH)));
    for item in actionable {
        let action: String = field_text(item, "action", "N/A")
            .chars()
            .take(ACTION_COLUMN)
            .collect();
        table.push_str(&format!(
            "{:<50} {:<15} {:<15}\n",
            action,
            field_text(item, "priority", "N/A"),
            field_text(item, "deadline", "TBD")
        ));
    }
    table.push_str(&format!("{}\n", rule));
    table
}

pub fn format_as_list(actionable: &[Value]) -> String {
    if actionable.is_empty() {
        return "No actionable items.\n".to_string();
    }
    let mut list = format!("ACTIONABLE ITEMS LIST\n{}\n\n", "=".repeat(LIST_WIDTH));
    for (index, item) in actionable.iter().enumerate() {
        list.push_str(&format!(
            "{}. {}\n   Priority: {} | Deadline: {}\n\n",
            index + 1,
            field_text(item, "action", "N/A"),
            field_text(item, "priority", "N/A"),
            field_text(item, "deadline", "TBD")
        ));
    }
    list
}

pub fn format_as_summary(body: &Map<String, Value>, upstream: Option<&Value>) -> String {
    let rule = "=".repeat(TABLE_WIDTH);
    let divider = "-".repeat(TABLE_WIDTH);
    let mut summary = format!("PIPELINE PROCESSING SUMMARY\n{}\n\n", rule);

    if let Some(analysis) = body.get("analysis") {
        summary.push_str(&format!("ANALYSIS:\n{}\n{}\n\n", divider, plain_text(analysis)));
    }
    if let Some(Value::Object(context)) = body.get("context") {
        summary.push_str(&format!("CONTEXT:\n{}\n", divider));
        for (key, value) in context {
            summary.push_str(&format!("  {}: {}\n", key, plain_text(value)));
        }
        summary.push('\n');
    }
    if let Some(Value::Object(metadata)) = upstream {
        summary.push_str(&format!("METADATA:\n{}\n", divider));
        for (key, value) in metadata.iter().filter(|(key, _)| *key != SOURCE_METADATA_KEY) {
            summary.push_str(&format!("  {}: {}\n", key, plain_text(value)));
        }
        summary.push('\n');
    }

    summary.push_str(&format!("{}\n", rule));
    summary
}

#[async_trait]
impl Transform for OutputEngineTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let actionable = array_field(body, "actionable", false)?;
        let base = base_name(&input.source_name);
        let structured_dir = format!("structured_{}", base);

        let mut artifacts = Vec::new();
        let mut paths = Map::new();
        let mut emit = |format: &str, key: &str, file: String, contents: Vec<u8>| {
            if input.format_enabled(format) {
                let relative_path = format!("{}/{}", structured_dir, file);
                paths.insert(key.to_string(), Value::String(relative_path.clone()));
                artifacts.push(Artifact::File {
                    relative_path,
                    contents,
                });
            }
        };

        emit(
            "table",
            "table_txt",
            format!("{}_table.txt", base),
            format_as_table(actionable).into_bytes(),
        );
        emit(
            "list",
            "list_txt",
            format!("{}_list.txt", base),
            format_as_list(actionable).into_bytes(),
        );
        emit(
            "summary",
            "summary_txt",
            format!("{}_summary.txt", base),
            format_as_summary(body, input.upstream.as_ref()).into_bytes(),
        );

        let mut data = body.clone();
        if let Some(upstream) = &input.upstream {
            data.insert(METADATA_KEY.to_string(), upstream.clone());
        }
        let data = serde_json::to_vec_pretty(&Value::Object(data))
            .map_err(|e| TransformError::Failed(e.to_string()))?;
        emit("json", "json_copy", format!("{}_data.json", base), data);

        let mut out = Map::new();
        out.insert("actionable".to_string(), Value::Array(actionable.to_vec()));
        out.insert(
            "analysis".to_string(),
            body.get("analysis").cloned().unwrap_or_else(|| Value::String(String::new())),
        );
        out.insert(
            "context".to_string(),
            body.get("context").cloned().unwrap_or_else(|| Value::Object(Map::new())),
        );
        out.insert("structured_dir".to_string(), Value::String(structured_dir.clone()));
        out.insert("artifacts".to_string(), Value::Object(paths));

        let mut output = StageOutput::new(out);
        output.artifacts = artifacts;
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "output_engine"
    }

    fn version(&self) -> &'static str {
        "1.1"
    }
}
