// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Preprocess stage - normalizes categorized data into a fixed schema.
//!
//! Tasks must carry a string `task` and events a string `event`; optional
//! string fields get defaults. Entries that do not fit are dropped and counted
//! in `validation_errors`. `created_at` is the upstream timestamp, so the same
//! input always normalizes to the same document.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::errors::TransformError;
use crate::stages::{array_field, json_body, plain_text};
use crate::traits::{StageInput, StageOutput, Transform};

const UNKNOWN_CREATED_AT: &str = "unknown";

pub struct PreprocessTransform;

impl PreprocessTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PreprocessTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// `required` plus `(field, default)` pairs, all strings.
fn normalize_entry(
    entry: &Value,
    required: &str,
    defaults: &[(&str, &str)],
    created_at: &str,
) -> Option<Value> {
    let object = entry.as_object()?;
    let mut normalized = Map::new();
    normalized.insert(
        required.to_string(),
        Value::String(object.get(required)?.as_str()?.to_string()),
    );
    for (field, default) in defaults {
        let value = match object.get(*field) {
            None | Some(Value::Null) => default.to_string(),
            Some(Value::String(text)) => text.clone(),
            Some(_) => return None,
        };
        normalized.insert(field.to_string(), Value::String(value));
    }
    normalized.insert("created_at".to_string(), Value::String(created_at.to_string()));
    Some(Value::Object(normalized))
}

#[async_trait]
impl Transform for PreprocessTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let body = json_body(&input)?;
        let tasks = array_field(body, "tasks", false)?;
        let events = array_field(body, "events", false)?;
        let notes = array_field(body, "notes", false)?;
        let created_at = input.upstream_timestamp().unwrap_or(UNKNOWN_CREATED_AT);

        let normalized_tasks: Vec<Value> = tasks
            .iter()
            .filter_map(|task| {
                normalize_entry(task, "task", &[("priority", "medium"), ("status", "pending")], created_at)
            })
            .collect();
        let normalized_events: Vec<Value> = events
            .iter()
            .filter_map(|event| {
                normalize_entry(event, "event", &[("date", "TBD"), ("type", "general")], created_at)
            })
            .collect();
        let normalized_notes: Vec<Value> = notes
            .iter()
            .filter(|note| !note.is_null())
            .map(|note| plain_text(note).trim().to_string())
            .filter(|note| !note.is_empty())
            .map(Value::String)
            .collect();

        let validation_errors =
            (tasks.len() - normalized_tasks.len()) + (events.len() - normalized_events.len());
        let (task_count, event_count, note_count) = (
            normalized_tasks.len(),
            normalized_events.len(),
            normalized_notes.len(),
        );

        let mut out = Map::new();
        out.insert("tasks".to_string(), json!(normalized_tasks));
        out.insert("events".to_string(), json!(normalized_events));
        out.insert("notes".to_string(), json!(normalized_notes));

        Ok(StageOutput::new(out)
            .with_detail("normalized_tasks", task_count)
            .with_detail("normalized_events", event_count)
            .with_detail("normalized_notes", note_count)
            .with_detail("validation_errors", validation_errors))
    }

    fn name(&self) -> &'static str {
        "preprocess"
    }
}
