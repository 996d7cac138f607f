// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The eight pipeline stages and their placeholder transforms.
//!
//! Every stage runs on the same generic runtime (`engine::StageWorker`); the
//! only thing that differs between them is the [`Transform`] plugged in and a
//! handful of registry facts kept on [`StageKind`]: position in the pipeline,
//! default directories, output file suffix and default input filter.
//!
//! The transforms in this module are stand-ins for external logic (speech to
//! text, LLM extraction, ...). They are deterministic so that re-running a
//! stage on the same bytes yields the same result document.
//!
//! [`Transform`]: crate::traits::Transform

pub mod categorizer;
pub mod cloud_dispatch;
pub mod extractor;
pub mod factory;
pub mod output_engine;
pub mod preprocess;
pub mod prime;
#[cfg(test)]
pub mod stub;
pub mod synthesis;
pub mod whisper;

pub use factory::StageFactory;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::errors::TransformError;
use crate::traits::StageInput;

/// Root directory for the default per-stage directory tree.
pub const PIPELINE_ROOT: &str = "pipeline";

/// Identifies one of the eight sequential stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Whisper,
    Extractor,
    Categorizer,
    Preprocess,
    Prime,
    OutputEngine,
    Synthesis,
    CloudDispatch,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [StageKind; 8] = [
        StageKind::Whisper,
        StageKind::Extractor,
        StageKind::Categorizer,
        StageKind::Preprocess,
        StageKind::Prime,
        StageKind::OutputEngine,
        StageKind::Synthesis,
        StageKind::CloudDispatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Whisper => "whisper",
            StageKind::Extractor => "extractor",
            StageKind::Categorizer => "categorizer",
            StageKind::Preprocess => "preprocess",
            StageKind::Prime => "prime",
            StageKind::OutputEngine => "output_engine",
            StageKind::Synthesis => "synthesis",
            StageKind::CloudDispatch => "cloud_dispatch",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Comma-separated list of module names, for error messages.
    pub fn available_names() -> String {
        Self::ALL.map(StageKind::name).join(", ")
    }

    /// One-based position in the pipeline.
    pub fn position(self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| *kind == self)
            .map(|index| index + 1)
            .unwrap_or_default()
    }

    pub fn description(self) -> &'static str {
        match self {
            StageKind::Whisper => "Audio to transcript conversion",
            StageKind::Extractor => "Fact extraction from transcripts",
            StageKind::Categorizer => "Categorization into tasks, events, notes",
            StageKind::Preprocess => "Data normalization and schema enforcement",
            StageKind::Prime => "Analysis and actionable generation",
            StageKind::OutputEngine => "Structured output formatting",
            StageKind::Synthesis => "Narrative and long-form generation",
            StageKind::CloudDispatch => "Cloud delivery simulation",
        }
    }

    /// Suffix appended to the base name of every result this stage writes.
    pub fn output_suffix(self) -> &'static str {
        match self {
            StageKind::Whisper => "_transcript",
            StageKind::Extractor => "_extracted",
            StageKind::Categorizer => "_categorized",
            StageKind::Preprocess => "_preprocessed",
            StageKind::Prime => "_primed",
            StageKind::OutputEngine => "_formatted",
            StageKind::Synthesis => "_synthesized",
            StageKind::CloudDispatch => "_dispatched",
        }
    }

    /// File extensions picked up from the inbox when the config does not say
    /// otherwise. Empty means every file.
    pub fn default_extensions(self) -> Vec<String> {
        match self {
            StageKind::Whisper | StageKind::CloudDispatch => Vec::new(),
            _ => vec!["json".to_string()],
        }
    }

    /// Additional output formats a stage can emit besides its JSON result.
    pub fn default_output_formats(self) -> Vec<String> {
        let formats: &[&str] = match self {
            StageKind::Prime => &["json"],
            StageKind::OutputEngine => &["table", "list", "summary", "json"],
            StageKind::Synthesis => &["markdown"],
            _ => &[],
        };
        formats.iter().map(|format| format.to_string()).collect()
    }

    pub fn next(self) -> Option<StageKind> {
        Self::ALL.get(self.position()).copied()
    }

    fn dir_label(self) -> &'static str {
        match self {
            StageKind::Whisper => "Whisper",
            StageKind::Extractor => "Extractor",
            StageKind::Categorizer => "Categorizer",
            StageKind::Preprocess => "Preprocess",
            StageKind::Prime => "Prime",
            StageKind::OutputEngine => "Output",
            StageKind::Synthesis => "Synthesis",
            StageKind::CloudDispatch => "Dispatch",
        }
    }

    /// `pipeline/<n>_<name>`
    pub fn default_dir(self) -> PathBuf {
        PathBuf::from(PIPELINE_ROOT).join(format!("{}_{}", self.position(), self.name()))
    }

    pub fn default_inbox(self) -> PathBuf {
        self.default_dir().join(format!("{}_Inbox", self.dir_label()))
    }

    pub fn default_output(self) -> PathBuf {
        self.default_dir().join(format!("{}_Output", self.dir_label()))
    }

    pub fn default_final_output(self) -> PathBuf {
        match self {
            StageKind::Prime => self.default_dir().join("Final_Output").join("prime"),
            StageKind::CloudDispatch => self.default_dir().join("Cloud_Results"),
            _ => self.default_dir().join("Final_Output"),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strip a trailing stage suffix (`memo_transcript` -> `memo`).
pub fn base_name(file_name: &str) -> &str {
    let stem = match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    };
    StageKind::ALL
        .iter()
        .find_map(|kind| stem.strip_suffix(kind.output_suffix()))
        .filter(|base| !base.is_empty())
        .unwrap_or(stem)
}

/// Name of the JSON result a stage writes for a given input file.
pub fn output_file_name(source_name: &str, kind: StageKind) -> String {
    format!("{}{}.json", base_name(source_name), kind.output_suffix())
}

/// The JSON body of an input, or `InvalidInput` for raw payloads.
pub(crate) fn json_body(input: &StageInput) -> Result<&Map<String, Value>, TransformError> {
    input
        .json()
        .ok_or_else(|| TransformError::InvalidInput("expected a JSON document".to_string()))
}

/// An array field. Missing reads as empty unless `required`; any other type is
/// a schema violation.
pub(crate) fn array_field<'a>(
    body: &'a Map<String, Value>,
    key: &str,
    required: bool,
) -> Result<&'a [Value], TransformError> {
    match body.get(key) {
        Some(Value::Array(items)) => Ok(items),
        None | Some(Value::Null) if !required => Ok(&[]),
        None | Some(Value::Null) => Err(TransformError::InvalidInput(format!(
            "missing required field '{}'",
            key
        ))),
        Some(_) => Err(TransformError::InvalidInput(format!(
            "field '{}' must be an array",
            key
        ))),
    }
}

/// Text of a JSON value without the quotes `Display` puts around strings.
pub(crate) fn plain_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::traits::Payload;

    pub fn json_input(name: &str, body: Value, upstream: Option<Value>) -> StageInput {
        let body = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        StageInput {
            source_name: name.to_string(),
            payload: Payload::Json(body),
            upstream,
            formats: Vec::new(),
        }
    }

    pub fn raw_input(name: &str, bytes: &[u8]) -> StageInput {
        StageInput {
            source_name: name.to_string(),
            payload: Payload::Raw(bytes.to_vec()),
            upstream: None,
            formats: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_order_and_positions() {
        assert_eq!(StageKind::Whisper.position(), 1);
        assert_eq!(StageKind::CloudDispatch.position(), 8);
        assert_eq!(StageKind::Whisper.next(), Some(StageKind::Extractor));
        assert_eq!(StageKind::Synthesis.next(), Some(StageKind::CloudDispatch));
        assert_eq!(StageKind::CloudDispatch.next(), None);
    }

    #[test]
    fn test_names_round_trip_through_lookup() {
        for kind in StageKind::ALL {
            assert_eq!(StageKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(StageKind::from_name("transcoder"), None);
    }

    #[test]
    fn test_default_directories_follow_stage_layout() {
        assert_eq!(
            StageKind::Whisper.default_inbox(),
            PathBuf::from("pipeline/1_whisper/Whisper_Inbox")
        );
        assert_eq!(
            StageKind::OutputEngine.default_output(),
            PathBuf::from("pipeline/6_output_engine/Output_Output")
        );
        assert_eq!(
            StageKind::CloudDispatch.default_final_output(),
            PathBuf::from("pipeline/8_cloud_dispatch/Cloud_Results")
        );
    }

    #[test]
    fn test_output_file_names_chain_through_stages() {
        let transcript = output_file_name("memo.txt", StageKind::Whisper);
        assert_eq!(transcript, "memo_transcript.json");

        let extracted = output_file_name(&transcript, StageKind::Extractor);
        assert_eq!(extracted, "memo_extracted.json");

        let categorized = output_file_name(&extracted, StageKind::Categorizer);
        assert_eq!(categorized, "memo_categorized.json");
    }

    #[test]
    fn test_base_name_edge_cases() {
        assert_eq!(base_name("noext"), "noext");
        assert_eq!(base_name(".hidden"), ".hidden");
        assert_eq!(base_name("_transcript.json"), "_transcript");
        assert_eq!(base_name("a.b.c"), "a.b");
    }
}
