// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Cloud dispatch stage. Delivery is simulated by copying the input into
//! the module's dated results directory; the worker records every delivery in
//! the dispatch manifest.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::engine::manifest::{compute_checksum, file_type_of};
use crate::errors::TransformError;
use crate::traits::{Artifact, InputFormat, StageInput, StageOutput, Transform};

pub struct CloudDispatchTransform;

impl CloudDispatchTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CloudDispatchTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for CloudDispatchTransform {
    async fn transform(&self, input: StageInput) -> Result<StageOutput, TransformError> {
        let contents = input
            .bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| TransformError::InvalidInput("expected raw file bytes".to_string()))?;

        let mut body = Map::new();
        body.insert("file_name".to_string(), Value::String(input.source_name.clone()));
        body.insert(
            "file_type".to_string(),
            Value::String(file_type_of(&input.source_name)),
        );
        body.insert("file_size".to_string(), Value::from(contents.len()));
        body.insert("checksum".to_string(), Value::String(compute_checksum(&contents)));

        Ok(StageOutput::new(body).with_artifact(Artifact::Delivery {
            file_name: input.source_name,
            contents,
        }))
    }

    fn name(&self) -> &'static str {
        "cloud_dispatch"
    }

    fn input_format(&self) -> InputFormat {
        InputFormat::Raw
    }
}
