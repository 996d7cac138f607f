// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::categorizer::CategorizerTransform;
use super::cloud_dispatch::CloudDispatchTransform;
use super::extractor::ExtractorTransform;
use super::output_engine::OutputEngineTransform;
use super::preprocess::PreprocessTransform;
use super::prime::PrimeTransform;
use super::synthesis::SynthesisTransform;
use super::whisper::WhisperTransform;
use super::StageKind;
use crate::traits::Transform;

/// Factory for the built-in stage transforms
pub struct StageFactory;

impl StageFactory {
    /// Create the transform that implements `kind`.
    ///
    /// Swapping a placeholder for real logic (a speech-to-text model, an LLM
    /// call, ...) is a change to this match arm only; the worker runtime does
    /// not know which transform it drives.
    pub fn create_transform(kind: StageKind) -> Arc<dyn Transform> {
        match kind {
            StageKind::Whisper => Arc::new(WhisperTransform::new()),
            StageKind::Extractor => Arc::new(ExtractorTransform::new()),
            StageKind::Categorizer => Arc::new(CategorizerTransform::new()),
            StageKind::Preprocess => Arc::new(PreprocessTransform::new()),
            StageKind::Prime => Arc::new(PrimeTransform::new()),
            StageKind::OutputEngine => Arc::new(OutputEngineTransform::new()),
            StageKind::Synthesis => Arc::new(SynthesisTransform::new()),
            StageKind::CloudDispatch => Arc::new(CloudDispatchTransform::new()),
        }
    }
}
