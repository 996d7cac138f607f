// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod launcher;
pub mod transform;

pub use launcher::{WorkerExit, WorkerHandle, WorkerLauncher};
pub use transform::{Artifact, InputFormat, Payload, StageInput, StageOutput, Transform};
