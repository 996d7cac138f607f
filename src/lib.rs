// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;         // config loading + validation
pub mod engine;         // generic stage runtime
pub mod errors;         // error handling
pub mod observability;  // logging setup + message types
pub mod stages;         // the eight stages and their transforms
pub mod supervisor;     // worker lifecycle control plane
pub mod traits;         // transform + launcher seams
