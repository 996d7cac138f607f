// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it with typed fields at the right level.
//!
//! # Organization
//!
//! * `stage` - stage worker lifecycle and per-file events
//! * `supervisor` - worker process lifecycle, restarts and alerts
//! * `validation` - configuration loading and validation problems
//!
//! # Usage Pattern
//!
//! ```rust
//! use filechain::observability::messages::stage::FileClaimed;
//! use filechain::observability::messages::StructuredLog;
//!
//! let msg = FileClaimed {
//!     stage: "extractor",
//!     file: "memo_transcript.json",
//!     attempt: 1,
//! };
//!
//! msg.log();
//! ```

pub mod stage;
pub mod supervisor;
pub mod validation;

use tracing::Span;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("event", span_name = name)
    }
}
