// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod archive;
pub mod heartbeat;
pub mod manifest;
pub mod metadata;
pub mod scanner;
pub mod sink;
pub mod work_item;
pub mod worker;

pub use archive::{ArchiveOutcome, ArchiveRecord};
pub use scanner::InboxScanner;
pub use sink::write_atomic;
pub use work_item::{ClaimState, WorkItem};
pub use worker::{run_module, CycleOutcome, StageWorker, WorkerPhase, WorkerStats};
