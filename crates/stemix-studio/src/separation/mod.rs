//! Stem separation
//!
//! Splits a mixed song into vocals, drums, bass and other by running demucs
//! or spleeter as an external process. Results are cached by file name and
//! method, so splitting the same file twice runs the tool once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           SeparationService / SeparationHandle          │
//! │  • background worker thread, one job at a time          │
//! │  • Queued/Started/CacheHit/Finished/Failed/Cancelled    │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                     StemSplitter                        │
//! │  • input conversion into the cache                      │
//! │  • cache lookup, tool invocation, output check          │
//! └─────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  ToolRunner (trait)                     │
//! │  • ProcessRunner: child process, killed on cancel       │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
pub(crate) mod job;
mod service;

pub use config::{SeparationConfig, SeparationMethod};
pub use error::{Result, SeparationError};
pub use job::{
    list_files, CancelToken, ProcessRunner, SplitOutcome, StemPaths, StemSplitter, ToolInvocation,
    ToolOutput, ToolRunner,
};
pub use service::{JobId, SeparationCommand, SeparationEvent, SeparationHandle, SeparationService};
