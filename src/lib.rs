//! mkabook - Matroska audiobook builder
//!
//! Turns a directory of audio files, an optional cover image and an optional
//! chapter list into a single chaptered `.mka` audiobook, using ffmpeg and
//! mkvtoolnix as external tools.

pub mod audio;
pub mod chapters;
pub mod config;
pub mod discovery;
pub mod error;
pub mod mux;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod runner;
pub mod testing;

// Re-export main types for easy access
pub use crate::chapters::{ChapterLayout, ChapterNode, ChapterTree};
pub use crate::config::{Codec, ItemConfig, ItemOverrides, PersistedConfig, ResolvedItem, RunOptions};
pub use crate::error::{MkabookError, Result};
pub use crate::output::DisplayOptions;
pub use crate::pipeline::{ItemPipeline, PipelineOutcome, PipelineState};
pub use crate::processing::{BatchProcessor, BatchSummary, ItemReport};
pub use crate::runner::{ProcessRunner, Step, ToolInvocation, ToolPaths, ToolRunner};
