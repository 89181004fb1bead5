/// Video Tagger
///
/// Walks a directory tree for video files, infers a release code per filename
/// through an OpenAI-compatible chat endpoint, scrapes the metadata page for
/// that code into a tag list, and exports one record per file to a spreadsheet.

pub mod config;
pub mod events;
pub mod export;
pub mod llm;
pub mod pipeline;
pub mod processor;
pub mod scanner;
pub mod tags;

// Re-export main types for easy access
pub use crate::config::Config;
pub use crate::events::{EventSink, PipelineEvent};
pub use crate::llm::extraction::CodeExtractor;
pub use crate::llm::{ChatMessage, LLMResponse, LLM};
pub use crate::processor::{TagRecord, VideoTagProcessor, FAILURE_SENTINEL};
pub use crate::scanner::{VideoFile, VideoScanner};
pub use crate::tags::TagFetcher;

/// Run-fatal pipeline failures. Per-file problems never surface here; they
/// are logged and folded into sentinel records instead.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("directory scan failed: {0}")]
    Scan(String),

    #[error("spreadsheet export failed: {0}")]
    Export(String),
}
