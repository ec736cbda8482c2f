//! Output module for run reports
//!
//! This module handles:
//! - Rendering a Markdown report of a processing outcome
//! - Printing run and discovery summaries to the console
//! - Writing the outcome as JSON

mod report;
mod summary;

pub use report::{format_markdown_report, write_markdown_report};
pub use summary::{print_discovery, print_summary};

use serde::Serialize;
use std::io::{BufWriter, Write};
use thiserror::Error;

/// Errors that can occur while writing outputs
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Serializes `value` as pretty-printed JSON followed by a newline
pub fn write_json<T: Serialize, W: Write>(value: &T, writer: W) -> OutputResult<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
