//! Output module for writing the extracted I/O list
//!
//! This module handles:
//! - Rendering the sorted address table as CSV or markdown
//! - Choosing the default output file name for a project

mod csv;
mod markdown;
mod traits;

pub use csv::CsvWriter;
pub use markdown::MarkdownWriter;
pub use traits::{OutputError, OutputFormat, OutputResult, ResultWriter};

use crate::extraction::ExtractionResult;
use std::path::{Path, PathBuf};

/// Returns the writer for `format`
pub fn writer_for(format: OutputFormat) -> Box<dyn ResultWriter> {
    match format {
        OutputFormat::Csv => Box::new(CsvWriter),
        OutputFormat::Markdown => Box::new(MarkdownWriter),
    }
}

/// Default output file: `"<project> IO-List.<ext>"` in the working directory
pub fn default_output_path(project_id: &str, format: OutputFormat) -> PathBuf {
    PathBuf::from(format!("{} IO-List.{}", project_id, format.extension()))
}

/// Writes `result` in `format`, to `path` or the default location
///
/// # Returns
///
/// * `Ok(PathBuf)` - The file that was written
/// * `Err(OutputError)` - Failed to write the file
pub fn write_result(
    result: &ExtractionResult,
    project_id: &str,
    format: OutputFormat,
    path: Option<&Path>,
) -> OutputResult<PathBuf> {
    let target = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(project_id, format));

    writer_for(format).write(result, project_id, &target)?;
    Ok(target)
}
