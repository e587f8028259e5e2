//! Writer trait and output types

use crate::extraction::ExtractionResult;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// File format of the I/O list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Markdown,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Markdown => "md",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Markdown => write!(f, "markdown"),
        }
    }
}

/// Renders an extraction result into one output format
pub trait ResultWriter {
    fn format(&self) -> OutputFormat;

    /// Renders the whole document
    fn render(&self, result: &ExtractionResult, project_id: &str) -> String;

    /// Renders and writes the document to `path`, replacing any existing file
    fn write(&self, result: &ExtractionResult, project_id: &str, path: &Path) -> OutputResult<()> {
        let document = self.render(result, project_id);
        let mut file = File::create(path)?;
        file.write_all(document.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
