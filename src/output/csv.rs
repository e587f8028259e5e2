//! CSV export of the I/O list

use crate::extraction::ExtractionResult;
use crate::output::traits::{OutputFormat, ResultWriter};

/// Writes `Address,Variable` rows with RFC 4180 quoting
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWriter;

impl ResultWriter for CsvWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn render(&self, result: &ExtractionResult, _project_id: &str) -> String {
        let mut csv = String::from("Address,Variable\r\n");
        for pair in result.iter() {
            csv.push_str(&quote_field(&pair.address));
            csv.push(',');
            csv.push_str(&quote_field(&pair.variable));
            csv.push_str("\r\n");
        }
        csv
    }
}

/// Quotes a field if it holds a separator, a quote or a line break
fn quote_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
