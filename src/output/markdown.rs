//! Markdown export of the I/O list
//!
//! Produces a short header with counts followed by a pipe table, for
//! pasting into tickets and wikis.

use crate::extraction::ExtractionResult;
use crate::output::traits::{OutputFormat, ResultWriter};

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownWriter;

impl ResultWriter for MarkdownWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }

    /// Formats the result as a markdown document
    ///
    /// # Arguments
    ///
    /// * `result` - The sorted extraction result
    /// * `project_id` - Project the result belongs to, used in the title
    ///
    /// # Returns
    ///
    /// A formatted markdown string
    fn render(&self, result: &ExtractionResult, project_id: &str) -> String {
        let mut md = String::new();

        md.push_str(&format!("# {} IO-List\n\n", escape_cell(project_id)));
        md.push_str(&format!("- **Variables**: {}\n", result.len()));
        md.push_str(&format!("- **Pages**: {}\n", result.pages_total()));
        md.push_str(&format!(
            "- **Pages from cache**: {}\n\n",
            result.pages_from_cache()
        ));

        md.push_str("| Address | Variable |\n");
        md.push_str("|---------|----------|\n");
        for pair in result.iter() {
            md.push_str(&format!(
                "| {} | {} |\n",
                escape_cell(&pair.address),
                escape_cell(&pair.variable)
            ));
        }

        md
    }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}
