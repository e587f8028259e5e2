//! PLC address classification
//!
//! A diagram row is a handful of text nodes. One of them is an I/O address
//! such as `I1.0`, `Q15.3`, `IW100` or `QW2.1`; another one is the variable
//! name wired to it. `AddressParser` turns a row into an `(address, variable)`
//! pair and `parse_rows` applies it to a whole page, keeping the first
//! variable seen for each address.

use crate::cache::PageData;
use crate::extraction::AddressPair;
use regex::Regex;

/// Address grammar: `I`/`Q`, optional `W`, index, optional `.bit`
pub const ADDRESS_PATTERN: &str = r"\b([IQ]W?\d+\.\d+|[IQ]W\d+)\b";

/// Classifies diagram text nodes into addresses and variable names
#[derive(Debug, Clone)]
pub struct AddressParser {
    anywhere: Regex,
    leading: Regex,
}

impl Default for AddressParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AddressParser {
    pub fn new() -> Self {
        Self {
            anywhere: Regex::new(ADDRESS_PATTERN).expect("address pattern is valid"),
            leading: Regex::new(&format!("^(?:{})", ADDRESS_PATTERN))
                .expect("address pattern is valid"),
        }
    }

    /// Returns true if `text` starts with an address token
    pub fn is_address(&self, text: &str) -> bool {
        self.leading.is_match(text)
    }

    /// Returns true if an address token appears anywhere in `text`
    pub fn contains_address(&self, text: &str) -> bool {
        self.anywhere.is_match(text)
    }

    /// Returns true if a node carries data rather than an annotation
    ///
    /// Empty nodes and nodes starting with `=` or `:` are structural
    /// references.
    pub fn is_data_node(text: &str) -> bool {
        !(text.is_empty() || text.starts_with('=') || text.starts_with(':'))
    }

    /// Parses one row of text nodes
    ///
    /// The first data node starting with an address is the key, the first
    /// data node that does not is the value. Both must be present.
    pub fn parse_row<S: AsRef<str>>(&self, nodes: &[S]) -> Option<AddressPair> {
        let mut address: Option<&str> = None;
        let mut variable: Option<&str> = None;

        for node in nodes {
            let text = node.as_ref();
            if !Self::is_data_node(text) {
                continue;
            }

            if self.is_address(text) {
                address.get_or_insert(text);
            } else {
                variable.get_or_insert(text);
            }

            if address.is_some() && variable.is_some() {
                break;
            }
        }

        Some(AddressPair::new(address?, variable?))
    }

    /// Parses all rows of one page; the first occurrence of an address wins
    pub fn parse_rows<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> PageData {
        let mut data = PageData::new();
        for row in rows {
            if let Some(pair) = self.parse_row(row) {
                data.entry(pair.address).or_insert(pair.variable);
            }
        }
        data
    }
}
