//! Extraction results
//!
//! A run collects one `PageRecord` per visited diagram page. The final
//! `ExtractionResult` flattens them into address/variable pairs sorted by
//! address in plain string order, so `I10.0` sorts before `I2.0`.

use crate::cache::PageData;
use std::fmt;

/// One address with the variable wired to it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPair {
    pub address: String,
    pub variable: String,
}

impl AddressPair {
    pub fn new(address: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            variable: variable.into(),
        }
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.address, self.variable)
    }
}

/// Where a page's data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// Read from the page cache
    Cache,
    /// Extracted from the rendered diagram in this run
    Live,
}

/// Data collected for one diagram page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Stable page name (`data-name` of the list item)
    pub name: String,
    pub data: PageData,
    pub source: PageSource,
}

impl PageRecord {
    pub fn new(name: impl Into<String>, data: PageData, source: PageSource) -> Self {
        Self {
            name: name.into(),
            data,
            source,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.source == PageSource::Cache
    }
}

/// Sorted table of every pair collected in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    entries: Vec<AddressPair>,
    pages_total: usize,
    pages_from_cache: usize,
}

impl ExtractionResult {
    /// Flattens page records into one table
    ///
    /// Pages are taken in visit order and the sort is stable, so an address
    /// that appears on two pages keeps both pairs, earlier page first.
    pub fn from_pages(pages: &[PageRecord]) -> Self {
        let mut entries: Vec<AddressPair> = pages
            .iter()
            .flat_map(|page| {
                page.data
                    .iter()
                    .map(|(address, variable)| AddressPair::new(address.as_str(), variable.as_str()))
            })
            .collect();
        entries.sort_by(|a, b| a.address.cmp(&b.address));

        Self {
            entries,
            pages_total: pages.len(),
            pages_from_cache: pages.iter().filter(|p| p.is_cached()).count(),
        }
    }

    pub fn entries(&self) -> &[AddressPair] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddressPair> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of diagram pages that contributed, cached or not
    pub fn pages_total(&self) -> usize {
        self.pages_total
    }

    pub fn pages_from_cache(&self) -> usize {
        self.pages_from_cache
    }
}

impl IntoIterator for ExtractionResult {
    type Item = AddressPair;
    type IntoIter = std::vec::IntoIter<AddressPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
