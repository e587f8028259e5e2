//! Diagram page extraction
//!
//! This module turns the page list of an opened project into address data:
//! - `scroll` walks the virtualized list and visits diagram pages
//! - `markup` reads rows out of a rendered diagram
//! - `result` holds per-page records and the final sorted table

pub mod markup;
mod result;
mod scroll;

pub use result::{AddressPair, ExtractionResult, PageRecord, PageSource};
pub use scroll::{
    ScrollExtraction, DIAGRAM_TYPE_MARKER, PAGE_ITEM, PAGE_NAME_ATTRIBUTE, SCROLL_CONTAINER,
};
