//! Diagram markup parsing
//!
//! The detail panel renders a PLC diagram as SVG inside a
//! `.ev-svg-cad-content` container. Each `<g>` group is one structural row
//! and its `<text>` descendants are the row's nodes. This module works on the
//! container's serialized markup so the row logic needs no live browser.

use crate::cache::PageData;
use crate::parser::AddressParser;
use scraper::{ElementRef, Html, Selector};

/// Class of the diagram content container
pub const DIAGRAM_BODY_CLASS: &str = "ev-svg-cad-content";

/// Id the active diagram body carries
pub const DIAGRAM_BODY_ID: &str = "page";

/// Extracts the text rows of every active diagram body in `html`
///
/// Bodies whose id is not `page`, or that hold no `<text>` at all, are
/// ignored. Node texts are trimmed; empty ones are kept so row positions
/// stay intact.
///
/// # Arguments
///
/// * `html` - Serialized markup containing one or more diagram bodies
///
/// # Returns
///
/// One `Vec<String>` per `<g>` group, in document order
pub fn diagram_rows(html: &str) -> Vec<Vec<String>> {
    let fragment = Html::parse_fragment(html);
    let (Ok(body_selector), Ok(group_selector), Ok(text_selector)) = (
        Selector::parse(&format!(".{}", DIAGRAM_BODY_CLASS)),
        Selector::parse("g"),
        Selector::parse("text"),
    ) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for body in fragment.select(&body_selector) {
        if body.value().attr("id") != Some(DIAGRAM_BODY_ID) {
            continue;
        }
        if body.select(&text_selector).next().is_none() {
            continue;
        }

        for group in body.select(&group_selector) {
            rows.push(node_texts(group, &text_selector));
        }
    }

    rows
}

fn node_texts(group: ElementRef<'_>, text_selector: &Selector) -> Vec<String> {
    group
        .select(text_selector)
        .map(|node| node.text().collect::<String>().trim().to_string())
        .collect()
}

/// Parses the address/variable pairs of one diagram
///
/// Only rows with an address somewhere in their nodes are handed to the
/// parser; within the diagram the first variable seen for an address wins.
pub fn parse_diagram(html: &str, parser: &AddressParser) -> PageData {
    let rows: Vec<Vec<String>> = diagram_rows(html)
        .into_iter()
        .filter(|row| row.iter().any(|node| parser.contains_address(node)))
        .collect();

    parser.parse_rows(&rows)
}
