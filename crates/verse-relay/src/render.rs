//! Presentation-only rendering of tool results.
//!
//! Upstream payloads come in a handful of known shapes. Instead of
//! sniffing for alternative field names inline, the shapes form an
//! explicit tagged union with a raw JSON fallback, so supporting a new
//! shape is one localized, type-checked change.

use serde::Deserialize;
use serde_json::Value;

/// The known result shapes, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    /// The content-block convention: `{"content": [{"type": "text"}]}`.
    Blocks {
        /// The typed blocks.
        content: Vec<ContentBlock>,
    },
    /// A single passage of scripture text.
    Passage(Passage),
    /// A listing of annotation or search entries.
    Listing(Listing),
    /// Anything else, rendered as compact JSON.
    Raw(Value),
}

/// One typed content block.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    /// The block type; only `text` blocks are rendered.
    pub r#type: String,
    /// The block text, when present.
    #[serde(default)]
    pub text: Option<String>,
}

/// A passage of scripture text.
#[derive(Debug, Deserialize)]
pub struct Passage {
    /// Display reference, e.g. `John 3:16`.
    pub reference: String,
    /// The passage text.
    pub text: String,
}

/// A listing of entries with count metadata.
#[derive(Debug, Deserialize)]
pub struct Listing {
    /// The entries.
    pub items: Vec<ListingItem>,
    /// Total count, when the payload reports one at the top level.
    #[serde(default, alias = "totalCount")]
    pub total: Option<u64>,
}

/// One listing entry.
#[derive(Debug, Deserialize)]
pub struct ListingItem {
    /// Point reference of the entry.
    #[serde(default)]
    pub reference: Option<String>,
    /// Entry title.
    #[serde(default)]
    pub title: Option<String>,
    /// Entry text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Classifies a raw payload into one of the known shapes.
pub fn classify(raw: &Value) -> ToolResult {
    serde_json::from_value(raw.clone())
        .unwrap_or_else(|_| ToolResult::Raw(raw.clone()))
}

/// Renders a raw tool result as human-readable text.
pub fn render_text(raw: &Value) -> String {
    match classify(raw) {
        ToolResult::Blocks { content } => {
            let texts: Vec<&str> = content
                .iter()
                .filter(|block| block.r#type == "text")
                .filter_map(|block| block.text.as_deref())
                .collect();
            if texts.is_empty() {
                raw.to_string()
            } else {
                texts.join("\n\n")
            }
        }
        ToolResult::Passage(passage) => {
            format!("{}\n{}", passage.reference, passage.text)
        }
        ToolResult::Listing(listing) => render_listing(&listing),
        ToolResult::Raw(value) => value.to_string(),
    }
}

fn render_listing(listing: &Listing) -> String {
    let mut lines: Vec<String> =
        listing.items.iter().map(render_listing_item).collect();
    let total = listing.total.unwrap_or(listing.items.len() as u64);
    lines.push(format!("{total} result(s)"));
    lines.join("\n")
}

fn render_listing_item(item: &ListingItem) -> String {
    let label = item
        .title
        .as_deref()
        .or(item.text.as_deref())
        .unwrap_or("(untitled)");
    match &item.reference {
        Some(reference) => format!("- {reference}: {label}"),
        None => format!("- {label}"),
    }
}
