//! Block content storage and shallow text extraction.
//!
//! The block editor owns this document; the storage layer stores it
//! verbatim and only walks it to feed page search. Unknown fields on any
//! node survive a load/store round trip via serde flattening, so editor
//! upgrades cannot be dropped by the persistence layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The content document of a page: a tree of blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockContent {
    /// Top-level blocks.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Fields the storage layer does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One block node, optionally holding inline text runs and child blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Block id, when the editor assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Block kind (paragraph, heading, list item, ...), opaque here.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Inline text runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<InlineRun>,
    /// Nested blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
    /// Fields the storage layer does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One inline run of text inside a block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InlineRun {
    /// The run's text.
    #[serde(default)]
    pub text: String,
    /// Formatting marks and other editor fields, uninterpreted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockContent {
    /// Concatenates every inline text run of every block and its
    /// descendants, depth-first, joined by single spaces.
    #[must_use]
    pub fn extract_text(&self) -> String {
        let mut runs = Vec::new();
        for block in &self.blocks {
            collect_runs(block, &mut runs);
        }
        runs.join(" ")
    }

    /// Returns true if the document holds no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn collect_runs(block: &Block, out: &mut Vec<String>) {
    for run in &block.text {
        if !run.text.is_empty() {
            out.push(run.text.clone());
        }
    }
    for child in &block.children {
        collect_runs(child, out);
    }
}
