//! Storage statistics.

use serde::Serialize;

/// Record counts plus an advisory size estimate.
///
/// The byte estimate is the summed serialized size of the four record
/// collections (settings excluded); it tracks growth, not exact disk use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Number of workspaces.
    pub workspaces: usize,
    /// Number of pages.
    pub pages: usize,
    /// Number of database schemas.
    pub databases: usize,
    /// Number of rows.
    pub rows: usize,
    /// Serialized size of all records, in bytes.
    pub estimated_size_bytes: usize,
}
