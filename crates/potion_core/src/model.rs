//! Data model for the Potion workspace.
//!
//! These structs are both the stored record shapes and the wire shapes of
//! the portable export document, so field names serialize in camelCase.
//! Identifiers are opaque strings; timestamps are ISO-8601 via chrono.

use crate::content::BlockContent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Timestamp type used throughout the engine.
pub type Timestamp = DateTime<Utc>;

/// Fixed id of the settings singleton.
pub const DEFAULT_SETTINGS_ID: &str = "default";

/// Mints a fresh opaque id.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Root container of one tenant's pages and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    /// Opaque unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl Workspace {
    /// Creates a workspace with a fresh id and current timestamps.
    #[must_use]
    pub fn create(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Discriminates plain pages from database container pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    /// Free-form block content.
    Page,
    /// Container for schema'd rows.
    Database,
}

/// A titled node in the content forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Opaque unique id.
    pub id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Parent page, or `None` for a root page.
    pub parent_page_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Page kind.
    #[serde(rename = "type")]
    pub page_type: PageType,
    /// Optional emoji or icon reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Pinned in the sidebar.
    pub is_favorite: bool,
    /// Rendered without the content column cap.
    pub is_full_width: bool,
    /// Block tree, stored verbatim.
    pub content: BlockContent,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Last time the page was opened.
    pub last_accessed_at: Timestamp,
}

impl Page {
    /// Creates an empty page with a fresh id and current timestamps.
    #[must_use]
    pub fn create(
        workspace_id: impl Into<String>,
        title: impl Into<String>,
        page_type: PageType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            workspace_id: workspace_id.into(),
            parent_page_id: None,
            title: title.into(),
            page_type,
            icon: None,
            is_favorite: false,
            is_full_width: false,
            content: BlockContent::default(),
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        }
    }
}

/// Page metadata without content; what list and search operations return.
///
/// Deserializes from a full stored page record (the `content` field is
/// ignored), which keeps sidebar listings from decoding block trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    /// Opaque unique id.
    pub id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Parent page, or `None` for a root page.
    pub parent_page_id: Option<String>,
    /// Display title.
    pub title: String,
    /// Page kind.
    #[serde(rename = "type")]
    pub page_type: PageType,
    /// Optional emoji or icon reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Pinned in the sidebar.
    pub is_favorite: bool,
    /// Rendered without the content column cap.
    pub is_full_width: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Last time the page was opened.
    pub last_accessed_at: Timestamp,
}

impl From<&Page> for PageSummary {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id.clone(),
            workspace_id: page.workspace_id.clone(),
            parent_page_id: page.parent_page_id.clone(),
            title: page.title.clone(),
            page_type: page.page_type,
            icon: page.icon.clone(),
            is_favorite: page.is_favorite,
            is_full_width: page.is_full_width,
            created_at: page.created_at,
            updated_at: page.updated_at,
            last_accessed_at: page.last_accessed_at,
        }
    }
}

/// Property kinds a simple database supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Free text.
    Text,
    /// Numeric value.
    Number,
    /// One option out of a fixed set.
    Select,
    /// Boolean flag.
    Checkbox,
    /// Calendar date.
    Date,
    /// External link.
    Url,
}

/// One selectable option of a `select` property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOption {
    /// Opaque option id, referenced from row values.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Optional display color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// One column of a database page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    /// Opaque property id, the key into row values.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Value kind.
    pub kind: PropertyKind,
    /// Options for `select` properties; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,
}

/// Schema of a database page. Exists iff the page has type `database`,
/// keyed 1:1 by the page id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    /// The owning page id (primary key).
    pub page_id: String,
    /// Column definitions.
    pub properties: Vec<PropertyDef>,
}

/// One record of a database page.
///
/// Every row owns a companion page (`page_id`) holding its free-form
/// content; `database_page_id` references the containing database page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Opaque unique id.
    pub id: String,
    /// The database page this row belongs to.
    pub database_page_id: String,
    /// The row's companion page.
    pub page_id: String,
    /// Property values keyed by property id.
    pub values: serde_json::Map<String, serde_json::Value>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl Row {
    /// Creates an empty row with a fresh id and current timestamps.
    #[must_use]
    pub fn create(
        database_page_id: impl Into<String>,
        page_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            database_page_id: database_page_id.into(),
            page_id: page_id.into(),
            values: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A row joined with its companion page's title.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSummary {
    /// Opaque unique id.
    pub id: String,
    /// The database page this row belongs to.
    pub database_page_id: String,
    /// The row's companion page.
    pub page_id: String,
    /// Companion page title, or "Untitled" when the page is missing.
    pub title: String,
    /// Property values keyed by property id.
    pub values: serde_json::Map<String, serde_json::Value>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Color theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Always light.
    Light,
    /// Always dark.
    Dark,
    /// Follow the OS preference.
    System,
}

/// Editor font size preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    /// Compact text.
    Small,
    /// Default text.
    Medium,
    /// Enlarged text.
    Large,
}

/// Editor column width preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorWidth {
    /// Capped content column.
    Normal,
    /// Wider content column.
    Wide,
    /// Full window width.
    Full,
}

/// User settings singleton, keyed by [`DEFAULT_SETTINGS_ID`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Fixed id (`"default"`).
    pub id: String,
    /// Color theme.
    pub theme: Theme,
    /// Editor font size.
    pub font_size: FontSize,
    /// Editor column width.
    pub editor_width: EditorWidth,
    /// Sidebar collapsed state.
    pub sidebar_collapsed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: DEFAULT_SETTINGS_ID.to_owned(),
            theme: Theme::System,
            font_size: FontSize::Medium,
            editor_width: EditorWidth::Normal,
            sidebar_collapsed: false,
        }
    }
}
