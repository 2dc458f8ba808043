use anyhow::{Context, Result};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::highlight::palette;
use crate::storage::HostStorage;

/// Plugin configuration. The fields live at the top level of the
/// shared data blob (camelCase, next to the highlight and location
/// entries), merged over defaults on load so older installs and
/// unknown sibling keys survive round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginSettings {
    /// Seamless scrolling between pages instead of pagination.
    pub scrolled_view: bool,
    /// Folder for exported book notes when `use_same_folder` is off.
    pub note_path: String,
    /// Create the book note next to the EPUB itself.
    pub use_same_folder: bool,
    /// Tags written into exported note frontmatter.
    pub tags: String,
    pub default_highlight_color: String,
    pub auto_save_highlights: bool,
    pub show_highlight_toolbar: bool,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            scrolled_view: false,
            note_path: "/".to_string(),
            use_same_folder: true,
            tags: "notes/booknotes".to_string(),
            default_highlight_color: palette::YELLOW.to_string(),
            auto_save_highlights: true,
            show_highlight_toolbar: true,
        }
    }
}

impl PluginSettings {
    /// Reads settings from the blob. Unreadable or missing data falls
    /// back to defaults; partial data fills the gaps with defaults.
    pub fn load(storage: &dyn HostStorage) -> Self {
        match storage.load_data() {
            Ok(Some(blob)) => serde_json::from_value(blob).unwrap_or_else(|e| {
                error!("Failed to parse plugin settings: {e}");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                error!("Failed to load plugin settings: {e:#}");
                Self::default()
            }
        }
    }

    /// Merges the settings fields into the blob's top level, leaving
    /// sibling keys (highlight data among them) untouched.
    pub fn save(&self, storage: &dyn HostStorage) -> Result<()> {
        let mut blob = match storage.load_data()? {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        let fields = serde_json::to_value(self).context("Failed to serialize settings")?;
        if let Value::Object(fields) = fields {
            for (key, value) in fields {
                blob.insert(key, value);
            }
        }
        storage.save_data(&Value::Object(blob))
    }
}
