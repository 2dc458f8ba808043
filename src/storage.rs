use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Host-provided persistence: one JSON object shared by every feature
/// of the plugin. Callers read the whole blob, edit their own keys and
/// write the whole blob back, leaving sibling keys untouched.
pub trait HostStorage: Send + Sync {
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn load_data(&self) -> Result<Option<Value>>;

    fn save_data(&self, data: &Value) -> Result<()>;
}

/// Blob persisted as a single pretty-printed JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostStorage for FileStorage {
    fn load_data(&self) -> Result<Option<Value>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(value))
    }

    fn save_data(&self, data: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// In-process blob for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<Option<Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Mutex::new(Some(data)),
        }
    }

    /// Snapshot of the current blob, for assertions.
    pub fn data(&self) -> Option<Value> {
        self.data.lock().unwrap().clone()
    }
}

impl HostStorage for MemoryStorage {
    fn load_data(&self) -> Result<Option<Value>> {
        Ok(self.data.lock().unwrap().clone())
    }

    fn save_data(&self, data: &Value) -> Result<()> {
        *self.data.lock().unwrap() = Some(data.clone());
        Ok(())
    }
}
