use chrono::{DateTime, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::persist::PersistWriter;
use crate::storage::HostStorage;

/// Blob entry owned by the reading-position tracker.
pub const LOCATIONS_KEY: &str = "epub-locations";

/// Last reading position of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingLocation {
    /// Range token of the last displayed position.
    pub location: String,
    pub last_read: DateTime<Utc>,
}

/// Per-document reading positions, persisted under
/// [`LOCATIONS_KEY`] next to the highlight envelope. Same best-effort
/// durability model as the highlight store.
pub struct ReadingLocations {
    storage: Arc<dyn HostStorage>,
    writer: Arc<PersistWriter>,
    books: HashMap<String, ReadingLocation>,
}

impl ReadingLocations {
    pub fn new(storage: Arc<dyn HostStorage>, writer: Arc<PersistWriter>) -> Self {
        Self {
            storage,
            writer,
            books: HashMap::new(),
        }
    }

    /// Populates the tracker from host storage; any failure leaves it
    /// empty and logs.
    pub fn load(&mut self) {
        let blob = match self.storage.load_data() {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                error!("Failed to load reading locations: {e:#}");
                return;
            }
        };
        let Some(entry) = blob.get(LOCATIONS_KEY) else {
            return;
        };
        match serde_json::from_value(entry.clone()) {
            Ok(books) => {
                self.books = books;
                debug!("Loaded reading locations for {} documents", self.books.len());
            }
            Err(e) => error!("Failed to parse reading locations: {e}"),
        }
    }

    pub fn get(&self, document_key: &str) -> Option<&ReadingLocation> {
        self.books.get(document_key)
    }

    pub fn update(&mut self, document_key: &str, location: &str) {
        self.books.insert(
            document_key.to_string(),
            ReadingLocation {
                location: location.to_string(),
                last_read: Utc::now(),
            },
        );
        self.schedule_persist();
    }

    /// The most recently read document, for a "continue reading" entry
    /// point.
    pub fn most_recent(&self) -> Option<(&str, &ReadingLocation)> {
        self.books
            .iter()
            .max_by_key(|(_, location)| location.last_read)
            .map(|(key, location)| (key.as_str(), location))
    }

    fn schedule_persist(&self) {
        match serde_json::to_value(&self.books) {
            Ok(payload) => self.writer.submit(LOCATIONS_KEY, payload),
            Err(e) => error!("Failed to serialize reading locations: {e}"),
        }
    }
}
