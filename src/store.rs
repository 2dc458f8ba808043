use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::highlight::{Highlight, HighlightDraft, HighlightPatch};
use crate::persist::PersistWriter;
use crate::storage::HostStorage;

/// Blob entry owned by the highlight store.
pub const STORAGE_KEY: &str = "epub-highlights";

/// Schema version of the persisted envelope. A blob tagged with any
/// other version is ignored wholesale, never partially adopted.
pub const STORAGE_VERSION: u32 = 1;

/// Versioned envelope persisted under [`STORAGE_KEY`]. Maps document
/// key to that document's highlights in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HighlightData {
    pub version: u32,
    pub highlights: HashMap<String, Vec<Highlight>>,
}

impl Default for HighlightData {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            highlights: HashMap::new(),
        }
    }
}

/// Single in-process authority for highlight data. The in-memory
/// collection is the source of truth for the session; every mutation
/// schedules a background persist and returns without waiting on it.
pub struct HighlightStore {
    storage: Arc<dyn HostStorage>,
    writer: Arc<PersistWriter>,
    data: HighlightData,
}

impl HighlightStore {
    /// Store with its own writer thread. Use [`Self::with_writer`] when
    /// several components persist into the same blob.
    pub fn new(storage: Arc<dyn HostStorage>) -> Self {
        let writer = Arc::new(PersistWriter::spawn(storage.clone()));
        Self::with_writer(storage, writer)
    }

    pub fn with_writer(storage: Arc<dyn HostStorage>, writer: Arc<PersistWriter>) -> Self {
        Self {
            storage,
            writer,
            data: HighlightData::default(),
        }
    }

    /// Populates the collection from host storage. A missing blob, an
    /// unreadable one, or a schema version mismatch all leave the
    /// store empty; none of them are errors for the caller.
    pub fn load(&mut self) {
        let blob = match self.storage.load_data() {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                debug!("No persisted plugin data, starting with empty highlights");
                return;
            }
            Err(e) => {
                error!("Failed to load highlights: {e:#}");
                return;
            }
        };
        let Some(entry) = blob.get(STORAGE_KEY) else {
            debug!("No `{STORAGE_KEY}` entry in plugin data");
            return;
        };
        match serde_json::from_value::<HighlightData>(entry.clone()) {
            Ok(data) if data.version == STORAGE_VERSION => {
                let count: usize = data.highlights.values().map(Vec::len).sum();
                debug!(
                    "Loaded {count} highlights across {} documents",
                    data.highlights.len()
                );
                self.data = data;
            }
            Ok(data) => {
                warn!(
                    "Discarding persisted highlights with unsupported schema version {}",
                    data.version
                );
            }
            Err(e) => {
                error!("Failed to parse persisted highlights: {e}");
            }
        }
    }

    /// Highlights of one document in creation order. Copy-out: the
    /// returned records are detached from store state.
    pub fn highlights_for_document(&self, document_key: &str) -> Vec<Highlight> {
        self.data
            .highlights
            .get(document_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Creates a highlight from the draft, appends it to the document's
    /// sequence and schedules a persist. The record is visible to reads
    /// immediately, before the persist completes.
    pub fn add_highlight(&mut self, document_key: &str, draft: HighlightDraft) -> Highlight {
        let highlight = Highlight::from_draft(draft);
        self.data
            .highlights
            .entry(document_key.to_string())
            .or_default()
            .push(highlight.clone());
        self.schedule_persist();
        highlight
    }

    /// Merges the patch over the matching record in place, preserving
    /// its position. `None` when the id is unknown for that document.
    pub fn update_highlight(
        &mut self,
        document_key: &str,
        id: &str,
        patch: HighlightPatch,
    ) -> Option<Highlight> {
        let highlights = self.data.highlights.get_mut(document_key)?;
        let slot = highlights.iter_mut().find(|h| h.id == id)?;
        slot.apply(patch);
        let updated = slot.clone();
        self.schedule_persist();
        Some(updated)
    }

    /// Removes the matching record. Returns whether anything was
    /// removed; deleting an unknown id is a no-op.
    pub fn delete_highlight(&mut self, document_key: &str, id: &str) -> bool {
        let Some(highlights) = self.data.highlights.get_mut(document_key) else {
            return false;
        };
        let before = highlights.len();
        highlights.retain(|h| h.id != id);
        if highlights.len() == before {
            return false;
        }
        self.schedule_persist();
        true
    }

    /// Drops the whole sequence for a document.
    pub fn clear_document(&mut self, document_key: &str) {
        self.data.highlights.remove(document_key);
        self.schedule_persist();
    }

    /// Snapshot of the full mapping, for export and debugging.
    pub fn all_highlights(&self) -> HashMap<String, Vec<Highlight>> {
        self.data.highlights.clone()
    }

    /// Blocks until every persist scheduled so far has been attempted.
    /// Hosts call this on shutdown; tests use it as a barrier.
    pub fn flush(&self) {
        self.writer.flush();
    }

    fn schedule_persist(&self) {
        match serde_json::to_value(&self.data) {
            Ok(payload) => self.writer.submit(STORAGE_KEY, payload),
            Err(e) => error!("Failed to serialize highlights: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::palette;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::thread::sleep;
    use std::time::Duration;

    fn draft(text: &str) -> HighlightDraft {
        HighlightDraft {
            range_ref: format!("epubcfi(/6/4!/{text})"),
            text: text.to_string(),
            color: palette::YELLOW.to_string(),
            note: None,
        }
    }

    fn empty_store() -> (Arc<MemoryStorage>, HighlightStore) {
        let storage = Arc::new(MemoryStorage::new());
        let mut store = HighlightStore::new(storage.clone());
        store.load();
        (storage, store)
    }

    #[test]
    fn test_add_is_visible_immediately() {
        let (_storage, mut store) = empty_store();
        let added = store.add_highlight("book.epub", draft("Hello"));

        let listed = store.highlights_for_document("book.epub");
        assert_eq!(listed, vec![added]);
    }

    #[test]
    fn test_documents_are_isolated() {
        let (_storage, mut store) = empty_store();
        store.add_highlight("docA.epub", draft("a"));

        assert!(store.highlights_for_document("docB.epub").is_empty());
        assert_eq!(store.highlights_for_document("docA.epub").len(), 1);
    }

    #[test]
    fn test_update_preserves_identity_and_order() {
        let (_storage, mut store) = empty_store();
        let h1 = store.add_highlight("book.epub", draft("one"));
        let h2 = store.add_highlight("book.epub", draft("two"));
        let h3 = store.add_highlight("book.epub", draft("three"));

        sleep(Duration::from_millis(5));
        let updated = store
            .update_highlight("book.epub", &h2.id, HighlightPatch::note("important"))
            .unwrap();

        assert_eq!(updated.id, h2.id);
        assert_eq!(updated.created_at, h2.created_at);
        assert!(updated.updated_at > h2.created_at);
        assert_eq!(updated.note.as_deref(), Some("important"));

        let ids: Vec<_> = store
            .highlights_for_document("book.epub")
            .into_iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![h1.id, h2.id, h3.id]);
    }

    #[test]
    fn test_update_unknown_id_is_none() {
        let (_storage, mut store) = empty_store();
        store.add_highlight("book.epub", draft("one"));
        assert!(
            store
                .update_highlight("book.epub", "missing", HighlightPatch::note("x"))
                .is_none()
        );
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_storage, mut store) = empty_store();
        let highlight = store.add_highlight("book.epub", draft("bye"));

        assert!(store.delete_highlight("book.epub", &highlight.id));
        assert!(store.highlights_for_document("book.epub").is_empty());
        assert!(!store.delete_highlight("book.epub", &highlight.id));
    }

    #[test]
    fn test_clear_document() {
        let (_storage, mut store) = empty_store();
        store.add_highlight("book.epub", draft("a"));
        store.add_highlight("book.epub", draft("b"));
        store.add_highlight("other.epub", draft("kept"));

        store.clear_document("book.epub");

        assert!(store.highlights_for_document("book.epub").is_empty());
        assert_eq!(store.highlights_for_document("other.epub").len(), 1);
    }

    #[test]
    fn test_all_highlights_is_a_snapshot() {
        let (_storage, mut store) = empty_store();
        store.add_highlight("book.epub", draft("a"));

        let mut snapshot = store.all_highlights();
        snapshot.get_mut("book.epub").unwrap().clear();

        assert_eq!(store.highlights_for_document("book.epub").len(), 1);
    }

    #[test]
    fn test_round_trip_through_storage() {
        let (storage, mut store) = empty_store();
        let kept = store.add_highlight("book.epub", draft("kept"));
        let dropped = store.add_highlight("book.epub", draft("dropped"));
        store.add_highlight("other.epub", draft("elsewhere"));
        store.update_highlight("book.epub", &kept.id, HighlightPatch::color(palette::GREEN));
        store.delete_highlight("book.epub", &dropped.id);
        store.flush();
        let expected = store.all_highlights();
        drop(store);

        let mut reloaded = HighlightStore::new(storage);
        reloaded.load();
        assert_eq!(reloaded.all_highlights(), expected);
        assert_eq!(
            reloaded.highlights_for_document("book.epub")[0].color,
            palette::GREEN
        );
    }

    #[test]
    fn test_version_mismatch_discards_blob() {
        let storage = Arc::new(MemoryStorage::with_data(json!({
            STORAGE_KEY: {
                "version": 0,
                "highlights": {
                    "book.epub": [{
                        "id": "old", "rangeRef": "r", "text": "t",
                        "color": "#FFEB3B",
                        "createdAt": 1, "updatedAt": 1
                    }]
                }
            }
        })));
        let mut store = HighlightStore::new(storage);
        store.load();
        assert!(store.all_highlights().is_empty());
    }

    #[test]
    fn test_missing_version_discards_blob() {
        let storage = Arc::new(MemoryStorage::with_data(json!({
            STORAGE_KEY: {"highlights": {}}
        })));
        let mut store = HighlightStore::new(storage);
        store.load();
        assert!(store.all_highlights().is_empty());
    }

    #[test]
    fn test_garbled_blob_is_ignored() {
        let storage = Arc::new(MemoryStorage::with_data(json!({
            STORAGE_KEY: "not an envelope"
        })));
        let mut store = HighlightStore::new(storage);
        store.load();
        assert!(store.all_highlights().is_empty());
    }

    #[test]
    fn test_save_preserves_sibling_keys() {
        let storage = Arc::new(MemoryStorage::with_data(json!({
            "scrolledView": true,
            "epub-locations": {"book.epub": {"location": "x", "lastRead": "2024-01-01T00:00:00Z"}}
        })));
        let mut store = HighlightStore::new(storage.clone());
        store.load();
        store.add_highlight("book.epub", draft("hi"));
        store.flush();

        let blob = storage.data().unwrap();
        assert_eq!(blob["scrolledView"], json!(true));
        assert!(blob.get("epub-locations").is_some());
        assert_eq!(blob[STORAGE_KEY]["version"], json!(STORAGE_VERSION));
    }

    #[test]
    fn test_example_scenario() {
        let (_storage, mut store) = empty_store();

        let added = store.add_highlight(
            "book.epub",
            HighlightDraft {
                range_ref: "epubcfi(/6/4)".to_string(),
                text: "Hello".to_string(),
                color: "#FFEB3B".to_string(),
                note: Some(String::new()),
            },
        );
        assert!(!added.id.is_empty());
        assert_eq!(added.text, "Hello");
        assert_eq!(added.created_at, added.updated_at);

        sleep(Duration::from_millis(5));
        let updated = store
            .update_highlight("book.epub", &added.id, HighlightPatch::note("important"))
            .unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.note.as_deref(), Some("important"));
        assert!(updated.updated_at > updated.created_at);

        assert!(store.delete_highlight("book.epub", &added.id));
        assert!(store.highlights_for_document("book.epub").is_empty());
    }
}
