use log::error;
use std::path::PathBuf;
use std::sync::Arc;

use crate::export::HighlightExporter;
use crate::highlight::{Highlight, HighlightDraft, HighlightPatch};
use crate::location::ReadingLocations;
use crate::persist::PersistWriter;
use crate::rendition::{Rendition, apply_overlays};
use crate::selection::{SelectionAction, SelectionEvent, SelectionHandler};
use crate::settings::PluginSettings;
use crate::storage::HostStorage;
use crate::store::HighlightStore;

/// One reading session over one document: wires settings, the
/// highlight store, reading positions and the view together.
///
/// Constructed explicitly by the host with injected storage and view;
/// all persisting components share a single writer so their
/// read-modify-writes of the shared blob stay serialized.
pub struct ReaderSession<R: Rendition> {
    settings: PluginSettings,
    store: HighlightStore,
    locations: ReadingLocations,
    selection: SelectionHandler,
    rendition: R,
    document_key: String,
}

impl<R: Rendition> ReaderSession<R> {
    /// Loads persisted state, re-applies the document's overlays and
    /// jumps to the last reading position.
    pub fn open(
        storage: Arc<dyn HostStorage>,
        rendition: R,
        document_key: impl Into<String>,
    ) -> Self {
        let writer = Arc::new(PersistWriter::spawn(storage.clone()));
        let settings = PluginSettings::load(storage.as_ref());
        let mut store = HighlightStore::with_writer(storage.clone(), writer.clone());
        store.load();
        let mut locations = ReadingLocations::new(storage, writer);
        locations.load();

        let mut session = Self {
            settings,
            store,
            locations,
            selection: SelectionHandler::new(),
            rendition,
            document_key: document_key.into(),
        };
        session.restore();
        session
    }

    fn restore(&mut self) {
        let highlights = self.store.highlights_for_document(&self.document_key);
        apply_overlays(&mut self.rendition, &highlights);

        if let Some(location) = self.locations.get(&self.document_key) {
            let location = location.location.clone();
            if let Err(e) = self.rendition.display(&location) {
                error!("Failed to restore reading position: {e:#}");
            }
        }
    }

    pub fn document_key(&self) -> &str {
        &self.document_key
    }

    pub fn settings(&self) -> &PluginSettings {
        &self.settings
    }

    pub fn highlights(&self) -> Vec<Highlight> {
        self.store.highlights_for_document(&self.document_key)
    }

    /// Selection reported by the view. In continuous mode this creates
    /// the highlight immediately and returns it; otherwise the
    /// selection is parked for [`Self::highlight_pending`]. Empty
    /// selections are discarded.
    pub fn handle_selection(&mut self, event: SelectionEvent) -> Option<Highlight> {
        match self.selection.on_selection(event)? {
            SelectionAction::Highlight { draft } => Some(self.create_highlight(draft)),
            SelectionAction::Deferred => None,
        }
    }

    /// Toolbar button: highlight the parked selection in the given
    /// color and enter continuous mode on it.
    pub fn highlight_pending(&mut self, color: &str) -> Option<Highlight> {
        let draft = self.selection.highlight_pending(color)?;
        Some(self.create_highlight(draft))
    }

    /// Same, with the configured default color.
    pub fn highlight_pending_default(&mut self) -> Option<Highlight> {
        let color = self.settings.default_highlight_color.clone();
        self.highlight_pending(&color)
    }

    pub fn toggle_color(&mut self, color: &str) {
        self.selection.toggle_color(color);
    }

    fn create_highlight(&mut self, draft: HighlightDraft) -> Highlight {
        let highlight = self.store.add_highlight(&self.document_key, draft);
        if let Err(e) = self
            .rendition
            .add_highlight(&highlight.range_ref, &highlight.color)
        {
            // The record is persisted either way; the overlay will come
            // back on the next open.
            error!("Failed to overlay new highlight {}: {e:#}", highlight.id);
        }
        highlight
    }

    pub fn update_note(&mut self, id: &str, note: &str) -> Option<Highlight> {
        self.store
            .update_highlight(&self.document_key, id, HighlightPatch::note(note))
    }

    pub fn update_color(&mut self, id: &str, color: &str) -> Option<Highlight> {
        let updated = self
            .store
            .update_highlight(&self.document_key, id, HighlightPatch::color(color))?;
        // Repaint: drop the old overlay and draw the recolored one.
        if let Err(e) = self.rendition.remove_highlight(&updated.range_ref) {
            error!("Failed to remove overlay for {}: {e:#}", updated.id);
        }
        if let Err(e) = self
            .rendition
            .add_highlight(&updated.range_ref, &updated.color)
        {
            error!("Failed to repaint overlay for {}: {e:#}", updated.id);
        }
        Some(updated)
    }

    /// Deletes the highlight and removes its overlay. Returns whether
    /// a record was removed.
    pub fn remove_highlight(&mut self, id: &str) -> bool {
        let Some(highlight) = self.highlights().into_iter().find(|h| h.id == id) else {
            return false;
        };
        if !self.store.delete_highlight(&self.document_key, id) {
            return false;
        }
        if let Err(e) = self.rendition.remove_highlight(&highlight.range_ref) {
            error!("Failed to remove overlay for {}: {e:#}", highlight.id);
        }
        true
    }

    /// "Go to" from the highlight panel.
    pub fn navigate_to(&mut self, range_ref: &str) {
        if let Err(e) = self.rendition.display(range_ref) {
            error!("Failed to navigate to highlight: {e:#}");
            return;
        }
        self.locations.update(&self.document_key, range_ref);
    }

    /// Position change reported by the view while reading.
    pub fn location_changed(&mut self, location: &str) {
        self.locations.update(&self.document_key, location);
    }

    /// Exports this document's highlights to a Markdown book note.
    pub fn export_highlights(&self) -> anyhow::Result<PathBuf> {
        let highlights = self.highlights();
        HighlightExporter::new(&self.settings).export(&self.document_key, &highlights)
    }

    /// Blocks until pending writes have been attempted. Hosts call
    /// this when the panel closes.
    pub fn flush(&self) {
        self.store.flush();
    }
}
