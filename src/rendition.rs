use anyhow::Result;
use log::{debug, error};

use crate::highlight::Highlight;

/// Seam to the EPUB view. The engine hands it opaque range tokens and
/// colors; the view owns resolving them against the rendered content.
pub trait Rendition {
    /// Overlay the given range in the given color.
    fn add_highlight(&mut self, range_ref: &str, color: &str) -> Result<()>;

    /// Remove the overlay previously applied for this range.
    fn remove_highlight(&mut self, range_ref: &str) -> Result<()>;

    /// Scroll the view to the given range.
    fn display(&mut self, range_ref: &str) -> Result<()>;
}

/// CSS class for an overlay, derived from the color token so every
/// color gets its own rule: `#FFEB3B` becomes `hl-FFEB3B`.
pub fn overlay_class(color: &str) -> String {
    format!("hl-{}", color.replace('#', ""))
}

/// Overlays every highlight of a document. A range the view cannot
/// resolve anymore (stale position after reflow) is logged and
/// skipped; the remaining highlights still get applied. Returns how
/// many overlays were applied.
pub fn apply_overlays(rendition: &mut dyn Rendition, highlights: &[Highlight]) -> usize {
    let mut applied = 0;
    for highlight in highlights {
        match rendition.add_highlight(&highlight.range_ref, &highlight.color) {
            Ok(()) => applied += 1,
            Err(e) => error!("Failed to overlay highlight {}: {e:#}", highlight.id),
        }
    }
    debug!("Applied {applied}/{} highlight overlays", highlights.len());
    applied
}
