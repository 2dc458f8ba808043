// Engine modules, exported for the host UI layer and tests.
pub mod export;
pub mod highlight;
pub mod location;
pub mod persist;
pub mod rendition;
pub mod selection;
pub mod session;
pub mod settings;
pub mod storage;
pub mod store;

// Re-export the main surface.
pub use highlight::{Highlight, HighlightDraft, HighlightPatch, generate_highlight_id, palette};
pub use persist::PersistWriter;
pub use rendition::{Rendition, apply_overlays, overlay_class};
pub use selection::{SelectionAction, SelectionEvent, SelectionHandler};
pub use session::ReaderSession;
pub use settings::PluginSettings;
pub use storage::{FileStorage, HostStorage, MemoryStorage};
pub use store::{HighlightStore, STORAGE_KEY, STORAGE_VERSION};
