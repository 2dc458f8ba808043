pub mod exporter;
pub mod filename;
pub mod template;

pub use exporter::{ExportError, HighlightExporter};
pub use filename::sanitize_filename;
pub use template::render_template;
