use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::filename::sanitize_filename;
use crate::export::template::render_template;
use crate::highlight::Highlight;
use crate::settings::PluginSettings;

/// Frontmatter written at the top of every exported note. Variables:
/// `tags`, `document_key`, `export_date`, `highlight_count`.
pub const DEFAULT_FRONTMATTER: &str = "---\n\
tags: {{tags}}\n\
source: {{document_key}}\n\
exported: {{export_date}}\n\
highlights: {{highlight_count}}\n\
---\n";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No highlights found to export")]
    NoHighlights,
    #[error("Note folder {} does not exist", .0.display())]
    NoteFolderMissing(PathBuf),
}

/// Renders a document's highlights into a Markdown book note, placed
/// next to the EPUB or in the configured note folder.
pub struct HighlightExporter<'a> {
    settings: &'a PluginSettings,
}

impl<'a> HighlightExporter<'a> {
    pub fn new(settings: &'a PluginSettings) -> Self {
        Self { settings }
    }

    /// Writes the note and returns its path.
    pub fn export(&self, document_key: &str, highlights: &[Highlight]) -> Result<PathBuf> {
        if highlights.is_empty() {
            return Err(ExportError::NoHighlights.into());
        }
        let note_path = self.note_path(document_key)?;
        let markdown = self.render_note(document_key, highlights);
        fs::write(&note_path, markdown)
            .with_context(|| format!("Failed to write note to {}", note_path.display()))?;
        info!(
            "Exported {} highlights to {}",
            highlights.len(),
            note_path.display()
        );
        Ok(note_path)
    }

    fn note_path(&self, document_key: &str) -> Result<PathBuf> {
        let document = Path::new(document_key);
        let folder = if self.settings.use_same_folder {
            document.parent().unwrap_or(Path::new("")).to_path_buf()
        } else {
            PathBuf::from(&self.settings.note_path)
        };
        if !folder.as_os_str().is_empty() && !folder.exists() {
            return Err(ExportError::NoteFolderMissing(folder).into());
        }
        Ok(folder.join(format!("{}.md", sanitize_filename(document_title(document_key)))))
    }

    pub fn render_note(&self, document_key: &str, highlights: &[Highlight]) -> String {
        let mut variables = HashMap::new();
        variables.insert("tags".to_string(), self.settings.tags.clone());
        variables.insert("document_key".to_string(), document_key.to_string());
        variables.insert(
            "export_date".to_string(),
            Local::now().format("%Y-%m-%d").to_string(),
        );
        variables.insert(
            "highlight_count".to_string(),
            highlights.len().to_string(),
        );

        let mut output = render_template(DEFAULT_FRONTMATTER, &variables);
        output.push('\n');
        output.push_str(&format!("# {}\n\n", document_title(document_key)));

        for highlight in highlights {
            for line in highlight.text.lines() {
                output.push_str("> ");
                output.push_str(line);
                output.push('\n');
            }
            output.push('\n');

            if let Some(note) = &highlight.note {
                output.push_str(note);
                output.push('\n');
            }
            if let Some(created) = Local.timestamp_millis_opt(highlight.created_at).single() {
                output.push_str(&format!("*// {}*\n", created.format("%m-%d-%Y %H:%M")));
            }
            output.push_str("\n---\n\n");
        }

        output
    }
}

fn document_title(document_key: &str) -> &str {
    Path::new(document_key)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("untitled")
}
