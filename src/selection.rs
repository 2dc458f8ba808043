use crate::highlight::HighlightDraft;

/// Raw selection emitted by the rendering view: the opaque range token
/// plus the selected text as extracted by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub range_ref: String,
    pub text: String,
}

impl SelectionEvent {
    pub fn new(range_ref: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            range_ref: range_ref.into(),
            text: text.into(),
        }
    }

    /// Trims the selected text. Whitespace-only selections are dropped
    /// here, before they can reach the store.
    pub fn normalize(self) -> Option<Self> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            range_ref: self.range_ref,
            text: text.to_string(),
        })
    }
}

/// What the caller should do with a selection that survived
/// normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Continuous mode is on: create this highlight right away.
    Highlight { draft: HighlightDraft },
    /// No active color: the selection is parked until the reader picks
    /// a color from the toolbar.
    Deferred,
}

/// Toolbar state: the active continuous-highlight color and the last
/// parked selection.
#[derive(Debug, Default)]
pub struct SelectionHandler {
    active_color: Option<String>,
    pending: Option<SelectionEvent>,
}

impl SelectionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_color(&self) -> Option<&str> {
        self.active_color.as_deref()
    }

    pub fn pending(&self) -> Option<&SelectionEvent> {
        self.pending.as_ref()
    }

    /// Picking the active color again turns continuous mode off; any
    /// other color replaces it.
    pub fn toggle_color(&mut self, color: &str) {
        if self.active_color.as_deref() == Some(color) {
            self.active_color = None;
        } else {
            self.active_color = Some(color.to_string());
        }
    }

    /// Routes a selection event. `None` when the selection was empty
    /// after trimming; no state changes in that case beyond keeping
    /// whatever was already pending.
    pub fn on_selection(&mut self, event: SelectionEvent) -> Option<SelectionAction> {
        let event = event.normalize()?;
        match self.active_color.clone() {
            Some(color) => {
                self.pending = None;
                Some(SelectionAction::Highlight {
                    draft: HighlightDraft {
                        range_ref: event.range_ref,
                        text: event.text,
                        color,
                        note: None,
                    },
                })
            }
            None => {
                self.pending = Some(event);
                Some(SelectionAction::Deferred)
            }
        }
    }

    /// Turns the parked selection into a draft in the given color and
    /// toggles continuous mode on that color, mirroring the toolbar's
    /// highlight button.
    pub fn highlight_pending(&mut self, color: &str) -> Option<HighlightDraft> {
        let draft = self.pending.take().map(|event| HighlightDraft {
            range_ref: event.range_ref,
            text: event.text,
            color: color.to_string(),
            note: None,
        });
        self.toggle_color(color);
        draft
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
    }
}
