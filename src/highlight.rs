use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Suggested highlight colors. The `color` field on a record stays an
/// open token, so hosts may pass any CSS color they like.
pub mod palette {
    pub const YELLOW: &str = "#FFEB3B";
    pub const GREEN: &str = "#8BC34A";
    pub const BLUE: &str = "#2196F3";
    pub const PINK: &str = "#E91E63";
    pub const ORANGE: &str = "#FF9800";

    pub const ALL: [&str; 5] = [YELLOW, GREEN, BLUE, PINK, ORANGE];
}

/// One user-created annotation. Field names follow the persisted JSON
/// contract (camelCase, millisecond timestamps).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    /// Opaque span token, meaningful only to the rendering view.
    pub range_ref: String,
    /// Plain-text snapshot taken at creation time, never re-derived.
    pub text: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Caller-supplied fields of a new highlight. Id and timestamps are
/// filled in by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightDraft {
    pub range_ref: String,
    pub text: String,
    pub color: String,
    pub note: Option<String>,
}

/// Partial update. Absent fields are left untouched; id, range, text
/// and creation time are never updatable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightPatch {
    pub color: Option<String>,
    pub note: Option<String>,
}

impl HighlightPatch {
    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }

    pub fn color(color: impl Into<String>) -> Self {
        Self {
            color: Some(color.into()),
            ..Self::default()
        }
    }
}

impl Highlight {
    pub fn from_draft(draft: HighlightDraft) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: generate_highlight_id(),
            range_ref: draft.range_ref,
            text: draft.text,
            color: draft.color,
            note: draft.note.filter(|note| !note.is_empty()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merges a patch over the record and refreshes `updated_at`.
    /// An empty note string clears the note.
    pub fn apply(&mut self, patch: HighlightPatch) {
        if let Some(color) = patch.color {
            self.color = color;
        }
        if let Some(note) = patch.note {
            self.note = if note.is_empty() { None } else { Some(note) };
        }
        self.updated_at = Utc::now().timestamp_millis();
    }
}

const ID_RANDOM_LEN: usize = 11;

/// Opaque process-unique identifier: millisecond timestamp in base 36
/// followed by a random base-36 suffix. A collision needs the same
/// millisecond and the same 11-character suffix, which is negligible
/// at single-user highlight volumes.
pub fn generate_highlight_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut id = to_base36(millis);
    let mut rng = rand::thread_rng();
    for _ in 0..ID_RANDOM_LEN {
        let digit = rng.gen_range(0..36u32);
        // Digits below 36 always map to a character.
        id.push(char::from_digit(digit, 36).unwrap());
    }
    id
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    // 13 base-36 digits cover the full u64 range.
    let mut digits = [0u8; 13];
    let mut used = 0;
    while value > 0 {
        digits[used] = (value % 36) as u8;
        value /= 36;
        used += 1;
    }
    digits[..used]
        .iter()
        .rev()
        .map(|&digit| char::from_digit(u32::from(digit), 36).unwrap())
        .collect()
}
