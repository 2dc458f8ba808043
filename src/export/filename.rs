use regex::Regex;
use std::sync::LazyLock;

// Characters invalid on Windows plus control characters; covers the
// union of platform restrictions.
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).unwrap());

static RESERVED_NAMES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(CON|PRN|AUX|NUL|COM[1-9]|LPT[1-9])$").unwrap());

// Leave room for extensions and numbering suffixes.
const MAX_LEN: usize = 200;

/// Makes a note filename safe across platforms.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = INVALID_CHARS.replace_all(name, "_");
    // Leading/trailing spaces and dots are problematic on Windows.
    let cleaned = cleaned.trim_matches(|c| c == ' ' || c == '.');

    if RESERVED_NAMES.is_match(cleaned) {
        return format!("_{cleaned}");
    }

    let cleaned: String = cleaned.chars().take(MAX_LEN).collect();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}
