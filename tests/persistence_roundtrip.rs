use marginalia::{
    FileStorage, HighlightDraft, HighlightPatch, HighlightStore, STORAGE_KEY, palette,
};
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn draft(text: &str) -> HighlightDraft {
    HighlightDraft {
        range_ref: format!("epubcfi(/6/4!/{text})"),
        text: text.to_string(),
        color: palette::YELLOW.to_string(),
        note: None,
    }
}

#[test]
fn edits_survive_a_restart_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");

    let storage = Arc::new(FileStorage::new(&path));
    let mut store = HighlightStore::new(storage);
    store.load();

    let kept = store.add_highlight("moby-dick.epub", draft("Call me Ishmael."));
    let dropped = store.add_highlight("moby-dick.epub", draft("November in my soul"));
    store.add_highlight("walden.epub", draft("quiet desperation"));
    store.update_highlight(
        "moby-dick.epub",
        &kept.id,
        HighlightPatch::note("opening line"),
    );
    store.delete_highlight("moby-dick.epub", &dropped.id);
    store.flush();
    let expected = store.all_highlights();
    drop(store);

    let mut reloaded = HighlightStore::new(Arc::new(FileStorage::new(&path)));
    reloaded.load();

    assert_eq!(reloaded.all_highlights(), expected);
    let moby = reloaded.highlights_for_document("moby-dick.epub");
    assert_eq!(moby.len(), 1);
    assert_eq!(moby[0].id, kept.id);
    assert_eq!(moby[0].note.as_deref(), Some("opening line"));
    assert_eq!(reloaded.highlights_for_document("walden.epub").len(), 1);
}

#[test]
fn persisted_file_matches_the_envelope_contract() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");

    let mut store = HighlightStore::new(Arc::new(FileStorage::new(&path)));
    store.load();
    store.add_highlight("book.epub", draft("Hello"));
    store.flush();
    drop(store);

    let blob: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let entry = &blob[STORAGE_KEY];
    assert_eq!(entry["version"], json!(1));
    let record = &entry["highlights"]["book.epub"][0];
    for key in ["id", "rangeRef", "text", "color", "createdAt", "updatedAt"] {
        assert!(record.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn foreign_schema_version_on_disk_is_discarded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    fs::write(
        &path,
        serde_json::to_string_pretty(&json!({
            "someOtherPluginKey": true,
            STORAGE_KEY: {
                "version": 0,
                "highlights": {"book.epub": [{"id": "x"}]}
            }
        }))
        .unwrap(),
    )
    .unwrap();

    let storage = Arc::new(FileStorage::new(&path));
    let mut store = HighlightStore::new(storage);
    store.load();
    assert!(store.all_highlights().is_empty());

    // Writing fresh data replaces the stale envelope but keeps the
    // sibling key.
    store.add_highlight("book.epub", draft("fresh"));
    store.flush();

    let blob: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(blob["someOtherPluginKey"], json!(true));
    assert_eq!(blob[STORAGE_KEY]["version"], json!(1));
}

#[test]
fn corrupt_file_falls_back_to_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.json");
    fs::write(&path, "{definitely not json").unwrap();

    let mut store = HighlightStore::new(Arc::new(FileStorage::new(&path)));
    store.load();
    assert!(store.all_highlights().is_empty());
}
