use super::*;
use tempfile::TempDir;

fn record(chunk_id: &str) -> MetadataRecord {
    MetadataRecord {
        title: "Shadowheart".to_string(),
        url: "https://wiki.example.com/shadowheart".to_string(),
        tags: vec!["cleric".to_string()],
        chunk_id: chunk_id.to_string(),
    }
}

#[test]
fn push_assigns_sequential_positions() {
    let mut store = MetadataStore::new();
    assert_eq!(store.push(record("a_chunk_0")), 0);
    assert_eq!(store.push(record("a_chunk_1")), 1);
    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get(1).expect("position 1 exists").chunk_id,
        "a_chunk_1"
    );
}

#[test]
fn get_past_end_is_out_of_range() {
    let store = MetadataStore::from_records(vec![record("a"), record("b"), record("c")]);

    let error = store.get(5).expect_err("position 5 should be out of range");
    assert!(matches!(
        error,
        RagError::OutOfRange {
            position: 5,
            len: 3
        }
    ));
}

#[test]
fn record_from_chunk_drops_content() {
    let chunk = Chunk {
        title: "Wyll".to_string(),
        url: "https://wiki.example.com/wyll".to_string(),
        tags: vec!["warlock".to_string()],
        content: "Blade of Frontiers".to_string(),
        chunk_id: "wyll_chunk_0".to_string(),
    };

    let record = MetadataRecord::from(&chunk);
    assert_eq!(record.chunk_id, "wyll_chunk_0");
    assert_eq!(record.tags, vec!["warlock".to_string()]);

    let json = serde_json::to_string(&record).expect("record should serialize");
    assert!(!json.contains("content"));
}

#[test]
fn persist_then_load_keeps_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("metadata.json");

    let mut store = MetadataStore::new();
    store.extend(["z_chunk_0", "a_chunk_0", "m_chunk_0"].map(record));
    store.persist(&path).expect("should persist");

    let loaded = MetadataStore::load(&path).expect("should load");
    assert_eq!(loaded, store);
    assert!(!temp_dir.path().join("metadata.json.tmp").exists());
}

#[test]
fn load_missing_or_corrupt_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let missing = MetadataStore::load(&temp_dir.path().join("missing.json"));
    assert!(matches!(missing, Err(RagError::NotFound(_))));

    let corrupt_path = temp_dir.path().join("metadata.json");
    fs::write(&corrupt_path, "{not an array").expect("should write");
    let corrupt = MetadataStore::load(&corrupt_path);
    assert!(matches!(corrupt, Err(RagError::NotFound(_))));
}
