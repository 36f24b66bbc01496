use super::*;
use tempfile::TempDir;

#[test]
fn persist_then_load() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("manifest.json");

    let manifest = BuildManifest::new("all-minilm:latest", 384, 12, 12);
    manifest.persist(&path).expect("should persist manifest");

    let loaded = BuildManifest::load(&path).expect("should load manifest");
    assert_eq!(loaded, manifest);
    assert_eq!(loaded.format_version, MANIFEST_FORMAT_VERSION);
}

#[test]
fn unknown_format_version_is_config_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("manifest.json");
    fs::write(
        &path,
        r#"{"format_version": 99, "model": "future", "dimension": 3}"#,
    )
    .expect("should write manifest");

    let result = BuildManifest::load(&path);
    assert!(matches!(result, Err(RagError::Config(_))));
}

#[test]
fn missing_or_corrupt_manifest_is_not_found() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("manifest.json");
    assert!(matches!(
        BuildManifest::load(&path),
        Err(RagError::NotFound(_))
    ));

    fs::write(&path, "[]").expect("should write manifest");
    assert!(matches!(
        BuildManifest::load(&path),
        Err(RagError::NotFound(_))
    ));
}
