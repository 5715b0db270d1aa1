//! Unit tests for the batch file model

use github_data_collector::batch::{
    batch_file_name, list_batch_files, parse_batch_index, BatchFile, BatchMetadata,
};
use serde_json::json;

#[test]
fn test_file_name_sorting_survives_double_digits() {
    let dir = tempfile::TempDir::new().unwrap();
    for index in [10, 2, 1, 11, 3] {
        let path = dir.path().join(batch_file_name(index, "issues"));
        std::fs::write(&path, r#"{"issues": []}"#).unwrap();
    }

    let files = list_batch_files(dir.path(), "issues").unwrap();
    let indices: Vec<usize> = files.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![1, 2, 3, 10, 11]);
}

#[test]
fn test_persisted_shape_matches_contract() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("batch_001_issues.json");

    let batch = BatchFile {
        metadata: Some(BatchMetadata {
            batch_index: Some(1),
            item_count: Some(1),
            collection_type: Some("issues".to_string()),
            repository: Some("octocat/hello-world".to_string()),
            state: None,
        }),
        item_type: "issues".to_string(),
        items: vec![json!({"number": 1, "state": "open"})],
    };
    batch.save(&path).unwrap();

    // The on-disk JSON is an object with a "metadata" wrapper and an item
    // array keyed by the item type name
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw["metadata"]["batch_index"], json!(1));
    assert_eq!(raw["metadata"]["item_count"], json!(1));
    assert_eq!(raw["metadata"]["collection_type"], json!("issues"));
    assert_eq!(raw["metadata"]["repository"], json!("octocat/hello-world"));
    // Absent state is omitted, not serialized as null
    assert!(raw["metadata"].get("state").is_none());
    assert_eq!(raw["issues"][0]["number"], json!(1));
}

#[test]
fn test_load_tolerates_malformed_metadata() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("batch_001_issues.json");
    std::fs::write(
        &path,
        r#"{"metadata": "not-an-object", "issues": [{"number": 9}]}"#,
    )
    .unwrap();

    let loaded = BatchFile::load(&path, "issues").unwrap();
    assert!(loaded.metadata.is_none());
    assert_eq!(loaded.items.len(), 1);
}

#[test]
fn test_load_rejects_non_object_top_level() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("batch_001_issues.json");
    std::fs::write(&path, r#"[1, 2, 3]"#).unwrap();
    assert!(BatchFile::load(&path, "issues").is_err());
}

#[test]
fn test_parse_batch_index_requires_exact_type_match() {
    assert_eq!(parse_batch_index("batch_007_issues.json", "issues"), Some(7));
    assert_eq!(parse_batch_index("batch_007_issues.json", "pulls"), None);
    // A type that is a prefix of another must not match
    assert_eq!(parse_batch_index("batch_007_issues_old.json", "issues"), None);
}
