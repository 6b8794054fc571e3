use canopy_manifest::{ManifestError, discover, load_extension_dir};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_manifest(root: &Path, dir: &str, body: &str) {
    let d = root.join(dir);
    fs::create_dir_all(&d).unwrap();
    fs::write(d.join("manifest.json"), body).unwrap();
}

#[test]
fn missing_directory_yields_nothing() {
    let tmp = TempDir::new().unwrap();
    assert!(discover(&tmp.path().join("nope")).is_empty());
}

#[test]
fn discovers_valid_and_reports_broken_individually() {
    let tmp = TempDir::new().unwrap();
    write_manifest(
        tmp.path(),
        "a-goals",
        r#"{"id":"goals","name":"Goals","version":"1.0.0","main":"dist/main.js"}"#,
    );
    write_manifest(tmp.path(), "b-broken", "{ not json");
    write_manifest(
        tmp.path(),
        "c-invalid",
        r#"{"id":"bad","name":"","version":"1.0.0"}"#,
    );
    write_manifest(
        tmp.path(),
        "d-notes",
        r#"{"id":"notes","name":"Notes","version":"0.1.0"}"#,
    );
    fs::create_dir_all(tmp.path().join("e-empty")).unwrap();
    fs::write(tmp.path().join("stray.txt"), "ignored").unwrap();

    let results = discover(tmp.path());
    assert_eq!(results.len(), 4);

    let ok: Vec<String> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|d| d.manifest.id.to_string())
        .collect();
    assert_eq!(ok, vec!["goals".to_string(), "notes".to_string()]);

    assert!(matches!(results[1], Err(ManifestError::Malformed { .. })));
    assert!(matches!(results[2], Err(ManifestError::Invalid(_))));

    let goals = results[0].as_ref().unwrap();
    assert_eq!(goals.entry_path(), tmp.path().join("a-goals").join("dist/main.js"));
}

#[test]
fn load_extension_dir_without_manifest_is_io_error() {
    let tmp = TempDir::new().unwrap();
    let err = load_extension_dir(tmp.path()).unwrap_err();
    assert!(matches!(err, ManifestError::Io { .. }));
}
