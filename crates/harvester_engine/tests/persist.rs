use std::fs;

use harvester_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_output_dir() {
    let temp = TempDir::new().unwrap();
    let new_dir = temp.path().join("downloads");
    assert!(!new_dir.exists());
    ensure_output_dir(&new_dir).unwrap();
    assert!(new_dir.is_dir());
}

#[test]
fn atomic_write_replaces_existing_and_is_atomic() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write_bytes("a_OptimAI.xlsx", b"first").unwrap();
    assert_eq!(first.file_name().unwrap(), "a_OptimAI.xlsx");
    assert_eq!(fs::read(&first).unwrap(), b"first");

    let second = writer.write_bytes("a_OptimAI.xlsx", b"second").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read(&second).unwrap(), b"second");
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let writer = AtomicFileWriter::new(file_path.clone());
    let result = writer.write("manifest.json", "{}");
    assert!(result.is_err());
    assert!(!file_path.with_file_name("manifest.json").exists());
}

#[test]
fn nested_keys_create_their_directories() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let path = writer
        .write_bytes("inputs/2025/11/03/a_OptimAI.xlsx", b"alpha")
        .unwrap();

    assert_eq!(path, temp.path().join("inputs/2025/11/03/a_OptimAI.xlsx"));
    assert_eq!(fs::read(path).unwrap(), b"alpha");
}

#[test]
fn escaping_keys_write_nothing() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    let writer = AtomicFileWriter::new(root.clone());

    assert!(writer.write("../outside.txt", "x").is_err());
    assert!(!temp.path().join("outside.txt").exists());
    assert!(!root.exists());
}
