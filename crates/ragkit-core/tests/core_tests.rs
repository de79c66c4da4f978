use std::fs;
use std::io::Write;
use tempfile::TempDir;

use ragkit_core::loader::DocumentLoader;
use ragkit_core::types::{MetadataValue, SOURCE_KEY};

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let loader = DocumentLoader::new();
    let docs = loader.load_directory(dir).expect("load");

    assert_eq!(docs.len(), 1, "one file becomes one document");
    assert_eq!(docs[0].content.trim(), "Short text");
    let source = docs[0].metadata.get(SOURCE_KEY).and_then(MetadataValue::as_str).expect("source");
    assert!(source.ends_with("a.txt"));
    assert_eq!(docs[0].metadata["category"], MetadataValue::Text("misc".into()));
}

#[test]
fn load_directory_limited_two_files_limit_one() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.txt"), "alpha bravo").unwrap();
    fs::write(dir.join("b.txt"), "charlie delta").unwrap();

    let docs = DocumentLoader::with_limit(1).load_directory(dir).expect("load limited");
    assert_eq!(docs.len(), 1, "limited to one source document");
    assert_eq!(docs[0].content, "alpha bravo");
}

#[test]
fn load_directory_records_category_and_skips_blank_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("fire/craft")).unwrap();
    fs::write(dir.join("fire/craft/bow.txt"), "Bow drill basics.").unwrap();
    fs::write(dir.join("empty.txt"), "   \n").unwrap();
    fs::write(dir.join("notes.md"), "ignored").unwrap();

    let docs = DocumentLoader::new().load_directory(dir).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].metadata["category"], MetadataValue::Text("fire/craft".into()));
}
