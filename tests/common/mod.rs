//! Common test utilities

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use tempfile::TempDir;

/// Shared record of what callbacks saw, in firing order
pub type Log = Rc<RefCell<Vec<String>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Create a temporary directory with a clasp.yml manifest
pub fn create_manifest(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("clasp.yml");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

/// Create a manifest and an empty subdirectory below it
pub fn create_manifest_with_subdir(content: &str) -> (TempDir, PathBuf, PathBuf) {
    let (temp_dir, path) = create_manifest(content);
    let sub_dir = temp_dir.path().join("subdir");
    fs::create_dir(&sub_dir).unwrap();
    (temp_dir, path, sub_dir)
}
