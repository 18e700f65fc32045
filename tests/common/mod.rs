#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub use scenepipe_test_utils::builders;
pub use scenepipe_test_utils::{init_tracing, with_timeout};

/// Write `files` (relative path, contents) into a fresh temp dir and return
/// it together with the path of the first file.
pub fn definition_tree(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    for (rel, contents) in files {
        write_file(dir.path(), rel, contents);
    }
    let entry = dir.path().join(files[0].0);
    (dir, entry)
}

pub fn write_file(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, contents).expect("write file");
}
