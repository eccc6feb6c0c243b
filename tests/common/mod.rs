#![allow(dead_code)]

use std::path::{Path, PathBuf};
use assert_cmd::Command;
use tempfile::TempDir;
use walkdir::WalkDir;

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shop")
}

/// Fresh copy of the `shop` fixture project, safe to write settings into.
pub fn shop_project() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = fixture_dir();
    for entry in WalkDir::new(&source).into_iter().filter_map(|e| e.ok()) {
        let relative = entry.path().strip_prefix(&source).expect("inside fixture");
        let target = dir.path().join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).expect("create fixture dir");
        } else {
            std::fs::copy(entry.path(), &target).expect("copy fixture file");
        }
    }
    dir
}

/// Write `<project>/.jestrun/settings.json`.
pub fn write_settings(project: &Path, json: &str) {
    let dir = project.join(".jestrun");
    std::fs::create_dir_all(&dir).expect("create settings dir");
    std::fs::write(dir.join("settings.json"), json).expect("write settings");
}

/// The binary, run in `cwd` with an empty home so user settings never leak in.
pub fn jestrun(cwd: &Path, home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("jestrun").expect("jestrun binary");
    cmd.current_dir(cwd).env("HOME", home).env_remove("RUST_LOG");
    cmd
}
