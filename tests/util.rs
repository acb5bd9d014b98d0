//! Shared test utilities for integration tests
//!
//! Provides the dataset fixture and a preconfigured command
//! used across multiple test files.

#![allow(dead_code)]

use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;

/// Temp directory holding the two CSV datasets under the file
/// names the default configuration looks for.
pub fn make_civic_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    let fixtures = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

    tmp.child("train_topic_data.csv")
        .write_file(&fixtures.join("train_topic_data.csv"))
        .expect("copy topics");
    tmp.child("hf_combined.csv")
        .write_file(&fixtures.join("hf_combined.csv"))
        .expect("copy corpus");

    tmp
}

/// `civic` binary running inside `dir` with colors and env
/// overrides stripped
pub fn civic(dir: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("civic").expect("bin");
    cmd.current_dir(dir.path())
        .arg("--no-color")
        .env_remove("RUST_LOG");

    for (key, _) in std::env::vars()
    {
        if key.starts_with("CIVIC__")
        {
            cmd.env_remove(key);
        }
    }

    cmd
}
