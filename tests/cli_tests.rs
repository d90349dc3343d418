//! End-to-end tests for the `pysense` binary.
//!
//! Each test writes a module to a temporary directory, runs one subcommand
//! and asserts on stdout/stderr and the exit code.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const MODULE: &str = r#"
class Base:
    pass

class Child(Base):
    pass

ITEMS = (1, 2, 3)
GREETING = 'hi'
COUNT = 2 + 3

class Bag:
    def __len__(self):
        return 7

BAG = Bag()
"#;

fn module_file(dir: &TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("app.py");
    fs::write(&path, text).unwrap();
    path
}

fn pysense() -> Command {
    let mut cmd = Command::cargo_bin("pysense").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// infer / type-of
// ============================================================================

#[test]
fn test_infer_prints_values() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("infer")
        .arg(&file)
        .arg("COUNT")
        .assert()
        .success()
        .stdout(predicate::str::contains("5"));
}

#[test]
fn test_infer_unknown_name_reports_error_value() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("infer")
        .arg(&file)
        .arg("MISSING")
        .assert()
        .success()
        .stdout(predicate::str::contains("MISSING"));
}

#[test]
fn test_type_of_instance() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("type-of")
        .arg(&file)
        .arg("BAG")
        .assert()
        .success()
        .stdout(predicate::str::contains("<class 'Bag'>"));
}

#[test]
fn test_type_of_string() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("type-of")
        .arg(&file)
        .arg("GREETING")
        .assert()
        .success()
        .stdout(predicate::str::contains("<class 'str'>"));
}

// ============================================================================
// len
// ============================================================================

#[test]
fn test_len_of_tuple_and_dunder_len() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("len")
        .arg(&file)
        .arg("ITEMS")
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
    pysense()
        .arg("len")
        .arg(&file)
        .arg("BAG")
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));
}

#[test]
fn test_len_of_int_fails() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("len")
        .arg(&file)
        .arg("COUNT")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("len(COUNT) failed"));
}

// ============================================================================
// subtype
// ============================================================================

#[test]
fn test_subtype_answers() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("subtype")
        .arg(&file)
        .args(["Child", "Base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
    pysense()
        .arg("subtype")
        .arg(&file)
        .args(["Base", "Child"])
        .assert()
        .success()
        .stdout(predicate::str::contains("false"));
}

#[test]
fn test_subtype_with_unknown_base_is_undecidable() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, "from elsewhere import Mystery\nclass A(Mystery):\n    pass\nclass B:\n    pass\n");
    pysense()
        .arg("subtype")
        .arg(&file)
        .args(["A", "B"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot decide"));
}

#[test]
fn test_subtype_sees_search_path_modules() {
    let dir = TempDir::new().unwrap();
    let lib = dir.path().join("lib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("shapes.py"), "class Shape:\n    pass\n").unwrap();
    let file = module_file(&dir, "from shapes import Shape\nclass Square(Shape):\n    pass\n");
    pysense()
        .arg("--search-path")
        .arg(&lib)
        .arg("subtype")
        .arg(&file)
        .args(["Square", "Shape"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_file() {
    pysense()
        .args(["infer", "definitely-not-here.py", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such file"));
}

#[test]
fn test_syntax_error() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, "def broken(:\n");
    pysense()
        .arg("infer")
        .arg(&file)
        .arg("broken")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to build"));
}

#[test]
fn test_undefined_name_for_type_of() {
    let dir = TempDir::new().unwrap();
    let file = module_file(&dir, MODULE);
    pysense()
        .arg("type-of")
        .arg(&file)
        .arg("NOPE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("`NOPE` is not defined"));
}
