// Reproducibility tests for the command-line driver.
//
// Generating from the same controller twice must give byte-identical files,
// and the build-info hash must not depend on how the input JSON is formatted.

use std::path::{Path, PathBuf};
use std::process::Command;

fn ctrlgen_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ctrlgen"))
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("ctrlgen-repro-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn run_ctrlgen(args: &[&str]) -> String {
    let output = Command::new(ctrlgen_binary())
        .args(args)
        .output()
        .expect("failed to run ctrlgen");
    assert!(
        output.status.success(),
        "ctrlgen failed with args {:?}\nstderr: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("non-UTF8 output")
}

/// Generating the same controller twice produces byte-identical C#.
#[test]
fn same_input_identical_cs() {
    let input = fixture("locomotion.json");
    let input = input.to_str().unwrap();

    let first = run_ctrlgen(&[input]);
    let second = run_ctrlgen(&[input]);

    assert_eq!(first, second, "C# output should be byte-identical across runs");
    assert!(first.contains("public static class LocomotionGenerator"));
}

/// Writing to an output directory places the file under Code/ and matches stdout.
#[test]
fn output_dir_matches_stdout() {
    let input = fixture("locomotion.json");
    let input = input.to_str().unwrap();
    let out = scratch_dir("outdir");

    let stdout = run_ctrlgen(&[input]);
    run_ctrlgen(&[input, "-o", out.to_str().unwrap()]);
    let written = std::fs::read_to_string(out.join("Code").join("Locomotion.cs")).unwrap();
    assert_eq!(stdout, written);
    let _ = std::fs::remove_dir_all(&out);
}

/// Reformatting the input JSON leaves the provenance hash unchanged.
#[test]
fn reformatted_input_same_build_info() {
    let input = fixture("locomotion.json");
    let text = std::fs::read_to_string(&input).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    let dir = scratch_dir("reformat");
    std::fs::create_dir_all(&dir).unwrap();
    let compact = dir.join("compact.json");
    std::fs::write(&compact, serde_json::to_string(&value).unwrap()).unwrap();

    let a = run_ctrlgen(&["--emit", "build-info", input.to_str().unwrap()]);
    let b = run_ctrlgen(&["--emit", "build-info", compact.to_str().unwrap()]);
    assert_eq!(a, b);

    let info: serde_json::Value = serde_json::from_str(&a).unwrap();
    assert_eq!(info["generator_version"], env!("CARGO_PKG_VERSION"));
    let _ = std::fs::remove_dir_all(&dir);
}

/// Names dump lists every identifier once.
#[test]
fn names_dump_is_unique() {
    let input = fixture("locomotion.json");
    let out = run_ctrlgen(&["--emit", "names", input.to_str().unwrap()]);
    let names: Vec<serde_json::Value> = serde_json::from_str(&out).unwrap();
    let mut idents: Vec<&str> = names.iter().map(|n| n["ident"].as_str().unwrap()).collect();
    let total = idents.len();
    idents.sort_unstable();
    idents.dedup();
    assert_eq!(idents.len(), total);
    assert!(idents.contains(&"StateMachineAirborne"));
    assert!(idents.contains(&"ClipproxyFall"));
}

/// Bad input exits with status 2 and a path-qualified message.
#[test]
fn malformed_input_exits_two() {
    let dir = scratch_dir("malformed");
    std::fs::create_dir_all(&dir).unwrap();
    let bad = dir.join("bad.json");
    std::fs::write(&bad, "{ \"layers\": 3 }").unwrap();

    let output = Command::new(ctrlgen_binary())
        .arg(&bad)
        .output()
        .expect("failed to run ctrlgen");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid controller JSON"), "stderr: {stderr}");
    let _ = std::fs::remove_dir_all(&dir);
}
