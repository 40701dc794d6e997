// End-to-end tests for the parcel-recon binary.
// Run with: cargo test -p parcel-recon-cli --test cli_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn parcel_recon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_parcel-recon"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn fixture_config() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../recon/tests/fixtures/pipeline.toml")
}

fn run_into(out: &Path, extra: &[&str]) -> Output {
    parcel_recon()
        .arg("run")
        .arg(fixture_config())
        .arg("--output")
        .arg(out)
        .args(extra)
        .output()
        .expect("parcel-recon run")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ===========================================================================
// run
// ===========================================================================

#[test]
fn run_writes_all_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_into(dir.path(), &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    for file in ["sales.csv", "properties.csv", "listings.csv", "manual_review.csv", "report.json"] {
        assert!(dir.path().join(file).exists(), "{file} not written");
    }

    let sales = std::fs::read_to_string(dir.path().join("sales.csv")).unwrap();
    let mut lines = sales.lines();
    assert!(lines.next().unwrap().starts_with("application_number,source,registration_date"));
    assert_eq!(lines.count(), 8);

    let review = std::fs::read_to_string(dir.path().join("manual_review.csv")).unwrap();
    assert_eq!(review.lines().count(), 5);
    assert!(review.contains("ghost_assessment,A800"));

    let properties = std::fs::read_to_string(dir.path().join("properties.csv")).unwrap();
    assert!(properties.contains("012345678,30000.00,R1,house"));
    let listings = std::fs::read_to_string(dir.path().join("listings.csv")).unwrap();
    assert_eq!(listings.lines().count(), 6);
    assert!(listings.contains("SK-L4,"));
    assert!(listings.contains("ADDRESS ASSN# COUNTRY"));
    assert!(stderr(&output).contains("listings: 5 checked, 3 flagged"));
}

#[test]
fn run_report_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_into(dir.path(), &[]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let text = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let report: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(report["meta"]["config_name"], "Fixture sales");
    assert_eq!(report["summary"]["duplicates_removed"], 3);
    assert_eq!(report["report"]["dedup"]["examined"], 4);
    assert_eq!(report["report"]["register"]["carried_from_previous"], 1);
}

#[test]
fn json_flag_prints_single_document() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_into(dir.path(), &["--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{stdout}"));
    assert_eq!(value["summary"]["manual_review"], 4);
    assert!(value.get("sales").is_none());
}

#[test]
fn strict_fails_when_review_is_pending() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_into(dir.path(), &["--strict"]);
    assert_eq!(output.status.code(), Some(62));
    assert!(stderr(&output).contains("4 record(s) need manual review"));
    // outputs are still written for the reviewer
    assert!(dir.path().join("manual_review.csv").exists());
}

#[test]
fn missing_input_is_a_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    std::fs::write(
        &config,
        "name = \"broken\"\n[inputs]\nregistry = \"r.csv\"\nregister = \"v.csv\"\nparcels = \"p.csv\"\n",
    )
    .unwrap();

    let output = parcel_recon()
        .arg("run")
        .arg(&config)
        .arg("--output")
        .arg(dir.path().join("out"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(61));
    assert!(stderr(&output).contains("r.csv"));
}

#[test]
fn run_without_inputs_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    std::fs::write(&config, "name = \"bare\"\n").unwrap();

    let output = parcel_recon().arg("run").arg(&config).output().unwrap();
    assert_eq!(output.status.code(), Some(60));
    assert!(stderr(&output).contains("[inputs]"));
}

// ===========================================================================
// validate
// ===========================================================================

#[test]
fn validate_accepts_fixture_config() {
    let output = parcel_recon()
        .arg("validate")
        .arg(fixture_config())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("valid: pipeline 'Fixture sales'"));
}

#[test]
fn validate_rejects_bad_multiple() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pipeline.toml");
    std::fs::write(&config, "name = \"x\"\n[sanity]\nrent_multiple = 0.0\n").unwrap();

    let output = parcel_recon().arg("validate").arg(&config).output().unwrap();
    assert_eq!(output.status.code(), Some(60));
    assert!(stderr(&output).contains("rent_multiple"));
}

// ===========================================================================
// version
// ===========================================================================

#[test]
fn long_version_names_the_commit() {
    let output = parcel_recon().arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(concat!("parcel-recon ", env!("CARGO_PKG_VERSION"), " (commit ")));
    assert_eq!(stdout.lines().count(), 1);
}
