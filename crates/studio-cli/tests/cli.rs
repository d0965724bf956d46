use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

const XML: &str = "<root><item>First</item></root>";

const IDENTITY: &str = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
    <xsl:template match="@*|node()">
        <xsl:copy><xsl:apply-templates select="@*|node()"/></xsl:copy>
    </xsl:template>
</xsl:stylesheet>"#;

/// Command running in an empty directory with environment overrides cleared
fn studio(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stylesheet-studio").unwrap();
    cmd.current_dir(dir);
    for key in [
        "SAXON_ENABLED",
        "SAXON_JAR_PATH",
        "XMLRESOLVER_JAR_PATH",
        "SAXON_TIMEOUT",
        "STUDIO_JAVA",
        "STUDIO_MAX_INPUT_CHARS",
        "STUDIO_MAX_TREE_NODES",
        "STUDIO_ISOLATE_PRIMARY",
        "STUDIO_XRUST_WORKER",
        "STUDIO_PRIMARY_TIMEOUT",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn inputs(xml: &str, xslt: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("in.xml"), xml).unwrap();
    std::fs::write(dir.path().join("style.xslt"), xslt).unwrap();
    dir
}

#[test]
fn transform_help_lists_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    studio(dir.path())
        .args(["transform", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("input too large"));
}

#[test]
fn transform_prints_log_then_output() {
    let dir = inputs(XML, IDENTITY);
    studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Using xrust (XSLT 1.0)."))
        .stdout(predicate::str::contains("[INFO] Transform succeeded."))
        .stdout(predicate::str::contains("First"));
}

#[test]
fn transform_json_matches_result_shape() {
    let dir = inputs(XML, IDENTITY);
    let output = studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt", "--json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["engineUsed"], "primary");
    assert!(value["errorMessage"].is_null());
    assert!(value["logLines"].is_array());
}

#[test]
fn transform_failure_exits_with_two() {
    let dir = inputs("   ", IDENTITY);
    studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("XML content is empty."));
}

#[test]
fn runaway_recursion_is_reported_not_fatal() {
    let runaway = r#"<xsl:stylesheet version="1.0" xmlns:xsl="http://www.w3.org/1999/XSL/Transform">
    <xsl:template match="/"><xsl:call-template name="r"/></xsl:template>
    <xsl:template name="r"><x><xsl:call-template name="r"/></x></xsl:template>
</xsl:stylesheet>"#;
    let dir = inputs(XML, runaway);
    studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("XSLTApplyError: xrust (XSLT 1.0) aborted"));
}

#[test]
fn engines_reports_the_primary_worker() {
    let dir = tempfile::tempdir().unwrap();
    studio(dir.path())
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("Primary engine (xrust): isolated worker"));

    studio(dir.path())
        .env("STUDIO_ISOLATE_PRIMARY", "false")
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("Primary engine (xrust): in process"));
}

#[test]
fn oversized_input_exits_with_three() {
    let dir = inputs(XML, IDENTITY);
    studio(dir.path())
        .env("STUDIO_MAX_INPUT_CHARS", "10")
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt"])
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty());
}

#[test]
fn out_file_receives_output() {
    let dir = inputs(XML, IDENTITY);
    studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt", "--out", "result.html"])
        .assert()
        .success();

    let written = std::fs::read_to_string(dir.path().join("result.html")).unwrap();
    assert!(written.contains("First"));
}

#[test]
fn unknown_version_is_a_usage_error() {
    let dir = inputs(XML, IDENTITY);
    studio(dir.path())
        .args(["transform", "--xml", "in.xml", "--xslt", "style.xslt", "--xslt-version", "4.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("4.0"));
}

#[test]
fn engines_reports_missing_jars_with_download_urls() {
    let dir = tempfile::tempdir().unwrap();
    studio(dir.path())
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saxon-HE 12.0: missing"))
        .stdout(predicate::str::contains("repo1.maven.org"));
}

#[test]
fn engines_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("stylesheet-studio.toml"),
        "[secondary]\nenabled = false\ntimeout_secs = 5\n",
    )
    .unwrap();

    studio(dir.path())
        .arg("engines")
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"))
        .stdout(predicate::str::contains("5s"));
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    studio(dir.path())
        .args(["transform", "--xml", "nope.xml", "--xslt", "nope.xslt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read nope.xml"));
}
