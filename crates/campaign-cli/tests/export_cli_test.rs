//! Integration tests for the `campaign` binary.
//!
//! Each test runs the built binary against a temporary campaign directory
//! and checks stdout, stderr and the exit status.

use std::process::{Command, Output};

use serde_json::Value;

use campaign_test_utils::CampaignFixture;

// -----------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------

fn campaign(fixture: &CampaignFixture, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_campaign"))
        .args(args)
        .arg("--dir")
        .arg(fixture.path())
        .env_remove("CAMPAIGN_DIR")
        .env("XDG_CONFIG_HOME", fixture.path())
        .env("RUST_LOG", "warn")
        .current_dir(fixture.path())
        .output()
        .expect("failed to run campaign binary")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

// -----------------------------------------------------------------------
// export
// -----------------------------------------------------------------------

#[test]
fn export_prints_all_files() {
    let fixture = CampaignFixture::sample();
    let output = campaign(&fixture, &["export"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    let keys: Vec<&str> = json["files"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 4);
    for key in ["template.hbs", "template.css", "template.js", "template.ts"] {
        assert!(keys.contains(&key), "missing {key}");
    }
    assert_eq!(json["description"], "Imported template");
}

#[test]
fn export_with_missing_file_is_still_valid_json() {
    let fixture = CampaignFixture::sample();
    fixture.remove("styles.css");
    let output = campaign(&fixture, &["export", "--compact"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert!(json["files"].get("template.css").is_none());
    assert_eq!(json["files"].as_object().unwrap().len(), 3);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("file not found"), "stderr: {stderr}");
}

#[test]
fn export_with_broken_scss_succeeds_with_error_comment() {
    let fixture = CampaignFixture::sample();
    fixture.write_scss(".popup { &:hover { color: $missing; } }");
    let output = campaign(&fixture, &["export", "--compile-styles", "--public"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    let css = json["files"]["template.css"]["content"].as_str().unwrap();
    assert!(css.starts_with("/*"), "got: {css}");
    assert!(css.contains("Error"), "got: {css}");
    assert_eq!(json["public"], true);
    assert!(json["files"]["template.hbs"].is_object());
}

// -----------------------------------------------------------------------
// extract / render
// -----------------------------------------------------------------------

#[test]
fn extract_json_prints_defaults() {
    let fixture = CampaignFixture::sample();
    let output = campaign(&fixture, &["extract", "--json"]);

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["formHeader"], "Hello");
    assert_eq!(json["interactionName"], "Newsletter Signup from PopUp");
}

#[test]
fn render_prints_body_markup() {
    let fixture = CampaignFixture::sample();
    fixture.write_behavior("[apply]\ncontainer = { class = \"preview\" }\n");
    let output = campaign(&fixture, &["render"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), r#"<div class="preview"><h1>Hello</h1></div>"#);
}

#[test]
fn render_with_unknown_client_fails() {
    let fixture = CampaignFixture::sample();
    let output = campaign(&fixture, &["render", "--client", "react"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown client behavior"), "stderr: {stderr}");
}
