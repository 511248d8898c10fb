//! Integration tests for the campaign directory: extraction, export and
//! stylesheet loading against real files.

use serde_json::json;

use campaign_core::export::{ExportOptions, StyleMode, build_export};
use campaign_core::extract::extract_from_path;
use campaign_test_utils::CampaignFixture;

#[test]
fn sample_defaults_come_from_the_campaign_class() {
    let fixture = CampaignFixture::sample();
    let extraction = extract_from_path(&fixture.project().server_config_path()).unwrap();

    assert_eq!(extraction.data.get("formHeader"), Some(&json!("Hello")));
    assert_eq!(
        extraction.data.get("interactionName"),
        Some(&json!("Newsletter Signup from PopUp"))
    );
    assert_eq!(
        extraction.data.get("formSubheader"),
        Some(&json!("& Erhalte einen Rabattcode"))
    );
    // StyleField declares types only; run() is a method, not a property.
    assert_eq!(extraction.data.len(), 3);
    assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
}

#[test]
fn mock_data_overrides_extracted_defaults() {
    let fixture = CampaignFixture::sample();
    fixture.write_mock_data(&json!({"formHeader": "Mocked"}));

    let data = fixture.project().load_data();
    assert_eq!(data.get("formHeader"), Some(&json!("Mocked")));
    assert!(data.get("interactionName").is_none());
}

#[test]
fn export_includes_all_four_files() {
    let fixture = CampaignFixture::sample();
    let report = build_export(fixture.path(), &ExportOptions::default());

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    let value = serde_json::to_value(&report.payload).unwrap();
    assert_eq!(value["description"], "Imported template");
    assert_eq!(value["public"], false);
    assert_eq!(value["files"]["template.hbs"]["content"], "<h1>{{formHeader}}</h1>");
    assert_eq!(value["files"]["template.css"]["content"], "h1 { color: #333; }");
    assert!(
        value["files"]["template.ts"]["content"]
            .as_str()
            .unwrap()
            .contains("MyCampaignTemplate")
    );
}

#[test]
fn export_skips_removed_script() {
    let fixture = CampaignFixture::sample();
    fixture.remove("client-side.js");

    let report = build_export(fixture.path(), &ExportOptions::default());
    assert_eq!(
        report.payload.files.keys(),
        vec!["template.hbs", "template.css", "template.ts"]
    );
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("client-side.js"));
}

#[test]
fn broken_scss_exports_an_error_comment() {
    let fixture = CampaignFixture::sample();
    fixture.write_scss(".popup { color: $nope; }");

    let options = ExportOptions {
        style: StyleMode::Compile,
        ..ExportOptions::default()
    };
    let report = build_export(fixture.path(), &options);

    let css = &report.payload.files.get("template.css").unwrap().content;
    assert!(css.starts_with("/* Stylesheet Compilation Error:"), "got: {css}");
    assert_eq!(report.payload.files.len(), 4);
    assert_eq!(report.warnings.len(), 1);

    // The dev page sees the same comment.
    assert!(
        fixture
            .project()
            .load_stylesheet()
            .starts_with("/* Stylesheet Compilation Error:")
    );
}
