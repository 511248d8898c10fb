use anyhow::{Context, Result};

use campaign_core::CampaignProject;
use campaign_core::extract::extract_from_path;

/// Print the data extracted from `server-side.ts`, either as the generated
/// data module or as bare JSON.
pub fn run_extract(project: &CampaignProject, json: bool) -> Result<()> {
    println!("{}", render_extract(project, json)?);
    Ok(())
}

fn render_extract(project: &CampaignProject, json: bool) -> Result<String> {
    let path = project.server_config_path();
    let extraction = extract_from_path(&path)
        .with_context(|| format!("failed to extract campaign data from {}", path.display()))?;

    for skipped in &extraction.skipped {
        eprintln!(
            "skipped {} ({}): {}",
            skipped.field, skipped.kind, skipped.source
        );
    }

    if json {
        serde_json::to_string_pretty(&extraction.data).context("failed to serialize campaign data")
    } else {
        Ok(extraction.data.to_module_source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_test_utils::CampaignFixture;

    #[test]
    fn json_output_contains_defaults() {
        let fixture = CampaignFixture::sample();
        let out = render_extract(&fixture.project(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["formHeader"], "Hello");
    }

    #[test]
    fn module_output_exports_campaign_data() {
        let fixture = CampaignFixture::sample();
        let out = render_extract(&fixture.project(), false).unwrap();
        assert!(out.starts_with("export const campaignData = "), "got: {out}");
        assert!(out.contains("\"formHeader\""));
    }

    #[test]
    fn missing_config_is_an_error() {
        let fixture = CampaignFixture::empty();
        let err = render_extract(&fixture.project(), true).unwrap_err();
        assert!(format!("{err:#}").contains("server-side.ts"));
    }
}
