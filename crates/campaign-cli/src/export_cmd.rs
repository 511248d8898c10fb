use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use campaign_core::export::{ExportOptions, StyleMode, build_export};

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub compile_styles: bool,
    pub compact: bool,
    pub output: Option<PathBuf>,
    pub description: String,
    pub public: bool,
}

/// Export the campaign in `dir` as template editor JSON.
///
/// Per-file problems are reported on stderr and never fail the command.
pub fn run_export(dir: &Path, args: &ExportArgs) -> Result<()> {
    let options = ExportOptions {
        description: args.description.clone(),
        public: args.public,
        style: if args.compile_styles {
            StyleMode::Compile
        } else {
            StyleMode::Plain
        },
    };
    let report = build_export(dir, &options);

    let json = if args.compact {
        serde_json::to_string(&report.payload)
    } else {
        serde_json::to_string_pretty(&report.payload)
    }
    .context("failed to serialize export")?;

    let mut writer: Box<dyn Write> = if let Some(path) = &args.output {
        Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("cannot create output file: {}", path.display()))?,
        )
    } else {
        Box::new(std::io::stdout().lock())
    };
    writeln!(writer, "{json}")?;
    writer.flush()?;

    if let Some(path) = &args.output {
        println!(
            "Exported {} files to {} ({} warnings)",
            report.payload.files.len(),
            path.display(),
            report.warnings.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_test_utils::CampaignFixture;

    #[test]
    fn writes_payload_to_output_file() {
        let fixture = CampaignFixture::sample();
        let out = tempfile::TempDir::new().unwrap();
        let path = out.path().join("export.json");

        let args = ExportArgs {
            compile_styles: false,
            compact: true,
            output: Some(path.clone()),
            description: "Newsletter popup".to_string(),
            public: true,
        };
        run_export(fixture.path(), &args).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1, "compact output is one line");
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["description"], "Newsletter popup");
        assert_eq!(value["public"], true);
        assert_eq!(value["files"].as_object().unwrap().len(), 4);
    }

    #[test]
    fn unwritable_output_is_an_error() {
        let fixture = CampaignFixture::sample();
        let args = ExportArgs {
            compile_styles: false,
            compact: false,
            output: Some(fixture.path().join("missing-dir").join("out.json")),
            description: "x".to_string(),
            public: false,
        };
        let err = run_export(fixture.path(), &args).unwrap_err();
        assert!(err.to_string().contains("cannot create output file"));
    }
}
