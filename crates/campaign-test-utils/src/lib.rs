//! Shared test utilities for campaign integration tests.
//!
//! - [`CampaignFixture`]: a temporary campaign directory with helpers to
//!   write each campaign file.
//! - [`RecordingLoader`] / [`RecordingTemplate`]: a client behavior that
//!   renders into `body` and records every lifecycle call in a shared
//!   [`CallLog`], so tests can assert ordering across reloads.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use campaign_core::data::CampaignData;
use campaign_core::project::{
    CLIENT_BEHAVIOR_FILE, CLIENT_SCRIPT_FILE, CSS_FILE, CampaignProject, MOCK_DATA_FILE,
    SCSS_FILE, SERVER_CONFIG_FILE, TEMPLATE_FILE,
};
use campaign_core::render::CompiledTemplate;
use campaign_core::sdk::SalesforceInteractions;
use campaign_core::template::{ClientError, ClientLoader, TemplateDefinition};

/// Server-side config used by most fixtures.
pub const SAMPLE_SERVER_SIDE: &str = r#"export class StyleField {
    label: string;
    className: string;
}

export class MyCampaignTemplate implements CampaignTemplateComponent {

    @title("Event interaction name")
    interactionName: string = "Newsletter Signup from PopUp"

    formHeader: string = "Hello"

    @richText(true)
    formSubheader: string = "& Erhalte einen Rabattcode"

    run(context: CampaignComponentContext) {
        return {};
    }
}
"#;

/// A temporary campaign directory. Removed on drop.
pub struct CampaignFixture {
    dir: TempDir,
}

impl CampaignFixture {
    /// Create an empty campaign directory.
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    /// Campaign directory with a template, stylesheet, both scripts and the
    /// sample server-side config.
    pub fn sample() -> Self {
        let fixture = Self::empty();
        fixture.write(TEMPLATE_FILE, "<h1>{{formHeader}}</h1>");
        fixture.write(CSS_FILE, "h1 { color: #333; }");
        fixture.write(CLIENT_SCRIPT_FILE, "(function () { registerTemplate({}); })();");
        fixture.write(SERVER_CONFIG_FILE, SAMPLE_SERVER_SIDE);
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn project(&self) -> CampaignProject {
        CampaignProject::new(self.dir.path())
    }

    /// Write `content` to `name` inside the campaign directory.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content)
            .unwrap_or_else(|e| panic!("failed to write {}: {e}", path.display()));
        path
    }

    pub fn remove(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("failed to remove {}: {e}", path.display()));
    }

    pub fn write_template(&self, content: &str) -> PathBuf {
        self.write(TEMPLATE_FILE, content)
    }

    pub fn write_scss(&self, content: &str) -> PathBuf {
        self.write(SCSS_FILE, content)
    }

    pub fn write_behavior(&self, content: &str) -> PathBuf {
        self.write(CLIENT_BEHAVIOR_FILE, content)
    }

    pub fn write_mock_data(&self, data: &serde_json::Value) -> PathBuf {
        self.write(MOCK_DATA_FILE, &data.to_string())
    }
}

/// Build campaign data from `(field, value)` pairs.
pub fn data(pairs: &[(&str, serde_json::Value)]) -> CampaignData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Recording client behavior
// ---------------------------------------------------------------------------

/// Shared, ordered log of lifecycle calls such as `"apply#1"`.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: String) {
        self.0.lock().expect("call log poisoned").push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("call log poisoned").clone()
    }
}

/// Renders into a `div.recorded` under `body` and logs each call, tagged
/// with the load generation that produced the definition.
pub struct RecordingTemplate {
    generation: usize,
    name: String,
    log: CallLog,
}

impl TemplateDefinition for RecordingTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &mut self,
        sdk: &SalesforceInteractions,
        data: &CampaignData,
        template: &CompiledTemplate,
    ) -> Result<(), ClientError> {
        self.log.push(format!("apply#{}", self.generation));
        let html = template.render(data)?;
        sdk.cash_dom("body")
            .append(&format!("<div class=\"recorded\">{html}</div>"));
        Ok(())
    }

    fn reset(&mut self, sdk: &SalesforceInteractions, data: &CampaignData) -> Result<(), ClientError> {
        let header = data
            .get("formHeader")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        self.log.push(format!("reset#{}:{header}", self.generation));
        sdk.cash_dom(".recorded").remove();
        Ok(())
    }
}

/// Loader producing a new [`RecordingTemplate`] generation per load.
#[derive(Debug, Clone, Default)]
pub struct RecordingLoader {
    log: CallLog,
    loads: Arc<AtomicUsize>,
}

impl RecordingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClientLoader for RecordingLoader {
    fn name(&self) -> &str {
        "recording"
    }

    async fn load(&self) -> Result<Box<dyn TemplateDefinition>> {
        let generation = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(RecordingTemplate {
            generation,
            name: format!("recording#{generation}"),
            log: self.log.clone(),
        }))
    }
}
