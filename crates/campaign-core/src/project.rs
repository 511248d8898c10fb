//! Campaign directory layout.
//!
//! ```text
//! campaign/
//!   template.hbs       markup template
//!   styles.css         plain stylesheet
//!   styles.scss        preprocessor source (preferred when present)
//!   client-side.js     client script, exported verbatim
//!   client-side.toml   declarative client behavior for the dev harness
//!   server-side.ts     config class; literal defaults are extracted
//!   mock-data.json     optional literal mock data, replaces extraction
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::data::CampaignData;
use crate::export::{compile_error_comment, compile_scss};
use crate::extract::extract_from_path;

pub const TEMPLATE_FILE: &str = "template.hbs";
pub const CSS_FILE: &str = "styles.css";
pub const SCSS_FILE: &str = "styles.scss";
pub const CLIENT_SCRIPT_FILE: &str = "client-side.js";
pub const CLIENT_BEHAVIOR_FILE: &str = "client-side.toml";
pub const SERVER_CONFIG_FILE: &str = "server-side.ts";
pub const MOCK_DATA_FILE: &str = "mock-data.json";

/// Which campaign file a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Template,
    Styles,
    ClientScript,
    ClientBehavior,
    ServerConfig,
    MockData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignProject {
    dir: PathBuf,
}

impl CampaignProject {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn template_path(&self) -> PathBuf {
        self.dir.join(TEMPLATE_FILE)
    }

    pub fn css_path(&self) -> PathBuf {
        self.dir.join(CSS_FILE)
    }

    pub fn scss_path(&self) -> PathBuf {
        self.dir.join(SCSS_FILE)
    }

    pub fn client_script_path(&self) -> PathBuf {
        self.dir.join(CLIENT_SCRIPT_FILE)
    }

    pub fn client_behavior_path(&self) -> PathBuf {
        self.dir.join(CLIENT_BEHAVIOR_FILE)
    }

    pub fn server_config_path(&self) -> PathBuf {
        self.dir.join(SERVER_CONFIG_FILE)
    }

    pub fn mock_data_path(&self) -> PathBuf {
        self.dir.join(MOCK_DATA_FILE)
    }

    /// Map a changed path to the campaign file it affects.
    ///
    /// Only files directly inside the campaign directory count; scss
    /// partials (`_*.scss`) also map to [`FileKind::Styles`].
    pub fn classify(&self, path: &Path) -> Option<FileKind> {
        let in_dir = match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => same_dir(parent, &self.dir),
            None => false,
        };
        if !in_dir {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        match name {
            TEMPLATE_FILE => Some(FileKind::Template),
            CSS_FILE | SCSS_FILE => Some(FileKind::Styles),
            CLIENT_SCRIPT_FILE => Some(FileKind::ClientScript),
            CLIENT_BEHAVIOR_FILE => Some(FileKind::ClientBehavior),
            SERVER_CONFIG_FILE => Some(FileKind::ServerConfig),
            MOCK_DATA_FILE => Some(FileKind::MockData),
            n if n.starts_with('_') && n.ends_with(".scss") => Some(FileKind::Styles),
            _ => None,
        }
    }

    pub fn load_template(&self) -> Result<String> {
        let path = self.template_path();
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read template {}", path.display()))
    }

    /// Campaign data for rendering: `mock-data.json` when present, else the
    /// defaults extracted from `server-side.ts`. Errors yield empty data.
    pub fn load_data(&self) -> CampaignData {
        let mock = self.mock_data_path();
        if mock.exists() {
            debug!(path = %mock.display(), "loading mock data");
            return match std::fs::read_to_string(&mock)
                .map_err(anyhow::Error::from)
                .and_then(|s| CampaignData::from_json_str(&s).map_err(anyhow::Error::from))
            {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %mock.display(), error = %e, "failed to load mock data; using empty data");
                    CampaignData::new()
                }
            };
        }

        let config = self.server_config_path();
        match extract_from_path(&config) {
            Ok(extraction) => extraction.data,
            Err(e) => {
                warn!(error = %e, "failed to extract campaign data; using empty data");
                CampaignData::new()
            }
        }
    }

    /// Stylesheet for the dev page: compiled `styles.scss` if present, else
    /// `styles.css`, else empty.
    pub fn load_stylesheet(&self) -> String {
        let scss = self.scss_path();
        if scss.exists() {
            return match std::fs::read_to_string(&scss) {
                Ok(source) => compile_scss(&source, &self.dir).unwrap_or_else(|e| {
                    warn!(path = %scss.display(), error = %e, "stylesheet failed to compile");
                    compile_error_comment(&e)
                }),
                Err(e) => {
                    warn!(path = %scss.display(), error = %e, "failed to read stylesheet");
                    String::new()
                }
            };
        }
        std::fs::read_to_string(self.css_path()).unwrap_or_default()
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
