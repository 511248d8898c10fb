//! Export bundle for the template editor.
//!
//! Collects the four campaign files into
//! `{ description, public, files: { <key>: { content } } }`. Per-file
//! problems never abort the export: missing or unreadable files are skipped
//! with a warning, and a stylesheet that fails to compile is replaced by a
//! comment carrying the error.

use std::path::Path;

use serde::Serialize;
use serde::ser::SerializeMap;
use tracing::{debug, warn};

/// How the `template.css` entry is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StyleMode {
    /// Read `styles.css` verbatim.
    #[default]
    Plain,
    /// Compile `styles.scss`.
    Compile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub description: String,
    pub public: bool,
    pub style: StyleMode,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            description: "Imported template".to_string(),
            public: false,
            style: StyleMode::Plain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileContent {
    pub content: String,
}

/// Export entries in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportFiles(Vec<(&'static str, FileContent)>);

impl ExportFiles {
    pub fn get(&self, key: &str) -> Option<&FileContent> {
        self.0.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|(k, _)| *k).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: &'static str, content: String) {
        self.0.push((key, FileContent { content }));
    }
}

impl Serialize for ExportFiles {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPayload {
    pub description: String,
    pub public: bool,
    pub files: ExportFiles,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub payload: ExportPayload,
    pub warnings: Vec<String>,
}

/// Export key -> source file, in output order.
fn sources(style: StyleMode) -> [(&'static str, &'static str); 4] {
    let stylesheet = match style {
        StyleMode::Plain => "styles.css",
        StyleMode::Compile => "styles.scss",
    };
    [
        ("template.hbs", "template.hbs"),
        ("template.css", stylesheet),
        ("template.js", "client-side.js"),
        ("template.ts", "server-side.ts"),
    ]
}

/// Build the export payload for the campaign directory `dir`.
pub fn build_export(dir: &Path, options: &ExportOptions) -> ExportReport {
    let mut files = ExportFiles::default();
    let mut warnings = Vec::new();

    for (key, file_name) in sources(options.style) {
        let path = dir.join(file_name);
        if !path.exists() {
            let message = format!("file not found, skipping: {}", path.display());
            warn!("{message}");
            warnings.push(message);
            continue;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                let message = format!("failed to read {}: {e}", path.display());
                warn!("{message}");
                warnings.push(message);
                continue;
            }
        };

        let content = if key == "template.css" && options.style == StyleMode::Compile {
            match compile_scss(&content, dir) {
                Ok(css) => css,
                Err(e) => {
                    let message = format!("error compiling stylesheet {}: {e}", path.display());
                    warn!("{message}");
                    warnings.push(message);
                    compile_error_comment(&e)
                }
            }
        } else {
            content
        };

        debug!(key, path = %path.display(), "added export entry");
        files.insert(key, content);
    }

    ExportReport {
        payload: ExportPayload {
            description: options.description.clone(),
            public: options.public,
            files,
        },
        warnings,
    }
}

/// Compile SCSS source, resolving `@import`/`@use` relative to `load_dir`.
pub fn compile_scss(source: &str, load_dir: &Path) -> Result<String, String> {
    let options = grass::Options::default().load_path(load_dir);
    grass::from_string(source.to_string(), &options).map_err(|e| e.to_string())
}

/// Stylesheet content substituted for a failed compile.
pub fn compile_error_comment(message: &str) -> String {
    // A `*/` inside the message would end the comment early.
    let message = message.replace("*/", "* /");
    format!("/* Stylesheet Compilation Error: {message} */")
}
