//! Compiled markup template.
//!
//! Wraps a `handlebars` registry holding exactly one template. A compiled
//! template is a pure function from [`CampaignData`] to markup; it is
//! recreated whenever the template source changes.

use std::sync::Arc;

use handlebars::Handlebars;
use thiserror::Error;

use crate::data::CampaignData;

const TEMPLATE_NAME: &str = "campaign";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("template compile error: {0}")]
    Compile(String),

    #[error("template render error: {0}")]
    Render(String),
}

/// A compiled Handlebars template, cheap to clone.
#[derive(Clone)]
pub struct CompiledTemplate {
    registry: Arc<Handlebars<'static>>,
    source_len: usize,
}

impl CompiledTemplate {
    /// Compile template source.
    pub fn compile(source: &str) -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(TEMPLATE_NAME, source)
            .map_err(|e| RenderError::Compile(e.to_string()))?;
        Ok(Self {
            registry: Arc::new(registry),
            source_len: source.len(),
        })
    }

    /// Render the template with the given data.
    pub fn render(&self, data: &CampaignData) -> Result<String, RenderError> {
        self.registry
            .render(TEMPLATE_NAME, data)
            .map_err(|e| RenderError::Render(e.to_string()))
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("source_len", &self.source_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> CampaignData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(*v)))
            .collect()
    }

    #[test]
    fn renders_fields() {
        let template = CompiledTemplate::compile("<h1>{{formHeader}}</h1>").unwrap();
        let html = template.render(&data(&[("formHeader", "Hello")])).unwrap();
        assert_eq!(html, "<h1>Hello</h1>");
    }

    #[test]
    fn escapes_by_default_and_triple_stash_is_raw() {
        let template = CompiledTemplate::compile("<p>{{a}}</p><p>{{{a}}}</p>").unwrap();
        let html = template.render(&data(&[("a", "<b>x</b>")])).unwrap();
        assert_eq!(html, "<p>&lt;b&gt;x&lt;/b&gt;</p><p><b>x</b></p>");
    }

    #[test]
    fn missing_fields_render_empty() {
        let template = CompiledTemplate::compile("[{{missing}}]").unwrap();
        assert_eq!(template.render(&CampaignData::new()).unwrap(), "[]");
    }

    #[test]
    fn compile_errors_are_reported() {
        let err = CompiledTemplate::compile("{{#if x}}unclosed").unwrap_err();
        assert!(matches!(err, RenderError::Compile(_)), "got: {err}");
    }
}
