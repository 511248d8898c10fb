//! Declarative client behavior read from `client-side.toml`.
//!
//! ```toml
//! name = "newsletter-popup"
//!
//! [apply]
//! skip_if_present = ".popup"
//! append_to = "body"
//! container = { tag = "div", id = "sfmc-widget-container" }
//!
//! [[apply.set_attribute]]
//! selector = ".popup .small a"
//! name = "target"
//! value = "_blank"
//!
//! [reset]
//! unbind = true
//! remove = [".popup"]
//!
//! [control]
//! send_event = { interaction = { name = "Popup shown" } }
//! ```
//!
//! The file is re-read on every load, so edits take effect on the next
//! reload without any module cache.
//!
//! Reset removes whatever `[reset] remove` names (or the container, or the
//! `skip_if_present` marker), then any markup the last apply inserted that
//! is still attached. An empty file therefore appends on apply and cleans
//! up after itself on reset.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::loader::ClientLoader;
use super::trait_def::{ClientError, TemplateDefinition};
use crate::data::CampaignData;
use crate::dom::NodeId;
use crate::dom::parse::escape_attribute;
use crate::render::CompiledTemplate;
use crate::sdk::SalesforceInteractions;

fn default_name() -> String {
    "declarative".to_string()
}

fn default_append_to() -> String {
    "body".to_string()
}

fn default_container_tag() -> String {
    "div".to_string()
}

fn default_true() -> bool {
    true
}

/// Parsed `client-side.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Behavior {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub apply: ApplyRules,
    #[serde(default)]
    pub reset: ResetRules,
    #[serde(default)]
    pub control: ControlRules,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplyRules {
    /// Skip apply when this selector already matches.
    pub skip_if_present: Option<String>,
    #[serde(default = "default_append_to")]
    pub append_to: String,
    /// Wrap rendered markup in a container element.
    pub container: Option<Container>,
    #[serde(default)]
    pub set_attribute: Vec<SetAttribute>,
}

impl Default for ApplyRules {
    fn default() -> Self {
        Self {
            skip_if_present: None,
            append_to: default_append_to(),
            container: None,
            set_attribute: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    #[serde(default = "default_container_tag")]
    pub tag: String,
    pub id: Option<String>,
    pub class: Option<String>,
}

impl Container {
    fn wrap(&self, inner: &str) -> String {
        let mut open = format!("<{}", self.tag);
        if let Some(id) = &self.id {
            open.push_str(&format!(" id=\"{}\"", escape_attribute(id)));
        }
        if let Some(class) = &self.class {
            open.push_str(&format!(" class=\"{}\"", escape_attribute(class)));
        }
        format!("{open}>{inner}</{}>", self.tag)
    }

    /// Selector matching the container, used when no remove list is given.
    fn selector(&self) -> String {
        match (&self.id, &self.class) {
            (Some(id), _) => format!("#{id}"),
            (None, Some(class)) => class
                .split_ascii_whitespace()
                .fold(self.tag.clone(), |acc, c| format!("{acc}.{c}")),
            (None, None) => self.tag.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetAttribute {
    pub selector: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRules {
    #[serde(default = "default_true")]
    pub unbind: bool,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl Default for ResetRules {
    fn default() -> Self {
        Self {
            unbind: true,
            remove: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlRules {
    pub send_event: Option<toml::Value>,
}

impl Behavior {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("invalid client behavior")
    }
}

/// A definition driven by a [`Behavior`].
#[derive(Debug, Clone)]
pub struct DeclarativeTemplate {
    behavior: Behavior,
    inserted: Vec<NodeId>,
}

impl DeclarativeTemplate {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            inserted: Vec::new(),
        }
    }

    pub fn behavior(&self) -> &Behavior {
        &self.behavior
    }

    fn remove_selectors(&self) -> Vec<String> {
        if !self.behavior.reset.remove.is_empty() {
            return self.behavior.reset.remove.clone();
        }
        match (&self.behavior.apply.container, &self.behavior.apply.skip_if_present) {
            (Some(container), _) => vec![container.selector()],
            (None, Some(marker)) => vec![marker.clone()],
            (None, None) => Vec::new(),
        }
    }
}

impl TemplateDefinition for DeclarativeTemplate {
    fn name(&self) -> &str {
        &self.behavior.name
    }

    fn apply(
        &mut self,
        sdk: &SalesforceInteractions,
        data: &CampaignData,
        template: &CompiledTemplate,
    ) -> Result<(), ClientError> {
        let rules = &self.behavior.apply;
        if let Some(marker) = &rules.skip_if_present {
            if !sdk.cash_dom(marker.as_str()).is_empty() {
                debug!(marker, "already applied; skipping");
                return Ok(());
            }
        }

        let target = sdk.cash_dom(rules.append_to.as_str());
        if target.is_empty() {
            return Err(ClientError::MissingElement {
                selector: rules.append_to.clone(),
            });
        }

        let html = template.render(data)?;
        let html = match &rules.container {
            Some(container) => container.wrap(&html),
            None => html,
        };
        self.inserted.extend(target.append(&html));

        for rule in &rules.set_attribute {
            sdk.cash_dom(rule.selector.as_str()).attr(&rule.name, &rule.value);
        }
        Ok(())
    }

    fn reset(&mut self, sdk: &SalesforceInteractions, data: &CampaignData) -> Result<(), ClientError> {
        if self.behavior.reset.unbind {
            sdk.display_utils().unbind(&sdk.build_bind_id(data));
        }
        for selector in self.remove_selectors() {
            sdk.cash_dom(selector).remove();
        }
        let mut doc = sdk.document().lock();
        let leftover = self
            .inserted
            .drain(..)
            .filter(|node| doc.remove(*node))
            .count();
        if leftover > 0 {
            debug!(leftover, "removed inserted markup not matched by reset rules");
        }
        Ok(())
    }

    fn control(&mut self, sdk: &SalesforceInteractions, _data: &CampaignData) -> Option<Value> {
        let payload = self.behavior.control.send_event.as_ref()?;
        let payload = serde_json::to_value(payload).ok()?;
        sdk.send_event(payload.clone());
        Some(payload)
    }
}

/// Loads a [`DeclarativeTemplate`] from a behavior file.
#[derive(Debug, Clone)]
pub struct DeclarativeLoader {
    path: PathBuf,
}

impl DeclarativeLoader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

#[async_trait]
impl ClientLoader for DeclarativeLoader {
    fn name(&self) -> &str {
        "declarative"
    }

    async fn load(&self) -> Result<Box<dyn TemplateDefinition>> {
        let source = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read client behavior {}", self.path.display()))?;
        let behavior = Behavior::from_toml_str(&source)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        debug!(path = %self.path.display(), name = %behavior.name, "loaded declarative client behavior");
        Ok(Box::new(DeclarativeTemplate::new(behavior)))
    }
}
