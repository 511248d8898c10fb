//! Built-in newsletter popup behavior.
//!
//! Appends the rendered popup to `body` once, opens the legal-copy links in
//! a new tab, and on reset unbinds and removes the popup along with any
//! other markup its apply inserted. The form submit
//! and dismiss handlers of the browser widget are exposed as methods so the
//! harness can drive them without an event loop.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::loader::ClientLoader;
use super::trait_def::{ClientError, TemplateDefinition};
use crate::data::CampaignData;
use crate::dom::NodeId;
use crate::render::CompiledTemplate;
use crate::sdk::SalesforceInteractions;

pub const POPUP_SELECTOR: &str = ".mcp-2025-04-09-popup";
const OVERLAY_SELECTOR: &str = ".mcp-overlay";

#[derive(Debug, Clone, Default)]
pub struct PopupTemplate {
    inserted: Vec<NodeId>,
}

impl PopupTemplate {
    /// Emulate a form submission: send the signup event and switch the
    /// popup to its thank-you state.
    pub fn submit(
        &self,
        sdk: &SalesforceInteractions,
        first_name: &str,
        email: &str,
    ) -> Result<Value, ClientError> {
        let popup = sdk.cash_dom(POPUP_SELECTOR);
        let Some(&node) = popup.elements().first() else {
            return Err(ClientError::MissingElement {
                selector: POPUP_SELECTOR.to_string(),
            });
        };

        let interaction_name = {
            let mut doc = sdk.document().lock();
            let name = doc
                .attribute(node, "data-interaction-name")
                .unwrap_or_default()
                .to_string();
            let class = doc.attribute(node, "class").unwrap_or_default().to_string();
            doc.set_attribute(node, "class", &format!("{class} show-thank-you hide-form"));
            name
        };
        sdk.cash_dom(format!("{POPUP_SELECTOR} form.mcp-form"))
            .attr("class", "mcp-form submitted");
        sdk.cash_dom(format!("{POPUP_SELECTOR} input[type=\"submit\"]"))
            .attr("disabled", "true");

        let payload = json!({
            "interaction": { "name": interaction_name },
            "user": {
                "attributes": {
                    "firstName": first_name,
                    "emailAddress": email,
                    "sfmcContactKey": Uuid::new_v4().to_string(),
                }
            }
        });
        info!(interaction = %interaction_name, "popup form submitted");
        sdk.send_event(payload.clone());
        Ok(payload)
    }

    /// Emulate a click on the overlay or a dismiss button. Returns the
    /// number of popups removed.
    pub fn dismiss(&self, sdk: &SalesforceInteractions) -> usize {
        let removed = sdk.cash_dom(POPUP_SELECTOR).remove();
        sdk.cash_dom(OVERLAY_SELECTOR).remove();
        removed
    }
}

impl TemplateDefinition for PopupTemplate {
    fn name(&self) -> &str {
        "popup"
    }

    fn apply(
        &mut self,
        sdk: &SalesforceInteractions,
        data: &CampaignData,
        template: &CompiledTemplate,
    ) -> Result<(), ClientError> {
        if !sdk.cash_dom(POPUP_SELECTOR).is_empty() {
            return Ok(());
        }
        let html = template.render(data)?;
        self.inserted.extend(sdk.cash_dom("body").append(&html));
        sdk.cash_dom(format!("{POPUP_SELECTOR} .small a"))
            .attr("target", "_blank");
        Ok(())
    }

    fn reset(&mut self, sdk: &SalesforceInteractions, data: &CampaignData) -> Result<(), ClientError> {
        sdk.display_utils().unbind(&sdk.build_bind_id(data));
        sdk.cash_dom(POPUP_SELECTOR).remove();
        // The overlay may be rendered outside the popup container.
        sdk.cash_dom(OVERLAY_SELECTOR).remove();
        let mut doc = sdk.document().lock();
        for node in self.inserted.drain(..) {
            doc.remove(node);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PopupLoader;

#[async_trait]
impl ClientLoader for PopupLoader {
    fn name(&self) -> &str {
        "popup"
    }

    async fn load(&self) -> Result<Box<dyn TemplateDefinition>> {
        Ok(Box::new(PopupTemplate::default()))
    }
}
