//! The `TemplateDefinition` trait -- the apply/reset/control triple a
//! client behavior hands to the harness.
//!
//! A definition is produced by a [`super::ClientLoader`] and driven by the
//! dev session: `apply` inserts rendered markup, `reset` removes whatever
//! `apply` produced, and `control` is advisory. The trait is object-safe so
//! definitions can be held as `Box<dyn TemplateDefinition>` by the
//! [`super::RegistrationBridge`].

use serde_json::Value;
use thiserror::Error;

use crate::data::CampaignData;
use crate::render::{CompiledTemplate, RenderError};
use crate::sdk::{SalesforceInteractions, SdkError};

/// Failure raised by a definition's `apply` or `reset`.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error("no elements found for selector {selector:?}")]
    MissingElement { selector: String },

    #[error("{0}")]
    Behavior(String),
}

/// Lifecycle callbacks for one loaded client behavior.
pub trait TemplateDefinition: Send {
    /// Human-readable name used in logs and events.
    fn name(&self) -> &str;

    /// Render `template` with `data` and insert the result.
    fn apply(
        &mut self,
        sdk: &SalesforceInteractions,
        data: &CampaignData,
        template: &CompiledTemplate,
    ) -> Result<(), ClientError>;

    /// Remove and unbind everything `apply` produced.
    fn reset(&mut self, sdk: &SalesforceInteractions, data: &CampaignData)
    -> Result<(), ClientError>;

    /// Advisory control hook. The default does nothing.
    fn control(&mut self, _sdk: &SalesforceInteractions, _data: &CampaignData) -> Option<Value> {
        None
    }
}

// Compile-time assertion: TemplateDefinition must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TemplateDefinition) {}
};

/// Known apply failure messages and the developer hint for each.
const APPLY_HINTS: &[(&str, &str)] = &[
    (
        "not of type 'Node'",
        "apply passed a markup string where a DOM node was expected; insert rendered markup with cashDom(...).append(html)",
    ),
    (
        "no elements found",
        "the element apply inserts into does not exist yet; check the selector or wait for it with pageElementLoaded",
    ),
    (
        "template render error",
        "the template failed to render with the current campaign data; check field names and helpers in template.hbs",
    ),
    (
        "invalid selector",
        "a selector used by apply is outside the supported subset (no pseudo-classes or sibling combinators)",
    ),
];

/// Heuristic hint for a failed `apply`, matched on the error message.
pub fn apply_failure_hint(error: &ClientError) -> Option<&'static str> {
    let message = error.to_string();
    APPLY_HINTS
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, hint)| *hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::SelectorList;

    struct Noop;

    impl TemplateDefinition for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn apply(
            &mut self,
            _sdk: &SalesforceInteractions,
            _data: &CampaignData,
            _template: &CompiledTemplate,
        ) -> Result<(), ClientError> {
            Ok(())
        }

        fn reset(
            &mut self,
            _sdk: &SalesforceInteractions,
            _data: &CampaignData,
        ) -> Result<(), ClientError> {
            Ok(())
        }
    }

    #[test]
    fn noop_definition_is_usable_as_trait_object() {
        let mut def: Box<dyn TemplateDefinition> = Box::new(Noop);
        let mut sdk = crate::sdk::MockSdk::new(crate::dom::SharedDocument::new());
        let si = sdk.install();
        assert_eq!(def.name(), "noop");
        assert!(def.control(&si, &CampaignData::new()).is_none());
    }

    #[test]
    fn hints_match_known_messages() {
        let node = ClientError::Behavior(
            "Failed to execute 'appendChild' on 'Node': parameter 1 is not of type 'Node'.".into(),
        );
        assert!(apply_failure_hint(&node).unwrap().contains("DOM node"));

        let missing = ClientError::MissingElement {
            selector: "#zone".into(),
        };
        assert!(apply_failure_hint(&missing).unwrap().contains("does not exist"));

        let render = ClientError::Render(RenderError::Render("bad".into()));
        assert!(apply_failure_hint(&render).unwrap().contains("template.hbs"));

        let selector = ClientError::Sdk(SdkError::Selector(
            SelectorList::parse("a:hover").unwrap_err(),
        ));
        assert!(apply_failure_hint(&selector).unwrap().contains("supported subset"));

        assert!(apply_failure_hint(&ClientError::Behavior("boom".into())).is_none());
    }
}
