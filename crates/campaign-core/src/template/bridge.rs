//! Registration bridge -- the single slot holding the current definition.
//!
//! Registration only stores the definition. It never runs `apply`; the dev
//! session invokes it explicitly after registering. The previous definition
//! is handed back unreset so the caller decides what to do with it.

use thiserror::Error;
use tracing::debug;

use super::trait_def::TemplateDefinition;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("registration bridge is not installed; cannot register {definition:?}")]
    NotInstalled { definition: String },
}

#[derive(Default)]
pub struct RegistrationBridge {
    installed: bool,
    current: Option<Box<dyn TemplateDefinition>>,
}

impl RegistrationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the bridge for registrations. Idempotent.
    pub fn install(&mut self) {
        if !self.installed {
            debug!("installing registration bridge");
        }
        self.installed = true;
    }

    /// Close the bridge, returning the definition it held.
    pub fn uninstall(&mut self) -> Option<Box<dyn TemplateDefinition>> {
        debug!("uninstalling registration bridge");
        self.installed = false;
        self.current.take()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Store `definition` as current.
    ///
    /// Returns the previous definition, if any, without calling its
    /// `reset`. Fails when the bridge is not installed.
    pub fn register(
        &mut self,
        definition: Box<dyn TemplateDefinition>,
    ) -> Result<Option<Box<dyn TemplateDefinition>>, BridgeError> {
        if !self.installed {
            return Err(BridgeError::NotInstalled {
                definition: definition.name().to_string(),
            });
        }
        debug!(definition = definition.name(), "registered template definition");
        Ok(self.current.replace(definition))
    }

    pub fn current(&self) -> Option<&dyn TemplateDefinition> {
        self.current.as_deref()
    }

    pub fn current_mut(&mut self) -> Option<&mut (dyn TemplateDefinition + 'static)> {
        self.current.as_deref_mut()
    }

    /// Drop the stored definition, returning it.
    pub fn clear(&mut self) -> Option<Box<dyn TemplateDefinition>> {
        self.current.take()
    }
}

impl std::fmt::Debug for RegistrationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationBridge")
            .field("installed", &self.installed)
            .field("current", &self.current.as_ref().map(|d| d.name()))
            .finish()
    }
}
