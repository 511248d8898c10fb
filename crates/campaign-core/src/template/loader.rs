//! The `ClientLoader` trait -- produces a fresh [`TemplateDefinition`] for
//! every load.
//!
//! Each call to [`ClientLoader::load`] must return a new definition built
//! from the current state of its source, so that a reload never reuses a
//! stale closure over an old DOM.

use anyhow::Result;
use async_trait::async_trait;

use super::trait_def::TemplateDefinition;

#[async_trait]
pub trait ClientLoader: Send + Sync {
    /// Name the loader is registered under (e.g. "declarative").
    fn name(&self) -> &str;

    /// Load the client behavior under a fresh identity.
    async fn load(&self) -> Result<Box<dyn TemplateDefinition>>;
}

// Compile-time assertion: ClientLoader must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn ClientLoader) {}
};
