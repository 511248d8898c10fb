//! Client loader registry -- a named collection of available loaders.
//!
//! The CLI looks loaders up by name at runtime (e.g. `--client popup`).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::declarative::DeclarativeLoader;
use super::loader::ClientLoader;
use super::popup::PopupLoader;

/// A collection of registered [`ClientLoader`] implementations, keyed by name.
#[derive(Default)]
pub struct ClientRegistry {
    loaders: HashMap<String, Arc<dyn ClientLoader>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in loaders for a campaign directory:
    /// `declarative` (reads `client-side.toml`) and `popup`.
    pub fn with_builtins(behavior_path: &Path) -> Self {
        let mut registry = Self::new();
        registry.register(DeclarativeLoader::new(behavior_path));
        registry.register(PopupLoader);
        registry
    }

    /// Register a loader under [`ClientLoader::name`], returning any loader
    /// it replaced.
    pub fn register(&mut self, loader: impl ClientLoader + 'static) -> Option<Arc<dyn ClientLoader>> {
        let name = loader.name().to_string();
        self.loaders.insert(name, Arc::new(loader))
    }

    /// Look up a loader by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ClientLoader>> {
        self.loaders.get(name).cloned()
    }

    /// Names of all registered loaders, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.loaders.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("loaders", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateDefinition;
    use anyhow::Result;
    use async_trait::async_trait;

    struct FakeLoader(&'static str);

    #[async_trait]
    impl ClientLoader for FakeLoader {
        fn name(&self) -> &str {
            self.0
        }

        async fn load(&self) -> Result<Box<dyn TemplateDefinition>> {
            anyhow::bail!("fake loader {} has nothing to load", self.0)
        }
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get("popup").is_none());
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ClientRegistry::new();
        assert!(registry.register(FakeLoader("a")).is_none());
        assert!(registry.register(FakeLoader("a")).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtins_are_listed() {
        let registry = ClientRegistry::with_builtins(Path::new("campaign/client-side.toml"));
        assert_eq!(registry.list(), vec!["declarative", "popup"]);
    }

    #[tokio::test]
    async fn get_returns_shared_loader() {
        let mut registry = ClientRegistry::new();
        registry.register(FakeLoader("x"));
        let loader = registry.get("x").unwrap();
        let err = loader.load().await.err().unwrap();
        assert!(err.to_string().contains("nothing to load"));
    }
}
