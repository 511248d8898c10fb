//! Template lifecycle contract: definitions, loaders and the registration
//! bridge.
//!
//! # Architecture
//!
//! ```text
//! ClientRegistry --get("declarative")--> Arc<dyn ClientLoader>
//!                                              |
//!                                         load().await
//!                                              |
//!                                              v
//!                                  Box<dyn TemplateDefinition>
//!                                              |
//!                       RegistrationBridge::register(def) -> Option<previous>
//!                                              |
//!                     DevSession: apply(sdk, data, template) / reset(sdk, data)
//! ```

pub mod bridge;
pub mod declarative;
pub mod loader;
pub mod popup;
pub mod registry;
pub mod trait_def;

pub use bridge::{BridgeError, RegistrationBridge};
pub use declarative::{Behavior, DeclarativeLoader, DeclarativeTemplate};
pub use loader::ClientLoader;
pub use popup::{PopupLoader, PopupTemplate};
pub use registry::ClientRegistry;
pub use trait_def::{ClientError, TemplateDefinition, apply_failure_hint};
