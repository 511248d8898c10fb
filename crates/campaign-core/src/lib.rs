//! Core of the campaign template development harness.
//!
//! The harness renders a personalization campaign template (Handlebars
//! markup, stylesheet, client behavior, server-side config) against a mock
//! of the host SDK so it can be developed without the production runtime.
//!
//! # Architecture
//!
//! ```text
//! CampaignProject --load_data()--> extract (server-side.ts) --> CampaignData
//!        |                                                        |
//!        +--load_template()--> render::CompiledTemplate ----------+
//!                                                                 v
//! ClientLoader --load()--> TemplateDefinition --register--> DevSession
//!                                                   |  apply / reset
//!                                                   v
//!                                  sdk::SalesforceInteractions -> dom::Document
//! ```

pub mod data;
pub mod dom;
pub mod export;
pub mod extract;
pub mod project;
pub mod render;
pub mod sdk;
pub mod session;
pub mod template;

pub use data::CampaignData;
pub use project::{CampaignProject, FileKind};
pub use render::CompiledTemplate;
pub use session::{DevEvent, DevSession, SessionConfig, SessionState};
