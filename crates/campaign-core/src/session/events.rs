//! Events published by the dev session.

use serde::Serialize;

use crate::data::CampaignData;

/// Why a reload happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadReason {
    Template,
    Data,
    Client,
}

impl std::fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Template => "template",
            Self::Data => "data",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

/// Events in the dev session lifecycle, forwarded to browsers over SSE.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DevEvent {
    /// A definition was applied; `html` is the resulting body markup.
    Applied { definition: String, html: String },

    /// `apply` failed; the session stays registered.
    ApplyFailed {
        definition: String,
        message: String,
        hint: Option<String>,
    },

    /// The client behavior could not be loaded.
    LoadFailed { message: String },

    /// Campaign data changed by value.
    CampaignDataUpdate { data: CampaignData },

    /// The stylesheet changed; browsers refetch it without a reload.
    StylesChanged,

    /// A reload cycle finished.
    Reloaded { reason: ReloadReason },

    /// The session was torn down.
    Disposed,
}

impl DevEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::ApplyFailed { .. } => "apply-failed",
            Self::LoadFailed { .. } => "load-failed",
            Self::CampaignDataUpdate { .. } => "campaign-data-update",
            Self::StylesChanged => "styles-changed",
            Self::Reloaded { .. } => "reloaded",
            Self::Disposed => "disposed",
        }
    }
}
