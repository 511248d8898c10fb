//! Dev session: drives one client behavior through its lifecycle.
//!
//! The session owns the mock SDK, the registration bridge, the compiled
//! template and the current campaign data. Every change (template, data or
//! client behavior) goes through the same reload cycle:
//!
//! ```text
//! applied --reset(previous data)--> reloading --swap + settle--> loading
//!    ^                                                              |
//!    +------ apply(new data, new template) <-- registered <-- load/register
//! ```
//!
//! `reset` always runs on the previously registered definition with the data
//! it was applied with, and the template/data swap only happens after it
//! returns. Callback failures are logged and never abort the session.

pub mod events;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::data::CampaignData;
use crate::dom::SharedDocument;
use crate::render::CompiledTemplate;
use crate::sdk::MockSdk;
use crate::template::{ClientLoader, RegistrationBridge, apply_failure_hint};

pub use events::{DevEvent, ReloadReason};
pub use state::SessionState;

/// Tunables for a [`DevSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between `reset` and the next `apply` to let removal settle.
    pub settle_delay: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            event_capacity: 64,
        }
    }
}

/// Serializable view of a session for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub loader: String,
    pub definition: Option<String>,
    pub reloads: u64,
    pub data: CampaignData,
    pub sent_events: usize,
}

/// A pending change applied between reset and the next load.
enum Swap {
    Template(CompiledTemplate),
    Data(CampaignData),
    Client,
}

impl Swap {
    fn reason(&self) -> ReloadReason {
        match self {
            Swap::Template(_) => ReloadReason::Template,
            Swap::Data(_) => ReloadReason::Data,
            Swap::Client => ReloadReason::Client,
        }
    }
}

pub struct DevSession {
    state: SessionState,
    config: SessionConfig,
    sdk: MockSdk,
    bridge: RegistrationBridge,
    loader: Arc<dyn ClientLoader>,
    template: CompiledTemplate,
    data: CampaignData,
    /// Data the registered definition was last applied with.
    applied_data: Option<CampaignData>,
    events: broadcast::Sender<DevEvent>,
    reloads: u64,
}

impl DevSession {
    pub fn new(
        document: SharedDocument,
        loader: Arc<dyn ClientLoader>,
        template: CompiledTemplate,
        data: CampaignData,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            state: SessionState::Unloaded,
            config,
            sdk: MockSdk::new(document),
            bridge: RegistrationBridge::new(),
            loader,
            template,
            data,
            applied_data: None,
            events,
            reloads: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn data(&self) -> &CampaignData {
        &self.data
    }

    pub fn document(&self) -> &SharedDocument {
        self.sdk.document()
    }

    pub fn sdk(&self) -> &MockSdk {
        &self.sdk
    }

    pub fn bridge(&self) -> &RegistrationBridge {
        &self.bridge
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<DevEvent> {
        self.events.subscribe()
    }

    /// Sender half, for publishing events that do not go through the
    /// session (such as stylesheet changes).
    pub fn event_sender(&self) -> broadcast::Sender<DevEvent> {
        self.events.clone()
    }

    /// Current `body` markup.
    pub fn body_html(&self) -> String {
        self.document().body_html()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            loader: self.loader.name().to_string(),
            definition: self.bridge.current().map(|d| d.name().to_string()),
            reloads: self.reloads,
            data: self.data.clone(),
            sent_events: self
                .sdk
                .interactions()
                .map_or(0, |si| si.sent_events().len()),
        }
    }

    fn publish(&self, event: DevEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    fn transition(&mut self, to: SessionState) -> Result<()> {
        if !self.state.is_valid_transition(to) {
            bail!("invalid session transition: {} -> {}", self.state, to);
        }
        debug!(from = %self.state, to = %to, "session transition");
        self.state = to;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Install the SDK, load and register the client behavior, and apply it.
    ///
    /// Load and apply failures are logged and published; they leave the
    /// session in `loading` or `registered` rather than returning an error.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Unloaded {
            bail!("session already started (state: {})", self.state);
        }
        self.transition(SessionState::Loading)?;
        self.load_and_apply().await
    }

    /// Recompile the template and reload. Compile errors keep the old
    /// template and skip the reload; returns whether a reload ran.
    pub async fn template_changed(&mut self, source: &str) -> Result<bool> {
        let template = match CompiledTemplate::compile(source) {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "template failed to compile; keeping previous template");
                return Ok(false);
            }
        };
        self.reload(Swap::Template(template)).await?;
        Ok(true)
    }

    /// Replace campaign data, reloading only if it differs by value.
    ///
    /// `campaign-data-update` is published for every call, changed or not;
    /// subscribers decide what an unchanged mapping means to them.
    pub async fn data_changed(&mut self, data: CampaignData) -> Result<bool> {
        self.publish(DevEvent::CampaignDataUpdate { data: data.clone() });
        if data == self.data {
            debug!("campaign data unchanged; skipping re-render");
            return Ok(false);
        }
        self.reload(Swap::Data(data)).await?;
        Ok(true)
    }

    /// Reload with a freshly loaded client behavior.
    pub async fn client_changed(&mut self) -> Result<()> {
        self.reload(Swap::Client).await
    }

    /// Run the current definition's `control` hook.
    pub fn control(&mut self) -> Option<Value> {
        let si = self.sdk.interactions()?.clone();
        let data = self.data.clone();
        self.bridge.current_mut()?.control(&si, &data)
    }

    /// Final reset, SDK cleanup and bridge teardown. Idempotent.
    pub async fn dispose(&mut self) -> Result<()> {
        if self.state == SessionState::Disposed {
            debug!("session already disposed");
            return Ok(());
        }
        self.run_reset();
        self.sdk.cleanup();
        self.bridge.uninstall();
        self.applied_data = None;
        self.transition(SessionState::Disposed)?;
        info!("dev session disposed");
        self.publish(DevEvent::Disposed);
        Ok(())
    }

    async fn reload(&mut self, swap: Swap) -> Result<()> {
        let reason = swap.reason();
        match self.state {
            SessionState::Disposed => bail!("cannot reload a disposed session"),
            SessionState::Unloaded => {
                // Nothing applied yet; the change is picked up by start().
                self.apply_swap(swap);
                return Ok(());
            }
            _ => {}
        }

        info!(%reason, "reloading campaign");
        self.transition(SessionState::Reloading)?;
        self.run_reset();
        self.bridge.clear();
        self.applied_data = None;
        self.apply_swap(swap);

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        self.transition(SessionState::Loading)?;
        // Fresh SDK per load; cleanup cancels element waits the old
        // definition left pending.
        self.sdk.cleanup();
        self.load_and_apply().await?;
        self.reloads += 1;
        self.publish(DevEvent::Reloaded { reason });
        Ok(())
    }

    fn apply_swap(&mut self, swap: Swap) {
        match swap {
            Swap::Template(template) => self.template = template,
            Swap::Data(data) => self.data = data,
            Swap::Client => {}
        }
    }

    /// Reset the registered definition with the data it was applied with.
    fn run_reset(&mut self) {
        let Some(si) = self.sdk.interactions().cloned() else {
            return;
        };
        let data = self.applied_data.clone().unwrap_or_else(|| self.data.clone());
        let Some(definition) = self.bridge.current_mut() else {
            return;
        };
        let name = definition.name().to_string();
        match definition.reset(&si, &data) {
            Ok(()) => debug!(definition = %name, "reset complete"),
            Err(e) => warn!(definition = %name, error = %e, "reset failed; continuing"),
        }
    }

    async fn load_and_apply(&mut self) -> Result<()> {
        let si = self.sdk.install();
        self.bridge.install();
        self.bridge.clear();

        let definition = match self.loader.load().await {
            Ok(d) => d,
            Err(e) => {
                let message = format!("{e:#}");
                error!(loader = self.loader.name(), error = %message, "failed to load client behavior");
                self.publish(DevEvent::LoadFailed { message });
                return Ok(());
            }
        };
        let name = definition.name().to_string();
        self.bridge.register(definition)?;
        self.transition(SessionState::Registered)?;

        let Some(definition) = self.bridge.current_mut() else {
            bail!("definition {name} vanished after registration");
        };
        match definition.apply(&si, &self.data, &self.template) {
            Ok(()) => {
                self.applied_data = Some(self.data.clone());
                self.transition(SessionState::Applied)?;
                info!(definition = %name, data = %self.data, "applied template");
                self.publish(DevEvent::Applied {
                    definition: name,
                    html: self.body_html(),
                });
            }
            Err(e) => {
                let hint = apply_failure_hint(&e);
                match hint {
                    Some(hint) => error!(definition = %name, error = %e, hint, "apply failed"),
                    None => error!(definition = %name, error = %e, "apply failed"),
                }
                // A partial apply may have inserted markup; reset must still
                // see the data it ran with.
                self.applied_data = Some(self.data.clone());
                self.publish(DevEvent::ApplyFailed {
                    definition: name,
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for DevSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevSession")
            .field("state", &self.state)
            .field("loader", &self.loader.name())
            .field("bridge", &self.bridge)
            .field("reloads", &self.reloads)
            .finish()
    }
}
