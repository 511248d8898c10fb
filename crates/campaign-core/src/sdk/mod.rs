//! Mock of the host personalization SDK.
//!
//! The production runtime exposes `SalesforceInteractions` and `buildBindId`
//! as globals. Here they are an explicit [`MockSdk`] slot owned by the dev
//! session: [`MockSdk::install`] hands out a [`SalesforceInteractions`]
//! handle and [`MockSdk::cleanup`] tears it down, cancelling any element
//! waits it left behind.

pub mod cash_dom;
pub mod display;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::CampaignData;
use crate::dom::{SelectorError, SharedDocument, WatchId};

pub use cash_dom::{CashDom, Query};
pub use display::{DisplayUtils, ElementWait};

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("target selector is required and must be non-empty, got {0:?}")]
    InvalidTarget(String),

    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error("wait for {target:?} was cancelled before the element appeared")]
    Cancelled { target: String },
}

/// An event passed to `sendEvent`. Recorded, never sent anywhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentEvent {
    pub id: Uuid,
    pub sent_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Default)]
struct SdkState {
    events: Vec<SentEvent>,
    unbound: Vec<String>,
    watches: Vec<WatchId>,
}

/// The `SalesforceInteractions` surface handed to template definitions.
///
/// Cheap to clone; clones share the same document and event log.
#[derive(Debug, Clone)]
pub struct SalesforceInteractions {
    doc: SharedDocument,
    state: Arc<Mutex<SdkState>>,
}

impl SalesforceInteractions {
    fn new(doc: SharedDocument) -> Self {
        Self {
            doc,
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SdkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// Query the document. The query runs each time a handle method is
    /// called, not here.
    pub fn cash_dom(&self, query: impl Into<Query>) -> CashDom {
        CashDom::new(self.doc.clone(), query.into())
    }

    pub fn send_event(&self, payload: Value) -> Uuid {
        let event = SentEvent {
            id: Uuid::new_v4(),
            sent_at: Utc::now(),
            payload,
        };
        info!(event_id = %event.id, payload = %event.payload, "sendEvent");
        let id = event.id;
        self.state().events.push(event);
        id
    }

    /// Events passed to [`Self::send_event`], oldest first.
    pub fn sent_events(&self) -> Vec<SentEvent> {
        self.state().events.clone()
    }

    pub fn display_utils(&self) -> DisplayUtils<'_> {
        DisplayUtils::new(self)
    }

    /// Identity mapping in the mock.
    pub fn get_content_zone_selector(&self, zone: &str) -> String {
        zone.to_string()
    }

    /// The `buildBindId` global.
    pub fn build_bind_id(&self, data: &CampaignData) -> String {
        build_bind_id(data)
    }

    /// Bind ids passed to `DisplayUtils.unbind`, oldest first.
    pub fn unbound(&self) -> Vec<String> {
        self.state().unbound.clone()
    }

    fn record_unbind(&self, bind_id: &str) {
        self.state().unbound.push(bind_id.to_string());
    }

    fn track_watch(&self, id: WatchId) {
        self.state().watches.push(id);
    }

    /// Cancel element waits started through this handle that have not fired.
    fn cancel_watches(&self) -> usize {
        let watches = std::mem::take(&mut self.state().watches);
        let mut doc = self.doc.lock();
        watches.into_iter().filter(|id| doc.cancel_watch(*id)).count()
    }
}

/// Bind id for a campaign context: `mock-bind-id::<campaign.experienceId>`.
pub fn build_bind_id(data: &CampaignData) -> String {
    let experience = data
        .get("campaign")
        .and_then(|c| c.get("experienceId"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| "unknown_experience".to_string());
    format!("mock-bind-id::{experience}")
}

/// Install/cleanup slot for the SDK globals.
#[derive(Debug)]
pub struct MockSdk {
    doc: SharedDocument,
    installed: Option<SalesforceInteractions>,
}

impl MockSdk {
    pub fn new(doc: SharedDocument) -> Self {
        Self {
            doc,
            installed: None,
        }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.doc
    }

    /// Install the SDK. Installing twice returns the existing handle.
    pub fn install(&mut self) -> SalesforceInteractions {
        if let Some(existing) = &self.installed {
            debug!("mock SDK already installed");
            return existing.clone();
        }
        debug!("installing mock SDK");
        let interactions = SalesforceInteractions::new(self.doc.clone());
        self.installed = Some(interactions.clone());
        interactions
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_some()
    }

    pub fn interactions(&self) -> Option<&SalesforceInteractions> {
        self.installed.as_ref()
    }

    /// Remove the SDK. Returns `false` when nothing was installed.
    ///
    /// Pending element waits are cancelled and the slots of nodes removed
    /// while the SDK was installed are reclaimed.
    pub fn cleanup(&mut self) -> bool {
        match self.installed.take() {
            Some(interactions) => {
                let cancelled = interactions.cancel_watches();
                let reclaimed = self.doc.lock().reclaim_detached();
                debug!(cancelled_watches = cancelled, reclaimed, "cleaned up mock SDK");
                true
            }
            None => {
                info!("no mock SDK installed to clean up");
                false
            }
        }
    }
}
