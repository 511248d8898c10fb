//! `DisplayUtils`: element waits and bind bookkeeping.

use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::{SalesforceInteractions, SdkError};
use crate::dom::{SelectorList, SharedDocument, WatchId};

/// Borrowed view over the display helpers of an installed SDK.
#[derive(Debug, Clone, Copy)]
pub struct DisplayUtils<'a> {
    sdk: &'a SalesforceInteractions,
}

impl<'a> DisplayUtils<'a> {
    pub(crate) fn new(sdk: &'a SalesforceInteractions) -> Self {
        Self { sdk }
    }

    /// Wait for `target` to exist in the document.
    ///
    /// Resolves immediately when the target already matches; no watcher is
    /// registered in that case. Otherwise a watcher is attached to the
    /// element matching `observer` (or the document root) and resolves once
    /// a child-list mutation under it makes the target match.
    pub fn page_element_loaded(
        &self,
        target: &str,
        observer: Option<&str>,
    ) -> Result<ElementWait, SdkError> {
        if target.trim().is_empty() {
            error!("pageElementLoaded: target selector is required");
            return Err(SdkError::InvalidTarget(target.to_string()));
        }
        let selector = SelectorList::parse(target).inspect_err(|e| {
            error!(error = %e, "pageElementLoaded: invalid target selector");
        })?;

        let doc = self.sdk.document();
        let mut guard = doc.lock();
        if guard.select_first(&selector).is_some() {
            debug!(target, "pageElementLoaded: target already present");
            return Ok(ElementWait {
                target: target.to_string(),
                state: WaitState::Ready,
                doc: doc.clone(),
            });
        }

        let mut root = guard.root();
        if let Some(observer) = observer {
            match guard.query_selector(observer) {
                Ok(Some(node)) => root = node,
                Ok(None) => warn!(
                    observer,
                    "pageElementLoaded: observer selector not found, observing document root"
                ),
                Err(e) => warn!(
                    error = %e,
                    "pageElementLoaded: invalid observer selector, observing document root"
                ),
            }
        }

        let (id, rx) = guard.watch_for(target, root)?;
        drop(guard);
        self.sdk.track_watch(id);
        Ok(ElementWait {
            target: target.to_string(),
            state: WaitState::Pending { id, rx },
            doc: doc.clone(),
        })
    }

    /// Release display bindings recorded under `bind_id`.
    pub fn unbind(&self, bind_id: &str) {
        debug!(bind_id, "DisplayUtils.unbind");
        self.sdk.record_unbind(bind_id);
    }
}

#[derive(Debug)]
enum WaitState {
    Ready,
    Pending {
        id: WatchId,
        rx: oneshot::Receiver<String>,
    },
}

/// A pending or already-satisfied `pageElementLoaded` wait.
#[derive(Debug)]
pub struct ElementWait {
    target: String,
    state: WaitState,
    doc: SharedDocument,
}

impl ElementWait {
    pub fn target(&self) -> &str {
        &self.target
    }

    /// True when the target matched at call time and no watcher was created.
    pub fn is_immediate(&self) -> bool {
        matches!(self.state, WaitState::Ready)
    }

    pub fn watch_id(&self) -> Option<WatchId> {
        match &self.state {
            WaitState::Ready => None,
            WaitState::Pending { id, .. } => Some(*id),
        }
    }

    /// Resolve with the target selector once it matches.
    ///
    /// Fails with [`SdkError::Cancelled`] if the watcher is detached first.
    pub async fn wait(self) -> Result<String, SdkError> {
        match self.state {
            WaitState::Ready => Ok(self.target),
            WaitState::Pending { rx, .. } => rx.await.map_err(|_| SdkError::Cancelled {
                target: self.target,
            }),
        }
    }

    /// Detach the watcher without waiting. Returns `true` if a live
    /// watcher was removed.
    pub fn cancel(self) -> bool {
        match self.state {
            WaitState::Ready => false,
            WaitState::Pending { id, .. } => self.doc.lock().cancel_watch(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::MockSdk;

    fn installed() -> (MockSdk, SalesforceInteractions) {
        let mut sdk = MockSdk::new(SharedDocument::new());
        let interactions = sdk.install();
        (sdk, interactions)
    }

    #[tokio::test]
    async fn resolves_immediately_without_watcher() {
        let (sdk, si) = installed();
        si.cash_dom("body").append("<div class='ready'></div>");

        let wait = si.display_utils().page_element_loaded(".ready", None).unwrap();
        assert!(wait.is_immediate());
        assert_eq!(sdk.document().lock().watcher_count(), 0);
        assert_eq!(wait.wait().await.unwrap(), ".ready");
    }

    #[tokio::test]
    async fn resolves_once_after_insertion() {
        let (sdk, si) = installed();
        let wait = si.display_utils().page_element_loaded(".late", None).unwrap();
        assert!(!wait.is_immediate());
        assert_eq!(sdk.document().lock().watcher_count(), 1);

        si.cash_dom("body").append("<div><span class='late'></span></div>");
        assert_eq!(sdk.document().lock().watcher_count(), 0);
        assert_eq!(wait.wait().await.unwrap(), ".late");

        // Later insertions find no watcher left to fire.
        si.cash_dom("body").append("<span class='late'></span>");
        assert_eq!(sdk.document().lock().watcher_count(), 0);
    }

    #[tokio::test]
    async fn observer_scopes_the_watch() {
        let (sdk, si) = installed();
        si.cash_dom("body").append("<section id='zone'></section><aside></aside>");
        let wait = si
            .display_utils()
            .page_element_loaded(".late", Some("#zone"))
            .unwrap();

        si.cash_dom("aside").append("<i class='late'></i>");
        assert_eq!(sdk.document().lock().watcher_count(), 1);

        si.cash_dom("#zone").append("<b></b>");
        assert_eq!(wait.wait().await.unwrap(), ".late");
    }

    #[tokio::test]
    async fn missing_observer_falls_back_to_root() {
        let (_sdk, si) = installed();
        let wait = si
            .display_utils()
            .page_element_loaded(".late", Some("#missing"))
            .unwrap();
        si.cash_dom("body").append("<p class='late'></p>");
        assert_eq!(wait.wait().await.unwrap(), ".late");
    }

    #[tokio::test]
    async fn cancel_detaches_and_wait_reports_cancelled() {
        let (sdk, si) = installed();
        let wait = si.display_utils().page_element_loaded(".x", None).unwrap();
        assert!(wait.cancel());
        assert_eq!(sdk.document().lock().watcher_count(), 0);

        let wait = si.display_utils().page_element_loaded(".y", None).unwrap();
        sdk.document().lock().cancel_all_watches();
        let err = wait.wait().await.unwrap_err();
        assert!(matches!(err, SdkError::Cancelled { .. }), "got: {err}");
    }

    #[test]
    fn empty_or_invalid_targets_reject() {
        let (_sdk, si) = installed();
        let utils = si.display_utils();
        assert!(matches!(
            utils.page_element_loaded("  ", None),
            Err(SdkError::InvalidTarget(_))
        ));
        assert!(matches!(
            utils.page_element_loaded("a:hover", None),
            Err(SdkError::Selector(_))
        ));
    }

    #[test]
    fn unbind_is_recorded() {
        let (_sdk, si) = installed();
        si.display_utils().unbind("mock-bind-id::exp");
        assert_eq!(si.unbound(), vec!["mock-bind-id::exp".to_string()]);
    }
}
