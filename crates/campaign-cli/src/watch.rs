//! Campaign directory watcher for the dev server.
//!
//! ```text
//! notify callback --path--> mpsc --debounce--> Vec<FileKind> --> apply_changes
//! ```
//!
//! Bursts of filesystem events (editors often write a file several times
//! per save) are collapsed into one batch per quiet window.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{Stream, StreamExt, pin_mut};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use campaign_core::{CampaignProject, DevEvent, DevSession, FileKind};

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(120);

/// Start watching the campaign directory. Changed paths arrive on the
/// returned channel for as long as the watcher is alive.
pub fn start_watcher(
    project: &CampaignProject,
) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<PathBuf>)> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
        Err(e) => warn!(error = %e, "file watcher error"),
    })
    .context("failed to initialize filesystem watcher")?;

    watcher
        .watch(project.dir(), RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", project.dir().display()))?;
    info!(dir = %project.dir().display(), "watching campaign directory");
    Ok((watcher, rx))
}

/// Collapse changed paths into batches of campaign file kinds, one batch
/// per `window` of quiet. Paths that are not campaign files are dropped.
pub fn debounced(
    project: CampaignProject,
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    window: Duration,
) -> impl Stream<Item = Vec<FileKind>> {
    async_stream::stream! {
        while let Some(first) = rx.recv().await {
            let mut paths = vec![first];
            let sleep = tokio::time::sleep(window);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    next = rx.recv() => match next {
                        Some(path) => {
                            paths.push(path);
                            sleep.as_mut().reset(Instant::now() + window);
                        }
                        None => break,
                    }
                }
            }

            let mut kinds = Vec::new();
            for path in &paths {
                match project.classify(path) {
                    Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                    Some(_) => {}
                    None => debug!(path = %path.display(), "ignoring change"),
                }
            }
            if !kinds.is_empty() {
                yield kinds;
            }
        }
    }
}

/// Route a batch of changed file kinds to the session.
///
/// Styles only notify browsers; template, data and client changes each
/// run one reload cycle.
pub async fn apply_changes(
    session: &Mutex<DevSession>,
    project: &CampaignProject,
    kinds: &[FileKind],
) -> Result<()> {
    let mut session = session.lock().await;

    if kinds.contains(&FileKind::Styles) {
        info!("stylesheet changed");
        let _ = session.event_sender().send(DevEvent::StylesChanged);
    }

    if kinds.contains(&FileKind::Template) {
        match project.load_template() {
            Ok(source) => {
                session.template_changed(&source).await?;
            }
            Err(e) => warn!(error = %e, "template changed but could not be read"),
        }
    }

    if kinds.contains(&FileKind::ServerConfig) || kinds.contains(&FileKind::MockData) {
        session.data_changed(project.load_data()).await?;
    }

    if kinds.contains(&FileKind::ClientBehavior) || kinds.contains(&FileKind::ClientScript) {
        session.client_changed().await?;
    }
    Ok(())
}

/// Apply change batches until the stream ends or `cancel` fires.
pub async fn run_reload_loop(
    session: &Mutex<DevSession>,
    project: &CampaignProject,
    changes: impl Stream<Item = Vec<FileKind>>,
    cancel: CancellationToken,
) {
    pin_mut!(changes);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reload loop cancelled");
                break;
            }
            batch = changes.next() => {
                let Some(kinds) = batch else { break };
                debug!(?kinds, "campaign files changed");
                if let Err(e) = apply_changes(session, project, &kinds).await {
                    warn!(error = %e, "reload failed");
                }
            }
        }
    }
}
