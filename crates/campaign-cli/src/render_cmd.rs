use anyhow::{Context, Result, bail};
use tokio::sync::broadcast::error::TryRecvError;

use campaign_core::dom::SharedDocument;
use campaign_core::{CampaignProject, CompiledTemplate, DevEvent, DevSession, SessionConfig, SessionState};

use crate::select_loader;

/// Run one headless session cycle and return the rendered body markup.
///
/// Fails when the client behavior could not be loaded or applied, with the
/// session's own diagnosis in the error.
pub async fn run_render(project: &CampaignProject, client: Option<&str>) -> Result<String> {
    let loader = select_loader(project, client)?;
    let source = project.load_template()?;
    let template = CompiledTemplate::compile(&source).context("template failed to compile")?;

    let mut session = DevSession::new(
        SharedDocument::new(),
        loader,
        template,
        project.load_data(),
        SessionConfig::default(),
    );
    let mut events = session.subscribe();
    session.start().await?;

    let state = session.state();
    let html = session.body_html();
    session.dispose().await?;

    if state != SessionState::Applied {
        let reason = loop {
            match events.try_recv() {
                Ok(DevEvent::LoadFailed { message }) => break message,
                Ok(DevEvent::ApplyFailed { message, hint, .. }) => {
                    break match hint {
                        Some(hint) => format!("{message} (hint: {hint})"),
                        None => message,
                    };
                }
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break "unknown error".to_string(),
            }
        };
        bail!("client behavior did not apply (state: {state}): {reason}");
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_test_utils::CampaignFixture;

    #[tokio::test]
    async fn renders_sample_with_extracted_data() {
        let fixture = CampaignFixture::sample();
        fixture.write_template(r#"<div class="mcp-2025-04-09-popup"><h1>{{formHeader}}</h1></div>"#);

        let html = run_render(&fixture.project(), Some("popup")).await.unwrap();
        assert_eq!(html, r#"<div class="mcp-2025-04-09-popup"><h1>Hello</h1></div>"#);
    }

    #[tokio::test]
    async fn declarative_behavior_wraps_markup() {
        let fixture = CampaignFixture::sample();
        fixture.write_behavior("[apply]\ncontainer = { id = \"zone\" }\n");

        let html = run_render(&fixture.project(), None).await.unwrap();
        assert_eq!(html, r#"<div id="zone"><h1>Hello</h1></div>"#);
    }

    #[tokio::test]
    async fn load_failure_is_reported() {
        let fixture = CampaignFixture::sample();
        fixture.write_behavior("[apply]\nbogus = 1\n");

        let err = run_render(&fixture.project(), None).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("state: loading"), "got: {msg}");
        assert!(msg.contains("client-side.toml"), "got: {msg}");
    }

    #[tokio::test]
    async fn missing_append_target_reports_apply_failure() {
        let fixture = CampaignFixture::sample();
        fixture.write_behavior("[apply]\nappend_to = \"#zone\"\n");

        let err = run_render(&fixture.project(), None).await.unwrap_err();
        assert!(err.to_string().contains("state: registered"), "got: {err}");
    }
}
