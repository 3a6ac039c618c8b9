//! `pagewright generate`: drive one session to a finished component
//! without a server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use pw_domain::config::Config;
use pw_domain::context::BusinessContext;
use pw_domain::cost::ModelTier;
use pw_domain::workflow::Stage;
use pw_sessions::Session;

use crate::bootstrap;
use crate::runtime::{Orchestrator, WorkflowCommand, WorkflowEvent};

/// Explicit stage commands issued after the first message. The workflow
/// never needs more than structure, copy and code.
const MAX_FOLLOW_UPS: usize = 3;

pub async fn generate(
    config: Arc<Config>,
    request: String,
    tier: ModelTier,
    context: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let context = context.as_deref().map(read_context).transpose()?;

    let state = bootstrap::build_app_state(config)?;
    let orchestrator = state
        .require_orchestrator()
        .map_err(anyhow::Error::msg)?
        .clone();
    let session = state.sessions.create(tier);

    drive(
        &orchestrator,
        &session,
        WorkflowCommand::Message {
            text: request,
            context,
        },
    )
    .await?;

    for _ in 0..MAX_FOLLOW_UPS {
        let command = match session.stage() {
            Stage::Complete => break,
            Stage::Clarifying | Stage::Understanding => {
                if let Some(reply) = last_assistant_reply(&session) {
                    eprintln!("assistant: {reply}");
                }
                WorkflowCommand::GenerateStructure { preferences: None }
            }
            Stage::GeneratingStructure => WorkflowCommand::GenerateCopy,
            Stage::GeneratingCopy | Stage::ApplyingStyles | Stage::Previewing => {
                WorkflowCommand::GenerateCode
            }
            Stage::Error => anyhow::bail!(
                "generation failed: {}",
                session.snapshot().error.unwrap_or_default()
            ),
            Stage::Idle => anyhow::bail!("session was reset"),
        };
        drive(&orchestrator, &session, command).await?;
    }

    let snapshot = session.snapshot();
    let code = snapshot
        .generated_code
        .with_context(|| format!("no component produced (session ended in {})", snapshot.stage))?;

    eprintln!(
        "done: {} section(s), ${:.4} estimated",
        snapshot.section_contents.len(),
        snapshot.cost.total_cost()
    );

    match out {
        Some(path) => std::fs::write(&path, code)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{code}"),
    }

    if let Err(e) = state.sessions.flush() {
        tracing::warn!(error = %e, "session store flush failed");
    }
    Ok(())
}

/// Run one command to completion, echoing progress to stderr.
async fn drive(
    orchestrator: &Arc<Orchestrator>,
    session: &Arc<Session>,
    command: WorkflowCommand,
) -> anyhow::Result<()> {
    let mut rx = orchestrator.spawn(session.clone(), command);
    while let Some(event) = rx.recv().await {
        match event {
            WorkflowEvent::Stage { stage, progress } => eprintln!("[{progress:>3}%] {stage}"),
            WorkflowEvent::Section { section_id, status } => {
                eprintln!("       {section_id}: {status:?}")
            }
            WorkflowEvent::Error { message } => anyhow::bail!("{message}"),
            WorkflowEvent::Cancelled { stage } => anyhow::bail!("cancelled during {stage}"),
            WorkflowEvent::Delta { .. }
            | WorkflowEvent::Progress { .. }
            | WorkflowEvent::Usage { .. }
            | WorkflowEvent::Done { .. } => {}
        }
    }
    Ok(())
}

fn read_context(path: &Path) -> anyhow::Result<BusinessContext> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn last_assistant_reply(session: &Session) -> Option<String> {
    session
        .snapshot()
        .messages
        .into_iter()
        .rev()
        .find(|m| m.role == pw_domain::message::Role::Assistant)
        .map(|m| m.content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_file_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctx.json");
        std::fs::write(&path, r#"{"businessName":"Crumb","industry":"bakery"}"#).unwrap();
        let ctx = read_context(&path).unwrap();
        assert_eq!(ctx.business_name.as_deref(), Some("Crumb"));
        assert_eq!(ctx.industry.as_deref(), Some("bakery"));
    }

    #[test]
    fn missing_context_file_is_reported() {
        let err = read_context(Path::new("/nonexistent/ctx.json")).unwrap_err();
        assert!(err.to_string().contains("reading"));
    }
}
