//! End-to-end runs of the generation workflow against a scripted provider.

mod common;

use std::sync::Arc;

use tokio::sync::mpsc;

use pw_domain::config::{LlmConfig, WorkflowConfig};
use pw_domain::context::BusinessContext;
use pw_domain::cost::ModelTier;
use pw_domain::error::{Error, FailureClass};
use pw_domain::page::{SectionContent, SectionStatus};
use pw_domain::workflow::{SessionStatus, Stage};
use pw_gateway::runtime::{Orchestrator, WorkflowCommand, WorkflowEvent};
use pw_prompts::RefinementCommand;
use pw_sessions::{Session, SessionStore};

use common::{code, cta_copy, hero_copy, outline, Script, ScriptedProvider, QUESTION};

fn orchestrator(provider: Arc<ScriptedProvider>, retries: u32) -> Arc<Orchestrator> {
    let workflow = WorkflowConfig {
        transport_retries: retries,
        retry_backoff_ms: 1,
        ..WorkflowConfig::default()
    };
    Arc::new(Orchestrator::new(provider, &LlmConfig::default(), workflow))
}

fn message(text: &str) -> WorkflowCommand {
    WorkflowCommand::Message {
        text: text.into(),
        context: None,
    }
}

async fn run(
    orch: &Orchestrator,
    session: &Session,
    command: WorkflowCommand,
) -> (pw_domain::error::Result<()>, Vec<WorkflowEvent>) {
    let (tx, mut rx) = mpsc::channel(1024);
    let result = orch.run(session, command, &tx).await;
    drop(tx);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

/// Message → clarifying question → explicit structure stage.
async fn session_with_structure(provider: &ScriptedProvider, orch: &Orchestrator) -> Session {
    let session = Session::new(ModelTier::Standard);
    provider.push(Script::Reply(QUESTION.into()));
    let (result, _) = run(orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Clarifying);

    provider.push(Script::Reply(outline()));
    let (result, events) = run(
        orch,
        &session,
        WorkflowCommand::GenerateStructure { preferences: None },
    )
    .await;
    result.unwrap();
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Done {
            stage: Stage::GeneratingStructure
        })
    );
    session
}

async fn completed_session(provider: &ScriptedProvider, orch: &Orchestrator) -> Session {
    let session = Session::new(ModelTier::Standard);
    for reply in [outline(), hero_copy(), cta_copy("Visit today"), code("v1")] {
        provider.push(Script::Reply(reply));
    }
    let (result, _) = run(orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Complete);
    session
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Happy path
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn outline_in_reply_runs_through_to_complete() {
    let provider = ScriptedProvider::new(vec![
        Script::Reply(outline()),
        Script::Reply(hero_copy()),
        Script::Reply(cta_copy("Visit today")),
        Script::Reply(code("v1")),
    ]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, events) = run(&orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();

    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::Complete);
    assert_eq!(snap.status, SessionStatus::Complete);
    assert_eq!(snap.progress, 100);
    assert!(!snap.is_streaming);
    assert_eq!(
        snap.section_contents.keys().cloned().collect::<Vec<_>>(),
        vec!["section-1".to_string(), "section-2".to_string()]
    );
    let structure = snap.structure.unwrap();
    assert!(structure
        .sections
        .iter()
        .all(|s| s.status == SectionStatus::Complete));
    assert!(snap
        .generated_code
        .unwrap()
        .starts_with("export default function Page()"));
    assert_eq!(provider.requests().len(), 4);
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Done {
            stage: Stage::Complete
        })
    );
}

#[tokio::test]
async fn progress_never_decreases_and_copy_stays_in_its_band() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = session_with_structure(&provider, &orch).await;

    provider.push(Script::Reply(hero_copy()));
    provider.push(Script::Reply(cta_copy("Visit today")));
    let (result, events) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    result.unwrap();

    let during_copy: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::Progress { progress } => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(during_copy, vec![20, 40, 60]);
    assert!(during_copy[..2].iter().all(|p| (20..60).contains(p)));

    provider.push(Script::Reply(code("v1")));
    let (result, code_events) = run(&orch, &session, WorkflowCommand::GenerateCode).await;
    result.unwrap();

    let all: Vec<u8> = events
        .iter()
        .chain(code_events.iter())
        .filter_map(|e| match e {
            WorkflowEvent::Progress { progress } | WorkflowEvent::Stage { progress, .. } => {
                Some(*progress)
            }
            _ => None,
        })
        .collect();
    assert!(all.windows(2).all(|w| w[0] <= w[1]), "{all:?}");
    assert_eq!(all.last(), Some(&100));
}

#[tokio::test]
async fn cost_accumulates_once_per_call() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);
    for reply in [outline(), hero_copy(), cta_copy("Visit today"), code("v1")] {
        provider.push(Script::Reply(reply));
    }

    let (result, events) = run(&orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();

    let totals: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::Usage { total_cost, .. } => Some(*total_cost),
            _ => None,
        })
        .collect();
    assert_eq!(totals.len(), 4);
    assert!(totals.windows(2).all(|w| w[0] < w[1]));

    // 100 in + 50 out at $3 / $15 per million, four times.
    let expected = 4.0 * (100.0 * 3.0 + 50.0 * 15.0) / 1_000_000.0;
    let total = session.snapshot().cost.total_cost();
    assert!((total - expected).abs() < 1e-9, "{total}");
}

#[tokio::test]
async fn premium_tier_requests_premium_model() {
    let provider = ScriptedProvider::new(vec![Script::Reply(QUESTION.into())]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);
    session.set_model_tier(ModelTier::Premium);

    let (result, _) = run(&orch, &session, message("a page for my studio")).await;
    result.unwrap();
    assert_eq!(provider.requests()[0].model, "test-premium");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Understanding guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn question_without_context_waits_in_clarifying() {
    let provider = ScriptedProvider::new(vec![Script::Reply(QUESTION.into())]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, events) = run(
        &orch,
        &session,
        WorkflowCommand::Message {
            text: "I need a landing page".into(),
            context: Some(BusinessContext {
                business_name: Some("Crumb".into()),
                ..Default::default()
            }),
        },
    )
    .await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Clarifying);
    assert!(session.structure().is_none());
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Done {
            stage: Stage::Clarifying
        })
    );
}

#[tokio::test]
async fn sufficient_context_generates_structure_without_outline() {
    let provider = ScriptedProvider::new(vec![
        Script::Reply(QUESTION.into()),
        Script::Reply(outline()),
        Script::Reply(hero_copy()),
        Script::Reply(cta_copy("Visit today")),
        Script::Reply(code("v1")),
    ]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::Message {
            text: "I need a landing page".into(),
            context: Some(BusinessContext {
                business_name: Some("Crumb".into()),
                industry: Some("bakery".into()),
                target_audience: Some("commuters".into()),
                ..Default::default()
            }),
        },
    )
    .await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Complete);
    assert_eq!(provider.requests().len(), 5);
    assert_eq!(provider.remaining(), 0);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failures
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn unusable_section_reply_is_skipped() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = session_with_structure(&provider, &orch).await;

    provider.push(Script::Reply("Sorry, I lost my train of thought.".into()));
    provider.push(Script::Reply(cta_copy("Visit today")));
    let (result, events) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::GeneratingCopy);
    let contents = session.section_contents();
    assert_eq!(contents.keys().collect::<Vec<_>>(), vec!["section-2"]);
    let structure = session.structure().unwrap();
    assert_eq!(
        structure.section("section-1").unwrap().status,
        SectionStatus::Error
    );
    assert!(events.contains(&WorkflowEvent::Section {
        section_id: "section-1".into(),
        status: SectionStatus::Error,
    }));
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Done {
            stage: Stage::GeneratingCopy
        })
    );

    provider.push(Script::Reply(code("v1")));
    let (result, _) = run(&orch, &session, WorkflowCommand::GenerateCode).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Complete);
}

#[tokio::test]
async fn skipped_section_still_reaches_styling() {
    let provider = ScriptedProvider::new(vec![
        Script::Reply(outline()),
        Script::Reply("Sorry, I lost my train of thought.".into()),
        Script::Reply(cta_copy("Visit today")),
        Script::Fail(FailureClass::Provider, "overloaded"),
    ]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, events) = run(&orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();

    assert!(events.contains(&WorkflowEvent::Stage {
        stage: Stage::ApplyingStyles,
        progress: 70,
    }));
    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::Error);
    assert_eq!(snap.last_good_stage, Stage::ApplyingStyles);
    assert_eq!(
        snap.section_contents.keys().collect::<Vec<_>>(),
        vec!["section-2"]
    );
    assert!(snap.generated_code.is_none());
}

#[tokio::test]
async fn structure_without_json_fails_and_can_be_retried() {
    let provider = ScriptedProvider::new(vec![Script::Reply(QUESTION.into())]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);
    run(&orch, &session, message("I need a landing page")).await.0.unwrap();

    provider.push(Script::Reply("A hero and a call to action would work.".into()));
    let (result, events) = run(
        &orch,
        &session,
        WorkflowCommand::GenerateStructure { preferences: None },
    )
    .await;
    result.unwrap();

    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::Error);
    assert_eq!(snap.status, SessionStatus::Error);
    assert!(snap.structure.is_none());
    assert!(snap.error.is_some());
    assert!(matches!(events.last(), Some(WorkflowEvent::Error { .. })));

    provider.push(Script::Reply(outline()));
    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::GenerateStructure {
            preferences: Some("keep it short".into()),
        },
    )
    .await;
    result.unwrap();

    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::GeneratingStructure);
    assert_eq!(snap.status, SessionStatus::Active);
    assert!(snap.error.is_none());
    assert_eq!(snap.structure.unwrap().sections.len(), 2);
}

#[tokio::test]
async fn provider_failure_mid_copy_rolls_back_the_pass() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = session_with_structure(&provider, &orch).await;

    provider.push(Script::Reply(hero_copy()));
    provider.push(Script::Fail(FailureClass::Provider, "overloaded"));
    let (result, events) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Error);
    assert!(session.section_contents().is_empty());
    assert!(session
        .structure()
        .unwrap()
        .sections
        .iter()
        .all(|s| s.status == SectionStatus::Pending));
    assert_eq!(
        events.last(),
        Some(&WorkflowEvent::Error {
            message: "overloaded".into()
        })
    );
    assert!(!session.is_streaming());

    provider.push(Script::Reply(hero_copy()));
    provider.push(Script::Reply(cta_copy("Visit today")));
    let (result, _) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::GeneratingCopy);
    assert_eq!(session.section_contents().len(), 2);
}

#[tokio::test]
async fn transport_failure_before_any_text_is_retried() {
    let provider = ScriptedProvider::new(vec![
        Script::Fail(FailureClass::Transport, "connection reset"),
        Script::Reply(QUESTION.into()),
    ]);
    let orch = orchestrator(provider.clone(), 1);
    let session = Session::new(ModelTier::Standard);

    let (result, _) = run(&orch, &session, message("I need a landing page")).await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Clarifying);
    assert_eq!(provider.requests().len(), 2);
}

#[tokio::test]
async fn transport_failure_without_retries_is_an_error() {
    let provider = ScriptedProvider::new(vec![Script::Fail(
        FailureClass::Transport,
        "connection reset",
    )]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, _) = run(&orch, &session, message("I need a landing page")).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Error);
    assert_eq!(provider.requests().len(), 1);

    provider.push(Script::Reply(QUESTION.into()));
    let (result, _) = run(&orch, &session, message("Still there?")).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Clarifying);
}

#[tokio::test]
async fn commands_out_of_order_are_rejected() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Session::new(ModelTier::Standard);

    let (result, events) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    assert!(matches!(result, Err(Error::State(_))));
    assert!(events.is_empty());

    let (result, _) = run(&orch, &session, WorkflowCommand::GenerateCode).await;
    assert!(matches!(result, Err(Error::State(_))));

    let (result, _) = run(&orch, &session, message("   ")).await;
    assert!(matches!(result, Err(Error::Validation(_))));

    assert_eq!(session.stage(), Stage::Idle);
    assert!(provider.requests().is_empty());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Refinement & regeneration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn refine_replaces_the_component() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = completed_session(&provider, &orch).await;

    provider.push(Script::Reply(code("v2")));
    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::Refine {
            command: RefinementCommand::Shorten,
            target_section: None,
        },
    )
    .await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Complete);
    assert!(session.generated_code().unwrap().contains("v2"));
    let last = provider.requests().pop().unwrap();
    assert!(last.messages[0].content.contains("v1"));
}

#[tokio::test]
async fn regenerate_one_section_rebuilds_code() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = completed_session(&provider, &orch).await;

    provider.push(Script::Reply(cta_copy("Come say hi")));
    provider.push(Script::Reply(code("v3")));
    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::Regenerate {
            section_id: Some("section-2".into()),
        },
    )
    .await;
    result.unwrap();

    assert_eq!(session.stage(), Stage::Complete);
    match &session.section_contents()["section-2"] {
        SectionContent::Cta(pitch) => assert_eq!(pitch.headline, "Come say hi"),
        other => panic!("unexpected content: {other:?}"),
    }
    assert!(session.generated_code().unwrap().contains("v3"));
}

#[tokio::test]
async fn regenerate_unknown_section_is_rejected() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = completed_session(&provider, &orch).await;

    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::Regenerate {
            section_id: Some("section-9".into()),
        },
    )
    .await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(session.stage(), Stage::Complete);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Cancellation & reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn wait_for_delta(rx: &mut mpsc::Receiver<WorkflowEvent>) {
    loop {
        match rx.recv().await {
            Some(WorkflowEvent::Delta { .. }) => return,
            Some(_) => continue,
            None => panic!("workflow ended before streaming"),
        }
    }
}

async fn drain(mut rx: mpsc::Receiver<WorkflowEvent>) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn stop_keeps_partial_text() {
    let provider = ScriptedProvider::new(vec![Script::Hang("Let me think")]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Arc::new(Session::new(ModelTier::Standard));

    let mut rx = orch.spawn(session.clone(), message("I need a landing page"));
    wait_for_delta(&mut rx).await;
    assert!(session.is_streaming());

    assert_eq!(session.cancel_stream(), Some("Let me think".len()));
    let rest = drain(rx).await;
    assert_eq!(
        rest,
        vec![WorkflowEvent::Cancelled {
            stage: Stage::Understanding
        }]
    );

    let snap = session.snapshot();
    assert!(!snap.is_streaming);
    assert_eq!(snap.stage, Stage::Understanding);
    assert_eq!(snap.messages.last().unwrap().content, "Let me think");
    assert_eq!(session.cancel_stream(), None);
}

#[tokio::test]
async fn reset_mid_stream_clears_everything() {
    let provider = ScriptedProvider::new(vec![Script::Hang("Let me think")]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Arc::new(Session::new(ModelTier::Premium));

    let mut rx = orch.spawn(session.clone(), message("I need a landing page"));
    wait_for_delta(&mut rx).await;

    session.reset();
    let rest = drain(rx).await;
    assert_eq!(rest, vec![WorkflowEvent::Cancelled { stage: Stage::Idle }]);

    let once = session.snapshot();
    assert_eq!(once.stage, Stage::Idle);
    assert!(once.messages.is_empty());
    assert!(!once.is_streaming);
    assert_eq!(once.model_tier, ModelTier::Premium);

    session.reset();
    assert_eq!(session.snapshot(), once);

    provider.push(Script::Reply(QUESTION.into()));
    let (result, _) = run(&orch, &session, message("Starting over")).await;
    result.unwrap();
    assert_eq!(session.stage(), Stage::Clarifying);
}

#[tokio::test]
async fn reset_between_calls_discards_the_rest_of_the_run() {
    let provider = ScriptedProvider::new(vec![
        Script::Reply(outline()),
        Script::Reply(hero_copy()),
        Script::Reply(cta_copy("Visit today")),
        Script::Reply(code("v1")),
    ]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Arc::new(Session::new(ModelTier::Standard));

    // Capacity 1 parks the workflow right after each event it emits.
    let (tx, mut rx) = mpsc::channel(1);
    let task = {
        let orch = orch.clone();
        let session = session.clone();
        tokio::spawn(async move {
            orch.run(&session, message("I need a landing page for my bakery"), &tx)
                .await
        })
    };

    loop {
        match rx.recv().await {
            Some(WorkflowEvent::Stage {
                stage: Stage::Clarifying,
                ..
            }) => break,
            Some(_) => continue,
            None => panic!("workflow ended before clarifying"),
        }
    }
    session.reset();

    let rest = drain(rx).await;
    task.await.unwrap().unwrap();
    assert_eq!(
        rest.last(),
        Some(&WorkflowEvent::Cancelled { stage: Stage::Idle })
    );

    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::Idle);
    assert!(snap.structure.is_none());
    assert!(snap.messages.is_empty());
    assert!(snap.section_contents.is_empty());
    assert!(snap.generated_code.is_none());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn newer_command_replaces_the_running_one() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider.clone(), 0);
    let session = Arc::new(session_with_structure(&provider, &orch).await);

    provider.push(Script::Hang("Writing the hero"));
    let mut first = orch.spawn(session.clone(), WorkflowCommand::GenerateCopy);
    wait_for_delta(&mut first).await;

    provider.push(Script::Reply(hero_copy()));
    provider.push(Script::Reply(cta_copy("Visit today")));
    let second = orch.spawn(session.clone(), WorkflowCommand::GenerateCopy);

    let first_events = drain(first).await;
    assert_eq!(
        first_events.last(),
        Some(&WorkflowEvent::Cancelled {
            stage: Stage::GeneratingCopy
        })
    );
    let second_events = drain(second).await;
    assert_eq!(
        second_events.last(),
        Some(&WorkflowEvent::Done {
            stage: Stage::GeneratingCopy
        })
    );

    let snap = session.snapshot();
    assert_eq!(snap.stage, Stage::GeneratingCopy);
    assert_eq!(snap.section_contents.len(), 2);
    assert!(!snap.is_streaming);
    assert_eq!(provider.remaining(), 0);
}

#[tokio::test]
async fn failed_copy_pass_is_persisted_without_partial_copy() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SessionStore::new(dir.path()).unwrap());
    let provider = ScriptedProvider::new(vec![
        Script::Reply(QUESTION.into()),
        Script::Reply(outline()),
        Script::Reply(hero_copy()),
        Script::Fail(FailureClass::Provider, "HTTP 529 overloaded"),
    ]);
    let workflow = WorkflowConfig {
        retry_backoff_ms: 1,
        ..WorkflowConfig::default()
    };
    let orch = Orchestrator::new(provider, &LlmConfig::default(), workflow)
        .with_store(store.clone());
    let session = store.create(ModelTier::Standard);

    let (result, _) = run(&orch, &session, message("I need a landing page for my bakery")).await;
    result.unwrap();
    let (result, _) = run(
        &orch,
        &session,
        WorkflowCommand::GenerateStructure { preferences: None },
    )
    .await;
    result.unwrap();
    let (result, events) = run(&orch, &session, WorkflowCommand::GenerateCopy).await;
    result.unwrap();
    assert!(matches!(events.last(), Some(WorkflowEvent::Error { .. })));

    let reloaded = SessionStore::new(dir.path()).unwrap();
    let snap = reloaded.get(&session.id()).unwrap().snapshot();
    assert_eq!(snap.stage, Stage::Error);
    assert!(snap.section_contents.is_empty());
    assert!(snap.structure.is_some());
    assert!(snap.error.unwrap().contains("overloaded"));
}

#[tokio::test]
async fn spawned_rejection_arrives_as_error_event() {
    let provider = ScriptedProvider::new(vec![]);
    let orch = orchestrator(provider, 0);
    let session = Arc::new(Session::new(ModelTier::Standard));

    let events = drain(orch.spawn(session, WorkflowCommand::GenerateCode)).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], WorkflowEvent::Error { message } if message.contains("state")));
}
