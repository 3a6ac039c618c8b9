//! The generation workflow: one provider call per stage, driven through
//! the session's named mutations.
//!
//! Entry points: [`Orchestrator::run`] executes one command against a
//! session, reporting over an `mpsc` channel of [`WorkflowEvent`]s;
//! [`Orchestrator::spawn`] does the same on a background task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use pw_domain::config::{LlmConfig, WorkflowConfig};
use pw_domain::context::BusinessContext;
use pw_domain::cost::PriceTable;
use pw_domain::error::{Error, ExtractionError, FailureClass, Result};
use pw_domain::message::{ChatMessage, Message, MessageMetadata};
use pw_domain::page::{PageSection, PageStructure, SectionStatus};
use pw_domain::stream::{StreamEvent, Usage};
use pw_domain::trace::TraceEvent;
use pw_domain::workflow::Stage;
use pw_prompts::{Prompt, RefinementCommand};
use pw_providers::{CompletionRequest, LlmProvider};
use pw_sessions::{Session, SessionStore, SessionWriter, StreamGuard};

use super::extract;
use super::progress;
use super::session_lock::SessionLockMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Commands & events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What the caller asks the workflow to do next.
#[derive(Debug, Clone)]
pub enum WorkflowCommand {
    /// A user chat message. Starts the session when idle, otherwise
    /// continues the clarifying conversation.
    Message {
        text: String,
        context: Option<BusinessContext>,
    },
    GenerateStructure {
        preferences: Option<String>,
    },
    GenerateCopy,
    GenerateCode,
    Refine {
        command: RefinementCommand,
        target_section: Option<String>,
    },
    /// Rewrite one section's copy (or all of it) and rebuild the code.
    Regenerate {
        section_id: Option<String>,
    },
}

impl WorkflowCommand {
    fn name(&self) -> &'static str {
        match self {
            WorkflowCommand::Message { .. } => "message",
            WorkflowCommand::GenerateStructure { .. } => "structure",
            WorkflowCommand::GenerateCopy => "copy",
            WorkflowCommand::GenerateCode => "code",
            WorkflowCommand::Refine { .. } => "refine",
            WorkflowCommand::Regenerate { .. } => "regenerate",
        }
    }
}

/// Events emitted while a command runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The session entered a stage.
    Stage { stage: Stage, progress: u8 },
    /// Text streamed into the in-flight assistant message.
    Delta { content: String },
    /// A section's copy changed status.
    #[serde(rename_all = "camelCase")]
    Section {
        section_id: String,
        status: SectionStatus,
    },
    Progress { progress: u8 },
    /// One provider call completed; `total_cost` is the session total.
    #[serde(rename_all = "camelCase")]
    Usage { usage: Usage, total_cost: f64 },
    Error { message: String },
    /// The in-flight stream was stopped (stop, reset or a newer request).
    Cancelled { stage: Stage },
    /// The command finished; the session rests in `stage`.
    Done { stage: Stage },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call outcomes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of one provider call after retries.
enum CallOutcome {
    Completed(String),
    Failed { message: String, class: FailureClass },
    Cancelled,
}

/// Result of a single attempt.
enum Attempt {
    Done {
        text: String,
        usage: Usage,
        model: Option<String>,
    },
    Failed {
        message: String,
        class: FailureClass,
        streamed: bool,
    },
    Cancelled,
}

/// How a stage ended.
enum Flow {
    Continue,
    /// The stage failed; the session is in `error`.
    Failed,
    /// The stream was cancelled; the session stays where it was.
    Stopped,
}

/// How one section's copy call ended. A provider failure is handed back
/// unrecorded so the caller can undo the pass before reporting it.
enum SectionOutcome {
    /// Copy stored, or the reply was unusable and the section skipped.
    Finished,
    Failed { message: String, class: FailureClass },
    Stopped,
}

/// One command's hold on a session: writes fenced to the epoch the command
/// started in, and the signal that a newer command wants the session.
struct Run<'a> {
    w: SessionWriter<'a>,
    cancel: CancellationToken,
}

impl<'a> Run<'a> {
    fn session(&self) -> &'a Session {
        self.w.session()
    }

    fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() || !self.w.is_current() {
            return Err(Error::Superseded);
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    pricing: PriceTable,
    max_tokens: u32,
    workflow: WorkflowConfig,
    store: Option<Arc<SessionStore>>,
    locks: SessionLockMap,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, llm: &LlmConfig, workflow: WorkflowConfig) -> Self {
        Self {
            provider,
            pricing: llm.pricing,
            max_tokens: llm.max_tokens,
            workflow,
            store: None,
            locks: SessionLockMap::new(),
        }
    }

    /// Flush `store` to disk after every completed stage.
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Drop the command lock of a deleted session.
    pub fn forget(&self, session_id: &str) {
        self.locks.remove(session_id);
    }

    /// Run `command` on a background task and return its event channel.
    ///
    /// A rejected command (wrong stage, missing input) arrives as a single
    /// [`WorkflowEvent::Error`].
    pub fn spawn(
        self: &Arc<Self>,
        session: Arc<Session>,
        command: WorkflowCommand,
    ) -> mpsc::Receiver<WorkflowEvent> {
        let (tx, rx) = mpsc::channel::<WorkflowEvent>(64);
        let this = Arc::clone(self);
        let span = tracing::info_span!(
            "workflow",
            session_id = %session.id(),
            command = command.name(),
        );
        tokio::spawn(tracing::Instrument::instrument(
            async move {
                if let Err(e) = this.run(&session, command, &tx).await {
                    tracing::debug!(error = %e, "workflow command rejected");
                    let _ = tx
                        .send(WorkflowEvent::Error {
                            message: e.to_string(),
                        })
                        .await;
                }
            },
            span,
        ));
        rx
    }

    /// Execute one command.
    ///
    /// A command already running on the session is cancelled first, and
    /// this one starts once it has let go. Returns `Err` only when the
    /// command is rejected before any provider call. Failures during a
    /// stage move the session to `error` and are reported as events. Work
    /// overtaken by a reset or a newer command ends with
    /// [`WorkflowEvent::Cancelled`] and writes nothing further.
    pub async fn run(
        &self,
        session: &Session,
        command: WorkflowCommand,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        let result = match self.locks.acquire(&session.id()).await {
            Ok(permit) => {
                let cancel = permit.token().clone();
                let result = self.execute(session, command, cancel, events).await;
                drop(permit);
                result
            }
            Err(e) => Err(e),
        };

        match result {
            Err(Error::Superseded) => {
                tracing::debug!(session_id = %session.id(), "command superseded");
                let _ = events
                    .send(WorkflowEvent::Cancelled {
                        stage: session.stage(),
                    })
                    .await;
                Ok(())
            }
            other => other,
        }
    }

    async fn execute(
        &self,
        session: &Session,
        command: WorkflowCommand,
        cancel: CancellationToken,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        if session.stage() == Stage::Error {
            let back = session.recover();
            tracing::info!(session_id = %session.id(), stage = %back, "retrying after error");
        }
        let run = Run {
            w: session.writer(),
            cancel,
        };

        let flow = match command {
            WorkflowCommand::Message { text, context } => {
                self.message(&run, text, context, events).await?
            }
            WorkflowCommand::GenerateStructure { preferences } => {
                require_stage(
                    session,
                    &[
                        Stage::Idle,
                        Stage::Understanding,
                        Stage::Clarifying,
                        Stage::GeneratingStructure,
                    ],
                    "generate a structure",
                )?;
                self.structure_stage(&run, preferences.as_deref(), events)
                    .await?
            }
            WorkflowCommand::GenerateCopy => {
                require_stage(
                    session,
                    &[Stage::GeneratingStructure, Stage::GeneratingCopy],
                    "generate copy",
                )?;
                let structure = require_structure(session)?;
                self.copy_stage(&run, &structure, events).await?
            }
            WorkflowCommand::GenerateCode => {
                require_stage(
                    session,
                    &[Stage::GeneratingCopy, Stage::ApplyingStyles, Stage::Previewing],
                    "generate code",
                )?;
                require_structure(session)?;
                self.code_stage(&run, events).await?
            }
            WorkflowCommand::Refine {
                command,
                target_section,
            } => {
                require_stage(
                    session,
                    &[Stage::Complete, Stage::GeneratingCopy, Stage::ApplyingStyles],
                    "refine",
                )?;
                let code = session
                    .generated_code()
                    .ok_or_else(|| Error::State("no generated code to refine".into()))?;
                self.refine(&run, command, &code, target_section.as_deref(), events)
                    .await?
            }
            WorkflowCommand::Regenerate { section_id } => {
                require_stage(
                    session,
                    &[Stage::Complete, Stage::GeneratingCopy],
                    "regenerate",
                )?;
                if session.generated_code().is_none() {
                    return Err(Error::State("nothing generated yet".into()));
                }
                self.regenerate(&run, section_id.as_deref(), events).await?
            }
        };

        if let Flow::Continue = flow {
            let _ = events
                .send(WorkflowEvent::Done {
                    stage: session.stage(),
                })
                .await;
        }
        Ok(())
    }

    // ── Stages ─────────────────────────────────────────────────────

    async fn message(
        &self,
        run: &Run<'_>,
        text: String,
        context: Option<BusinessContext>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        let session = run.session();
        if text.trim().is_empty() {
            return Err(Error::Validation("message must not be empty".into()));
        }
        require_stage(
            session,
            &[Stage::Idle, Stage::Understanding, Stage::Clarifying],
            "send a message",
        )?;

        if session.stage() == Stage::Idle {
            run.w.start(context)?;
            self.enter(run, Stage::Understanding, events).await?;
        } else if let Some(ctx) = context {
            run.w.merge_context(ctx)?;
        }
        run.w.add_message(Message::user(text.trim()))?;

        let business = session.context();
        let prompt = pw_prompts::understanding(&text, &business);
        let reply = match self
            .call(run, Stage::Understanding, prompt.system, session.history(), events)
            .await?
        {
            CallOutcome::Completed(reply) => reply,
            CallOutcome::Failed { message, class } => {
                self.fail(run, Stage::Understanding, class, message, events)
                    .await?;
                return Ok(Flow::Failed);
            }
            CallOutcome::Cancelled => return Ok(self.cancelled(session, events).await),
        };

        self.enter(run, Stage::Clarifying, events).await?;
        self.persist();

        match extract::parse_structure(&reply) {
            Ok(outline) => {
                tracing::debug!(sections = outline.sections.len(), "outline extracted from conversation");
                self.enter(run, Stage::GeneratingStructure, events).await?;
                run.w.set_structure(outline.clone())?;
                self.persist();
                self.advance_from_structure(run, &outline, events).await
            }
            Err(e) => {
                if !matches!(e, ExtractionError::Missing { .. }) {
                    tracing::warn!(error = %e, "outline in reply could not be used");
                }
                if business.is_sufficient(&self.workflow.required_context_keys) {
                    tracing::debug!("context is sufficient, proceeding without an outline");
                    match self.structure_stage(run, None, events).await? {
                        Flow::Continue => match session.structure() {
                            Some(structure) => {
                                self.advance_from_structure(run, &structure, events).await
                            }
                            None => Ok(Flow::Continue),
                        },
                        halted => Ok(halted),
                    }
                } else {
                    Ok(Flow::Continue)
                }
            }
        }
    }

    /// Copy then code, once a structure is in place.
    async fn advance_from_structure(
        &self,
        run: &Run<'_>,
        structure: &PageStructure,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        match self.copy_stage(run, structure, events).await? {
            Flow::Continue => self.code_stage(run, events).await,
            halted => Ok(halted),
        }
    }

    async fn structure_stage(
        &self,
        run: &Run<'_>,
        preferences: Option<&str>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        let session = run.session();
        self.enter(run, Stage::GeneratingStructure, events).await?;

        let prompt = pw_prompts::structure(&session.context(), preferences);
        let reply = match self
            .call_single(run, Stage::GeneratingStructure, prompt, events)
            .await?
        {
            CallOutcome::Completed(reply) => reply,
            CallOutcome::Failed { message, class } => {
                self.fail(run, Stage::GeneratingStructure, class, message, events)
                    .await?;
                return Ok(Flow::Failed);
            }
            CallOutcome::Cancelled => return Ok(self.cancelled(session, events).await),
        };

        match extract::parse_structure(&reply) {
            Ok(structure) => {
                run.w.set_structure(structure)?;
                self.persist();
                Ok(Flow::Continue)
            }
            Err(e) => {
                self.fail_extraction(run, Stage::GeneratingStructure, e, events)
                    .await?;
                Ok(Flow::Failed)
            }
        }
    }

    /// Write copy for every section in order. A section whose reply has no
    /// usable JSON is skipped; a provider failure undoes the whole pass
    /// before the failure is recorded.
    async fn copy_stage(
        &self,
        run: &Run<'_>,
        structure: &PageStructure,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        self.enter(run, Stage::GeneratingCopy, events).await?;
        let before = run.session().section_contents();

        let sections = structure.ordered_sections();
        let total = sections.len();
        for (done, section) in sections.into_iter().enumerate() {
            let percent = run.w.set_progress(progress::for_copy(done, total))?;
            let _ = events.send(WorkflowEvent::Progress { progress: percent }).await;

            match self.section(run, structure, section, events).await? {
                SectionOutcome::Finished => {}
                SectionOutcome::Failed { message, class } => {
                    run.w.rollback_section_contents(before)?;
                    self.fail(run, Stage::GeneratingCopy, class, message, events)
                        .await?;
                    return Ok(Flow::Failed);
                }
                SectionOutcome::Stopped => return Ok(Flow::Stopped),
            }
        }

        let percent = run.w.set_progress(progress::for_copy(total, total))?;
        let _ = events.send(WorkflowEvent::Progress { progress: percent }).await;
        self.persist();
        Ok(Flow::Continue)
    }

    /// One section's copy call.
    async fn section(
        &self,
        run: &Run<'_>,
        structure: &PageStructure,
        section: &PageSection,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<SectionOutcome> {
        let session = run.session();
        self.section_status(run, &section.id, SectionStatus::Generating, events)
            .await?;

        let prompt =
            pw_prompts::section_copy(section.kind, &section.title, &session.context(), structure);
        let reply = match self
            .call_single(run, Stage::GeneratingCopy, prompt, events)
            .await?
        {
            CallOutcome::Completed(reply) => reply,
            CallOutcome::Failed { message, class } => {
                return Ok(SectionOutcome::Failed { message, class });
            }
            CallOutcome::Cancelled => {
                self.cancelled(session, events).await;
                return Ok(SectionOutcome::Stopped);
            }
        };

        let stored = extract::parse_section_copy(&reply, section.kind)
            .map_err(Error::from)
            .and_then(|content| run.w.set_section_content(&section.id, content));
        match stored {
            Ok(()) => {
                self.section_status(run, &section.id, SectionStatus::Complete, events)
                    .await?;
            }
            Err(Error::Superseded) => return Err(Error::Superseded),
            Err(e) => {
                TraceEvent::SectionSkipped {
                    session_id: session.id(),
                    section_id: section.id.clone(),
                    reason: e.to_string(),
                }
                .emit();
                self.section_status(run, &section.id, SectionStatus::Error, events)
                    .await?;
            }
        }
        Ok(SectionOutcome::Finished)
    }

    async fn code_stage(
        &self,
        run: &Run<'_>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        let session = run.session();
        let structure = require_structure(session)?;
        self.enter(run, Stage::ApplyingStyles, events).await?;

        let prompt = pw_prompts::code_generation(
            &structure,
            &session.section_contents(),
            &session.context(),
        );
        self.code_call(run, prompt, events).await
    }

    async fn refine(
        &self,
        run: &Run<'_>,
        command: RefinementCommand,
        current_code: &str,
        target_section: Option<&str>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        self.enter(run, Stage::ApplyingStyles, events).await?;
        let prompt = pw_prompts::refinement(command, current_code, target_section);
        self.code_call(run, prompt, events).await
    }

    async fn regenerate(
        &self,
        run: &Run<'_>,
        section_id: Option<&str>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        let session = run.session();
        let structure = require_structure(session)?;
        let Some(id) = section_id else {
            return self.advance_from_structure(run, &structure, events).await;
        };
        let section = structure
            .section(id)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("unknown section id: {id}")))?;

        let had_copy = session.section_contents().contains_key(id);
        self.enter(run, Stage::GeneratingCopy, events).await?;
        match self.section(run, &structure, &section, events).await? {
            SectionOutcome::Finished => self.code_stage(run, events).await,
            SectionOutcome::Failed { message, class } => {
                if had_copy {
                    run.w.set_section_status(id, SectionStatus::Complete)?;
                }
                self.fail(run, Stage::GeneratingCopy, class, message, events)
                    .await?;
                Ok(Flow::Failed)
            }
            SectionOutcome::Stopped => {
                if had_copy && run.w.is_current() {
                    run.w.set_section_status(id, SectionStatus::Complete)?;
                }
                Ok(Flow::Stopped)
            }
        }
    }

    /// Shared tail of code generation and refinement: the reply must carry
    /// a code block, which becomes the new artifact.
    async fn code_call(
        &self,
        run: &Run<'_>,
        prompt: Prompt,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<Flow> {
        let reply = match self
            .call_single(run, Stage::ApplyingStyles, prompt, events)
            .await?
        {
            CallOutcome::Completed(reply) => reply,
            CallOutcome::Failed { message, class } => {
                self.fail(run, Stage::ApplyingStyles, class, message, events)
                    .await?;
                return Ok(Flow::Failed);
            }
            CallOutcome::Cancelled => return Ok(self.cancelled(run.session(), events).await),
        };

        let code = match extract::code_block(&reply) {
            Ok(code) => code.to_string(),
            Err(e) => {
                self.fail_extraction(run, Stage::ApplyingStyles, e, events)
                    .await?;
                return Ok(Flow::Failed);
            }
        };

        self.enter(run, Stage::Previewing, events).await?;
        run.w.set_generated_code(code)?;
        self.enter(run, Stage::Complete, events).await?;
        self.persist();
        Ok(Flow::Continue)
    }

    // ── Provider calls ─────────────────────────────────────────────

    /// A call whose whole input is one user turn.
    async fn call_single(
        &self,
        run: &Run<'_>,
        stage: Stage,
        prompt: Prompt,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<CallOutcome> {
        let messages = vec![ChatMessage::user(prompt.user)];
        self.call(run, stage, prompt.system, messages, events).await
    }

    /// Open one streamed completion into a fresh in-flight message.
    ///
    /// Transport failures are retried (up to `workflow.transport_retries`)
    /// only while nothing has been streamed yet. Usage is added to the
    /// session cost once, when the call completes.
    async fn call(
        &self,
        run: &Run<'_>,
        stage: Stage,
        system: String,
        messages: Vec<ChatMessage>,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<CallOutcome> {
        let tier = run.session().model_tier();
        let req = CompletionRequest {
            model: self.provider.model_for(tier),
            system,
            messages,
            max_tokens: self.max_tokens,
        };

        let mut attempt: u32 = 0;
        loop {
            run.check()?;

            let started = Instant::now();
            let guard = run.w.begin_stream()?;
            let result = self
                .stream_once(&guard, &run.cancel, req.clone(), events)
                .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            match result {
                Attempt::Done { text, usage, model } => {
                    let model = model.unwrap_or_else(|| req.model.clone());
                    let metadata = MessageMetadata {
                        tokens_used: Some(usage.total()),
                        model: Some(model.clone()),
                    };
                    if guard.finish(metadata).is_none() {
                        return Ok(CallOutcome::Cancelled);
                    }
                    self.record_request(stage, &model, duration_ms, Some(&usage));
                    let total_cost =
                        run.w
                            .update_cost(&usage, self.pricing.for_tier(tier), &model)?;
                    let _ = events
                        .send(WorkflowEvent::Usage { usage, total_cost })
                        .await;
                    return Ok(CallOutcome::Completed(text));
                }
                Attempt::Cancelled => {
                    drop(guard);
                    return Ok(CallOutcome::Cancelled);
                }
                Attempt::Failed {
                    message,
                    class,
                    streamed,
                } => {
                    guard.abandon();
                    self.record_request(stage, &req.model, duration_ms, None);

                    let retryable = class == FailureClass::Transport && !streamed;
                    if retryable && attempt < self.workflow.transport_retries {
                        let backoff = self
                            .workflow
                            .retry_backoff_ms
                            .saturating_mul(1u64 << attempt.min(16));
                        attempt += 1;
                        tracing::warn!(
                            stage = %stage,
                            attempt,
                            backoff_ms = backoff,
                            error = %message,
                            "transport failure, retrying"
                        );
                        tokio::select! {
                            _ = run.cancel.cancelled() => return Ok(CallOutcome::Cancelled),
                            _ = tokio::time::sleep(Duration::from_millis(backoff)) => {}
                        }
                        continue;
                    }
                    return Ok(CallOutcome::Failed { message, class });
                }
            }
        }
    }

    async fn stream_once(
        &self,
        guard: &StreamGuard<'_>,
        superseded: &CancellationToken,
        req: CompletionRequest,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Attempt {
        let mut stream = tokio::select! {
            biased;
            _ = guard.token().cancelled() => return Attempt::Cancelled,
            _ = superseded.cancelled() => return Attempt::Cancelled,
            s = self.provider.stream(req) => s,
        };

        let mut text = String::new();
        let mut model = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = guard.token().cancelled() => return Attempt::Cancelled,
                _ = superseded.cancelled() => return Attempt::Cancelled,
                ev = stream.next() => ev,
            };
            match next {
                Some(StreamEvent::Start { model: m }) => model = Some(m),
                Some(StreamEvent::Delta { content }) => {
                    if !guard.append(&content) {
                        return Attempt::Cancelled;
                    }
                    text.push_str(&content);
                    let _ = events.send(WorkflowEvent::Delta { content }).await;
                }
                Some(StreamEvent::Complete { usage }) => {
                    return Attempt::Done { text, usage, model };
                }
                Some(StreamEvent::Error { message, class }) => {
                    return Attempt::Failed {
                        message,
                        class,
                        streamed: !text.is_empty(),
                    };
                }
                None => {
                    return Attempt::Failed {
                        message: "provider stream ended without completing".into(),
                        class: FailureClass::Transport,
                        streamed: !text.is_empty(),
                    };
                }
            }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    async fn enter(
        &self,
        run: &Run<'_>,
        stage: Stage,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        run.check()?;
        run.w.set_stage(stage)?;
        let percent = run.w.set_progress(progress::for_stage(stage))?;
        TraceEvent::StageEntered {
            session_id: run.session().id(),
            stage: stage.to_string(),
            progress: percent,
        }
        .emit();
        let _ = events
            .send(WorkflowEvent::Stage {
                stage,
                progress: percent,
            })
            .await;
        Ok(())
    }

    async fn section_status(
        &self,
        run: &Run<'_>,
        section_id: &str,
        status: SectionStatus,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        if status != SectionStatus::Complete {
            run.w.set_section_status(section_id, status)?;
        }
        let _ = events
            .send(WorkflowEvent::Section {
                section_id: section_id.to_string(),
                status,
            })
            .await;
        Ok(())
    }

    async fn fail(
        &self,
        run: &Run<'_>,
        stage: Stage,
        class: FailureClass,
        message: String,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        let class_name = serde_json::to_value(class)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        self.record_failure(run, stage, class_name, message, events)
            .await
    }

    async fn fail_extraction(
        &self,
        run: &Run<'_>,
        stage: Stage,
        err: ExtractionError,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        let message = Error::from(err).to_string();
        self.record_failure(run, stage, "extraction".into(), message, events)
            .await
    }

    async fn record_failure(
        &self,
        run: &Run<'_>,
        stage: Stage,
        class: String,
        message: String,
        events: &mpsc::Sender<WorkflowEvent>,
    ) -> Result<()> {
        run.w.set_error(message.clone())?;
        TraceEvent::StageFailed {
            session_id: run.session().id(),
            stage: stage.to_string(),
            class,
            message: message.clone(),
        }
        .emit();
        self.persist();
        let _ = events.send(WorkflowEvent::Error { message }).await;
        Ok(())
    }

    async fn cancelled(&self, session: &Session, events: &mpsc::Sender<WorkflowEvent>) -> Flow {
        let _ = events
            .send(WorkflowEvent::Cancelled {
                stage: session.stage(),
            })
            .await;
        Flow::Stopped
    }

    fn record_request(&self, stage: Stage, model: &str, duration_ms: u64, usage: Option<&Usage>) {
        TraceEvent::LlmRequest {
            provider: self.provider.provider_id().to_string(),
            model: model.to_string(),
            stage: stage.to_string(),
            duration_ms,
            input_tokens: usage.map(|u| u.input_tokens),
            output_tokens: usage.map(|u| u.output_tokens),
            estimated: usage.is_some_and(|u| u.estimated),
        }
        .emit();
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.flush() {
                tracing::warn!(error = %e, "session store flush failed");
            }
        }
    }
}

fn require_stage(session: &Session, allowed: &[Stage], action: &str) -> Result<()> {
    let stage = session.stage();
    if allowed.contains(&stage) {
        Ok(())
    } else {
        Err(Error::State(format!("cannot {action} while {stage}")))
    }
}

fn require_structure(session: &Session) -> Result<PageStructure> {
    session
        .structure()
        .ok_or_else(|| Error::State("no page structure yet".into()))
}
