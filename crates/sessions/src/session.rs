//! One generation session: the single source of truth for its state.
//!
//! All writes go through named mutations on a [`SessionWriter`], fenced to
//! the reset epoch it was taken at; readers get a cloned [`SessionSnapshot`].
//! Every mutation takes the state lock once, so no caller can observe a
//! half-applied change (in particular a half-reset session).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use pw_domain::context::BusinessContext;
use pw_domain::cost::{CostEstimate, ModelPricing, ModelTier};
use pw_domain::error::{Error, Result};
use pw_domain::message::{ChatMessage, Message, MessageMetadata, Role};
use pw_domain::page::{PageStructure, SectionContent, SectionStatus};
use pw_domain::stream::Usage;
use pw_domain::trace::TraceEvent;
use pw_domain::workflow::{SessionStatus, Stage};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Snapshot
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Observable session state. Also the persisted form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    pub stage: Stage,
    pub model_tier: ModelTier,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<PageStructure>,
    #[serde(default)]
    pub section_contents: BTreeMap<String, SectionContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_code: Option<String>,
    #[serde(default)]
    pub cost: CostEstimate,
    /// Informational percentage; never decreases until reset.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub context: BusinessContext,
    pub created_at: DateTime<Utc>,
    /// Stage to return to when retrying after an error.
    #[serde(default)]
    pub last_good_stage: Stage,
}

impl SessionSnapshot {
    fn empty(id: String, model_tier: ModelTier, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            status: SessionStatus::Idle,
            stage: Stage::Idle,
            model_tier,
            messages: Vec::new(),
            structure: None,
            section_contents: BTreeMap::new(),
            generated_code: None,
            cost: CostEstimate::default(),
            progress: 0,
            error: None,
            is_streaming: false,
            context: BusinessContext::default(),
            created_at,
            last_good_stage: Stage::Idle,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ActiveStream {
    generation: u64,
    token: CancellationToken,
    /// Index of the in-flight assistant message in `messages`.
    message_idx: usize,
}

pub struct Session {
    state: RwLock<SessionSnapshot>,
    stream: Mutex<Option<ActiveStream>>,
    /// Bumped for every stream and every reset. A guard whose generation
    /// no longer matches can not write.
    generation: Mutex<u64>,
    /// Bumped by reset only.
    epoch: AtomicU64,
}

impl Session {
    pub fn new(model_tier: ModelTier) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self::from_snapshot(SessionSnapshot::empty(id, model_tier, Utc::now()))
    }

    /// Rebuild a session from persisted state. A stream cannot survive a
    /// restart, so the streaming flag is cleared.
    pub fn from_snapshot(mut snapshot: SessionSnapshot) -> Self {
        snapshot.is_streaming = false;
        Self {
            state: RwLock::new(snapshot),
            stream: Mutex::new(None),
            generation: Mutex::new(0),
            epoch: AtomicU64::new(0),
        }
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn id(&self) -> String {
        self.state.read().id.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().clone()
    }

    pub fn stage(&self) -> Stage {
        self.state.read().stage
    }

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn model_tier(&self) -> ModelTier {
        self.state.read().model_tier
    }

    pub fn context(&self) -> BusinessContext {
        self.state.read().context.clone()
    }

    pub fn structure(&self) -> Option<PageStructure> {
        self.state.read().structure.clone()
    }

    pub fn section_contents(&self) -> BTreeMap<String, SectionContent> {
        self.state.read().section_contents.clone()
    }

    pub fn generated_code(&self) -> Option<String> {
        self.state.read().generated_code.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.state.read().is_streaming
    }

    /// Number of resets so far. Work started under an older epoch must not
    /// touch the session any more.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Conversation as sent to a provider: user/assistant turns only, empty
    /// (never-streamed) assistant messages dropped.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.state
            .read()
            .messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .filter_map(|m| ChatMessage::try_from(m).ok())
            .collect()
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Write access for work that starts now. Every write through the
    /// returned handle is refused once the session is reset.
    pub fn writer(&self) -> SessionWriter<'_> {
        SessionWriter {
            session: self,
            epoch: self.epoch(),
        }
    }

    /// Cancel the in-flight stream, keeping whatever text already arrived.
    /// Returns the number of characters retained, or `None` when nothing was
    /// streaming.
    pub fn cancel_stream(&self) -> Option<usize> {
        let mut active = self.stream.lock();
        let stream = active.take()?;
        stream.token.cancel();

        let mut state = self.state.write();
        state.is_streaming = false;
        let kept = state
            .messages
            .get(stream.message_idx)
            .map(|m| m.content.chars().count())
            .unwrap_or(0);

        TraceEvent::StreamCancelled {
            session_id: state.id.clone(),
            stage: state.stage.to_string(),
            partial_chars: kept,
        }
        .emit();
        Some(kept)
    }

    /// Leave `error` for the last stage that completed, clearing the error.
    /// Returns the stage the session is now in.
    pub fn recover(&self) -> Stage {
        let mut state = self.state.write();
        if state.stage == Stage::Error {
            state.stage = state.last_good_stage;
            state.status = match state.stage {
                Stage::Idle => SessionStatus::Idle,
                Stage::Complete => SessionStatus::Complete,
                _ => SessionStatus::Active,
            };
            state.error = None;
        }
        state.stage
    }

    pub fn set_model_tier(&self, tier: ModelTier) {
        self.state.write().model_tier = tier;
    }

    /// Clear every field in one step, keeping the id, creation time and
    /// tier. Any open stream is cancelled and can no longer write.
    pub fn reset(&self) {
        let had_stream = {
            let mut active = self.stream.lock();
            *self.generation.lock() += 1;
            self.epoch.fetch_add(1, Ordering::SeqCst);
            match active.take() {
                Some(stream) => {
                    stream.token.cancel();
                    true
                }
                None => false,
            }
        };

        let mut state = self.state.write();
        let fresh = SessionSnapshot::empty(state.id.clone(), state.model_tier, state.created_at);
        *state = fresh;

        TraceEvent::SessionReset {
            session_id: state.id.clone(),
            had_stream,
        }
        .emit();
    }

    fn is_live_stream(&self, generation: u64) -> bool {
        self.stream
            .lock()
            .as_ref()
            .is_some_and(|s| s.generation == generation && !s.token.is_cancelled())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Writer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The named mutations, fenced to the epoch the writer was taken at.
///
/// The epoch is compared while the state lock is held, and [`Session::reset`]
/// advances it before clearing the state, so a write that passes the check
/// is either wiped by the reset or lands after it was refused. Refused
/// writes return [`Error::Superseded`] and change nothing.
#[derive(Clone, Copy)]
pub struct SessionWriter<'a> {
    session: &'a Session,
    epoch: u64,
}

impl<'a> SessionWriter<'a> {
    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// `false` once the session has been reset since this writer was taken.
    pub fn is_current(&self) -> bool {
        self.session.epoch() == self.epoch
    }

    fn state(&self) -> Result<RwLockWriteGuard<'a, SessionSnapshot>> {
        let state = self.session.state.write();
        if !self.is_current() {
            return Err(Error::Superseded);
        }
        Ok(state)
    }

    /// Mark the session active and fold in any context supplied with the
    /// first message.
    pub fn start(&self, context: Option<BusinessContext>) -> Result<()> {
        let mut state = self.state()?;
        if state.status == SessionStatus::Idle {
            state.status = SessionStatus::Active;
        }
        if let Some(ctx) = context {
            state.context.merge(ctx);
        }
        Ok(())
    }

    pub fn merge_context(&self, context: BusinessContext) -> Result<()> {
        self.state()?.context.merge(context);
        Ok(())
    }

    /// Append a message and return its id.
    pub fn add_message(&self, message: Message) -> Result<String> {
        let id = message.id.clone();
        self.state()?.messages.push(message);
        Ok(id)
    }

    /// Open a new in-flight assistant message.
    ///
    /// Any stream still open is cancelled first, so at most one message is
    /// ever being appended to.
    pub fn begin_stream(&self) -> Result<StreamGuard<'a>> {
        let session = self.session;
        let mut active = session.stream.lock();
        // Reset advances the epoch under this lock.
        if !self.is_current() {
            return Err(Error::Superseded);
        }
        if let Some(prev) = active.take() {
            prev.token.cancel();
        }

        let generation = {
            let mut g = session.generation.lock();
            *g += 1;
            *g
        };
        let token = CancellationToken::new();

        let message_idx = {
            let mut state = session.state.write();
            state.messages.push(Message::assistant(String::new()));
            state.is_streaming = true;
            state.messages.len() - 1
        };

        *active = Some(ActiveStream {
            generation,
            token: token.clone(),
            message_idx,
        });

        Ok(StreamGuard {
            session,
            generation,
            token,
            finished: false,
        })
    }

    /// Replace the outline. Copy written for an earlier outline is dropped.
    pub fn set_structure(&self, structure: PageStructure) -> Result<()> {
        let mut state = self.state()?;
        state.structure = Some(structure);
        state.section_contents.clear();
        Ok(())
    }

    /// Store one section's copy. The id must belong to the current structure.
    pub fn set_section_content(&self, section_id: &str, content: SectionContent) -> Result<()> {
        let mut state = self.state()?;
        let structure = state
            .structure
            .as_mut()
            .ok_or_else(|| Error::State("no page structure yet".into()))?;
        let section = structure
            .sections
            .iter_mut()
            .find(|s| s.id == section_id)
            .ok_or_else(|| Error::State(format!("unknown section id: {section_id}")))?;
        section.status = SectionStatus::Complete;
        state
            .section_contents
            .insert(section_id.to_string(), content);
        Ok(())
    }

    /// Undo a failed copy pass: restore the contents held before it and put
    /// sections that lost their copy back to `pending`.
    pub fn rollback_section_contents(
        &self,
        previous: BTreeMap<String, SectionContent>,
    ) -> Result<()> {
        let mut state = self.state()?;
        let Some(structure) = state.structure.as_mut() else {
            return Ok(());
        };
        for section in structure.sections.iter_mut() {
            section.status = if previous.contains_key(&section.id) {
                SectionStatus::Complete
            } else {
                SectionStatus::Pending
            };
        }
        let kept = previous
            .into_iter()
            .filter(|(id, _)| structure.contains_section(id))
            .collect();
        state.section_contents = kept;
        Ok(())
    }

    pub fn set_section_status(&self, section_id: &str, status: SectionStatus) -> Result<()> {
        let mut state = self.state()?;
        if let Some(section) = state
            .structure
            .as_mut()
            .and_then(|s| s.sections.iter_mut().find(|s| s.id == section_id))
        {
            section.status = status;
        }
        Ok(())
    }

    pub fn set_generated_code(&self, code: String) -> Result<()> {
        self.state()?.generated_code = Some(code);
        Ok(())
    }

    /// Add one completed call's usage, priced for the tier it ran on.
    /// Returns the new session total.
    pub fn update_cost(&self, usage: &Usage, pricing: ModelPricing, model: &str) -> Result<f64> {
        let mut state = self.state()?;
        state.cost.add(usage, pricing, model);
        Ok(state.cost.total_cost())
    }

    /// Move to `stage`, rejecting moves the workflow does not allow.
    pub fn set_stage(&self, stage: Stage) -> Result<()> {
        let mut state = self.state()?;
        if !state.stage.can_transition_to(stage) {
            return Err(Error::State(format!(
                "cannot move from {} to {}",
                state.stage, stage
            )));
        }
        state.stage = stage;
        match stage {
            Stage::Error => state.status = SessionStatus::Error,
            Stage::Complete => {
                state.status = SessionStatus::Complete;
                state.last_good_stage = stage;
            }
            _ => {
                state.status = SessionStatus::Active;
                state.last_good_stage = stage;
            }
        }
        Ok(())
    }

    /// Record a failure: stage and status become `error`. Artifacts from
    /// earlier stages are left untouched.
    pub fn set_error(&self, message: impl Into<String>) -> Result<()> {
        let mut state = self.state()?;
        state.stage = Stage::Error;
        state.status = SessionStatus::Error;
        state.error = Some(message.into());
        Ok(())
    }

    /// Raise progress to `percent` (capped at 100); lower values are ignored.
    pub fn set_progress(&self, percent: u8) -> Result<u8> {
        let mut state = self.state()?;
        state.progress = state.progress.max(percent.min(100));
        Ok(state.progress)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream guard
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write access to the in-flight assistant message.
///
/// Once the stream is cancelled, superseded or the session reset, every
/// write is refused. Dropping the guard without [`finish`](Self::finish)
/// clears the streaming flag, so a failed stage never leaves it set.
pub struct StreamGuard<'a> {
    session: &'a Session,
    generation: u64,
    token: CancellationToken,
    finished: bool,
}

impl StreamGuard<'_> {
    /// Resolves when this stream is cancelled.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_live(&self) -> bool {
        self.session.is_live_stream(self.generation)
    }

    /// Append one delta to the in-flight message. Returns `false` (and
    /// writes nothing) when the stream is no longer live.
    pub fn append(&self, delta: &str) -> bool {
        let active = self.session.stream.lock();
        let Some(stream) = active
            .as_ref()
            .filter(|s| s.generation == self.generation && !s.token.is_cancelled())
        else {
            return false;
        };
        let mut state = self.session.state.write();
        match state.messages.get_mut(stream.message_idx) {
            Some(msg) => {
                msg.content.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Text received so far.
    pub fn content(&self) -> String {
        let active = self.session.stream.lock();
        let idx = active
            .as_ref()
            .filter(|s| s.generation == self.generation)
            .map(|s| s.message_idx);
        let state = self.session.state.read();
        idx.and_then(|i| state.messages.get(i))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Close the stream and attach accounting. Returns the final text, or
    /// `None` if the stream was cancelled or superseded meanwhile.
    pub fn finish(mut self, metadata: MessageMetadata) -> Option<String> {
        self.finished = true;
        let mut active = self.session.stream.lock();
        let live = active
            .as_ref()
            .is_some_and(|s| s.generation == self.generation && !s.token.is_cancelled());
        if !live {
            return None;
        }
        let stream = active.take()?;

        let mut state = self.session.state.write();
        state.is_streaming = false;
        let msg = state.messages.get_mut(stream.message_idx)?;
        msg.metadata = Some(metadata);
        Some(msg.content.clone())
    }

    /// Close the stream without a result (provider error). The partial
    /// text stays in the conversation.
    pub fn abandon(mut self) {
        self.finished = true;
        self.release();
    }

    fn release(&self) {
        let mut active = self.session.stream.lock();
        if active
            .as_ref()
            .is_some_and(|s| s.generation == self.generation)
        {
            *active = None;
            self.session.state.write().is_streaming = false;
        }
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}
