//! Per-session command serialization.
//!
//! Only one workflow command runs per session at a time. A newer command
//! cancels the one in flight and waits for it to release the session
//! before starting, so two commands never write to the same session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use pw_domain::error::{Error, Result};

struct Slot {
    gate: Arc<Semaphore>,
    /// Cancellation for the command currently holding (or about to hold)
    /// the gate.
    running: Mutex<Option<CancellationToken>>,
}

/// Exclusive right to run a command on one session. Released on drop.
pub struct CommandPermit {
    _permit: OwnedSemaphorePermit,
    token: CancellationToken,
}

impl CommandPermit {
    /// Fires when a newer command on the same session wants to start.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Manages per-session command locks.
///
/// Each session id maps to a `Semaphore(1)` plus the cancellation token of
/// the command that holds it.
#[derive(Default)]
pub struct SessionLockMap {
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever command is running on `session_id`, then wait for
    /// the session to be free.
    pub async fn acquire(&self, session_id: &str) -> Result<CommandPermit> {
        let slot = {
            let mut slots = self.slots.lock();
            slots
                .entry(session_id.to_owned())
                .or_insert_with(|| {
                    Arc::new(Slot {
                        gate: Arc::new(Semaphore::new(1)),
                        running: Mutex::new(None),
                    })
                })
                .clone()
        };

        let token = CancellationToken::new();
        if let Some(previous) = slot.running.lock().replace(token.clone()) {
            if slot.gate.available_permits() == 0 {
                tracing::debug!(session_id, "superseding running command");
            }
            previous.cancel();
        }

        let permit = slot
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Error::State("session command lock closed".into()))?;

        // A still newer command may have arrived while this one waited.
        if token.is_cancelled() {
            return Err(Error::Superseded);
        }
        Ok(CommandPermit {
            _permit: permit,
            token,
        })
    }

    /// Number of tracked sessions.
    pub fn session_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Forget a session's lock, e.g. after the session was deleted.
    /// A command still holding the permit keeps it until it finishes.
    pub fn remove(&self, session_id: &str) {
        self.slots.lock().remove(session_id);
    }
}
