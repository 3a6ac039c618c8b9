//! Registry of live sessions.
//!
//! With a state path configured, snapshots are kept in
//! `state_path/sessions/sessions.json`, written on [`SessionStore::flush`]
//! and loaded back when the store is created.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use pw_domain::cost::ModelTier;
use pw_domain::error::{Error, Result};

use crate::session::{Session, SessionSnapshot};

pub struct SessionStore {
    sessions_path: Option<PathBuf>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
    /// An in-memory store.
    pub fn in_memory() -> Self {
        Self {
            sessions_path: None,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Load or create the store at `state_path/sessions/sessions.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        let dir = state_path.join("sessions");
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;

        let sessions_path = dir.join("sessions.json");
        let snapshots: Vec<SessionSnapshot> = if sessions_path.exists() {
            let raw = std::fs::read_to_string(&sessions_path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %sessions_path.display(), "ignoring unreadable session file");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let sessions: HashMap<String, Arc<Session>> = snapshots
            .into_iter()
            .map(|snap| (snap.id.clone(), Arc::new(Session::from_snapshot(snap))))
            .collect();

        tracing::info!(
            sessions = sessions.len(),
            path = %sessions_path.display(),
            "session store loaded"
        );

        Ok(Self {
            sessions_path: Some(sessions_path),
            sessions: RwLock::new(sessions),
        })
    }

    /// Open the configured store, or an in-memory one when no path is set.
    pub fn open(state_path: Option<&Path>) -> Result<Self> {
        match state_path {
            Some(path) => Self::new(path),
            None => Ok(Self::in_memory()),
        }
    }

    pub fn create(&self, tier: ModelTier) -> Arc<Session> {
        let session = Arc::new(Session::new(tier));
        let id = session.id();
        tracing::debug!(session_id = %id, tier = tier.as_str(), "session created");
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Snapshots of every session, oldest first.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snaps: Vec<SessionSnapshot> =
            self.sessions.read().values().map(|s| s.snapshot()).collect();
        snaps.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snaps
    }

    /// Drop a session and reset it, so work still running on it stops
    /// writing. Returns `false` if unknown.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(session) => {
                session.reset();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Persist every session snapshot. A no-op for in-memory stores.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.sessions_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.list())
            .map_err(|e| Error::Other(format!("serializing sessions: {e}")))?;
        std::fs::write(path, json).map_err(Error::Io)?;
        Ok(())
    }
}
