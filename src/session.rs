//! Session-keyed conversation memories.
//!
//! Each session id maps to its own [`ConversationMemory`] behind an async
//! mutex. The orchestrator holds that lock for the whole load → answer →
//! save cycle, so two requests for the same session are serialized while
//! different sessions proceed concurrently.
//!
//! Sessions live for the life of the process. They are dropped only by
//! [`SessionStore::clear`]; there is no expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

use crate::config::MemoryConfig;
use crate::memory::ConversationMemory;

/// Session used when the caller does not supply one.
pub const DEFAULT_SESSION: &str = "default";

pub type SessionHandle = Arc<AsyncMutex<ConversationMemory>>;

pub struct SessionStore {
    config: MemoryConfig,
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The memory for `session_id`, created empty on first use.
    pub fn session(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(ConversationMemory::new(&self.config))))
            .clone()
    }

    /// Forget a session. Returns whether it existed.
    ///
    /// A request already holding the old handle finishes against it; the
    /// next request starts from an empty memory.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
