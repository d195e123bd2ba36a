use parking_lot::{Mutex, RwLock};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::session::PracticeSession;

const MAX_SESSION_COUNT: usize = 4096;
const SESSION_ID_LEN: usize = 24;

pub type SharedSession = Arc<Mutex<PracticeSession>>;

/// Practice sessions of every connected learner, keyed by session id.
///
/// The store is bounded; when full, the session touched least recently is
/// dropped to make room.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<StoreInner>>,
    capacity: usize,
}

#[derive(Default)]
struct StoreInner {
    sessions: HashMap<String, SessionSlot>,
    tick: u64,
}

struct SessionSlot {
    session: SharedSession,
    last_seen: u64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SESSION_COUNT)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Returns the session for `session_id`, creating it on first use.
    pub fn open(&self, session_id: &str) -> SharedSession {
        let mut guard = self.inner.write();
        guard.tick += 1;
        let now = guard.tick;
        if let Some(slot) = guard.sessions.get_mut(session_id) {
            slot.last_seen = now;
            return Arc::clone(&slot.session);
        }
        if guard.sessions.len() >= self.capacity {
            if let Some(oldest) = oldest_session_key(&guard.sessions) {
                debug!(session = %oldest, "evicting idle practice session");
                guard.sessions.remove(&oldest);
            }
        }
        let session: SharedSession = Arc::new(Mutex::new(PracticeSession::new()));
        guard.sessions.insert(
            session_id.to_string(),
            SessionSlot {
                session: Arc::clone(&session),
                last_seen: now,
            },
        );
        session
    }

    /// Returns the session for `session_id` only if it already exists,
    /// marking it as recently used. Never allocates a slot.
    pub fn get(&self, session_id: &str) -> Option<SharedSession> {
        let mut guard = self.inner.write();
        guard.tick += 1;
        let now = guard.tick;
        guard.sessions.get_mut(session_id).map(|slot| {
            slot.last_seen = now;
            Arc::clone(&slot.session)
        })
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn oldest_session_key(sessions: &HashMap<String, SessionSlot>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, slot)| slot.last_seen)
        .map(|(key, _)| key.clone())
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Whether a client-supplied id looks like one we handed out.
pub fn is_valid_session_id(candidate: &str) -> bool {
    candidate.len() == SESSION_ID_LEN && candidate.chars().all(|ch| ch.is_ascii_alphanumeric())
}
