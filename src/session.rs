use parking_lot::RwLock;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::config::ExplorerConfig;
use crate::explorer::Explorer;
use crate::store::DataStore;

pub const MAX_SESSION_COUNT: usize = 4096;
const SESSION_ID_LEN: usize = 24;

/// One [`Explorer`] per visitor so that latest-request-wins holds per user.
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
}

struct RegistryShared {
    store: Arc<DataStore>,
    config: ExplorerConfig,
    capacity: usize,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

struct SessionEntry {
    explorer: Arc<Explorer>,
    last_seen_ts: u64,
}

#[derive(Clone)]
pub struct SessionHandle {
    pub id: String,
    pub explorer: Arc<Explorer>,
    /// True when the id was minted for this request and must be sent back.
    pub created: bool,
}

impl SessionRegistry {
    pub fn new(store: Arc<DataStore>, config: ExplorerConfig) -> Self {
        Self::with_capacity(store, config, MAX_SESSION_COUNT)
    }

    pub fn with_capacity(store: Arc<DataStore>, config: ExplorerConfig, capacity: usize) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                store,
                config,
                capacity: capacity.max(1),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.shared.store
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.shared.config
    }

    /// Looks up a known session without creating one.
    pub fn get(&self, id: &str) -> Option<Arc<Explorer>> {
        let now = now_ts();
        let mut guard = self.shared.sessions.write();
        let entry = guard.get_mut(id)?;
        entry.last_seen_ts = now;
        Some(entry.explorer.clone())
    }

    /// Resumes `id` when it is known, otherwise starts a fresh session.
    pub fn resume(&self, id: Option<&str>) -> SessionHandle {
        if let Some(id) = id {
            if let Some(explorer) = self.get(id) {
                return SessionHandle {
                    id: id.to_string(),
                    explorer,
                    created: false,
                };
            }
        }
        self.create()
    }

    pub fn create(&self) -> SessionHandle {
        let now = now_ts();
        let id = generate_session_id();
        let explorer = Arc::new(Explorer::new(
            self.shared.store.clone(),
            self.shared.config.clone(),
        ));
        let mut guard = self.shared.sessions.write();
        while guard.len() >= self.shared.capacity {
            match oldest_session_key(&guard) {
                Some(oldest) => {
                    debug!(session = %oldest, "Evicting idle session");
                    guard.remove(&oldest);
                }
                None => break,
            }
        }
        guard.insert(
            id.clone(),
            SessionEntry {
                explorer: explorer.clone(),
                last_seen_ts: now,
            },
        );
        SessionHandle {
            id,
            explorer,
            created: true,
        }
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn generate_session_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect()
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn oldest_session_key(sessions: &HashMap<String, SessionEntry>) -> Option<String> {
    sessions
        .iter()
        .min_by_key(|(_, entry)| entry.last_seen_ts)
        .map(|(key, _)| key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(capacity: usize) -> SessionRegistry {
        let store = Arc::new(DataStore::builtin_demo().unwrap());
        SessionRegistry::with_capacity(store, ExplorerConfig::default(), capacity)
    }

    #[test]
    fn session_ids_are_alphanumeric() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn resume_returns_same_explorer() {
        let registry = registry(8);
        let first = registry.resume(None);
        assert!(first.created);
        let again = registry.resume(Some(&first.id));
        assert!(!again.created);
        assert!(Arc::ptr_eq(&first.explorer, &again.explorer));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_id_starts_new_session() {
        let registry = registry(8);
        let handle = registry.resume(Some("not-a-real-session"));
        assert!(handle.created);
        assert_ne!(handle.id, "not-a-real-session");
    }

    #[test]
    fn capacity_is_enforced() {
        let registry = registry(2);
        for _ in 0..5 {
            registry.create();
        }
        assert_eq!(registry.len(), 2);
    }
}
