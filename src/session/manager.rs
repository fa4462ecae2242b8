//! SessionManager - cache of live agent clients keyed by session id
//!
//! The manager owns every live client handle: it resolves session identity for
//! a (task, sub-agent) pair, reuses durable session ids for resumption,
//! discards dead cache entries, and tears clients down on demand.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::core::CoreResult;

use super::client::{AgentClient, AgentClientFactory};
use super::id_store::SessionIdStore;

/// Registry of live agent clients and saved durable session ids
pub struct SessionManager {
    /// Live clients keyed by session id. First-use session ids equal the
    /// internal key, so historical entries exist in both forms.
    clients: Mutex<HashMap<String, Arc<dyn AgentClient>>>,

    /// In-memory view of saved durable ids, backed by `id_store`
    saved_ids: Mutex<HashMap<String, String>>,

    /// Durable persistence for saved ids
    id_store: SessionIdStore,
}

impl SessionManager {
    /// Create a manager over the given id store
    pub fn new(id_store: SessionIdStore) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            saved_ids: Mutex::new(HashMap::new()),
            id_store,
        }
    }

    /// Compute the internal session key for a (task, sub-agent) pair
    pub fn session_key(task_id: &str, sub_agent_id: Option<&str>) -> String {
        match sub_agent_id {
            Some(sub) => format!("{}:{}", task_id, sub),
            None => task_id.to_string(),
        }
    }

    /// Resolve a session and return a live client for it
    ///
    /// Resolution, given (task, optional sub-agent, `new_session`):
    /// 1. compute the internal key;
    /// 2. no saved durable id → the key itself is the session id (first use);
    /// 3. saved id and `new_session` false → reuse it (resume);
    /// 4. saved id and `new_session` true → leave the old client cached under
    ///    its old key and mint a fresh session id from the current subtask id.
    ///
    /// A cached client whose process has died is discarded and replaced. A
    /// client that fails to connect is never cached. The whole
    /// check-discard-create sequence holds the cache lock, so concurrent
    /// callers for the same session cannot interleave.
    ///
    /// Returns the internal session key (for durable-id persistence) and the
    /// client.
    pub async fn obtain(
        &self,
        factory: &dyn AgentClientFactory,
        task_id: &str,
        sub_agent_id: Option<&str>,
        subtask_id: &str,
        new_session: bool,
    ) -> CoreResult<(String, Arc<dyn AgentClient>)> {
        let key = Self::session_key(task_id, sub_agent_id);
        let saved = self.load_saved_session_id(&key).await?;

        let (session_id, resume_from) = match (&saved, new_session) {
            (None, _) => (key.clone(), None),
            (Some(id), false) => (id.clone(), Some(id.clone())),
            (Some(_), true) => {
                let minted = if subtask_id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    subtask_id.to_string()
                };
                (minted, None)
            }
        };

        let mut clients = self.clients.lock().await;

        if let Some(existing) = clients.get(&session_id) {
            if existing.is_alive() {
                tracing::debug!(session_id = %session_id, "[SessionManager] Reusing live client");
                return Ok((key, existing.clone()));
            }
            tracing::warn!(
                session_id = %session_id,
                "[SessionManager] Cached client process has exited, discarding"
            );
            clients.remove(&session_id);
        }

        let client = factory.create(&session_id, resume_from.as_deref()).await?;
        if let Err(e) = client.connect().await {
            // Never cache a client that did not connect.
            let _ = client.disconnect().await;
            return Err(e);
        }

        clients.insert(session_id.clone(), client.clone());
        tracing::info!(
            session_id = %session_id,
            resumed = resume_from.is_some(),
            "[SessionManager] Client ready"
        );
        Ok((key, client))
    }

    /// Get a cached client by session id, discarding it if dead
    pub async fn get_client(&self, session_id: &str) -> Option<Arc<dyn AgentClient>> {
        let mut clients = self.clients.lock().await;
        match clients.get(session_id) {
            Some(client) if client.is_alive() => Some(client.clone()),
            Some(_) => {
                clients.remove(session_id);
                None
            }
            None => None,
        }
    }

    /// Cache a client under a session id
    pub async fn set_client(&self, session_id: &str, client: Arc<dyn AgentClient>) {
        let mut clients = self.clients.lock().await;
        clients.insert(session_id.to_string(), client);
    }

    /// Remove and return a cached client
    pub async fn remove_client(&self, session_id: &str) -> Option<Arc<dyn AgentClient>> {
        let mut clients = self.clients.lock().await;
        clients.remove(session_id)
    }

    /// Find any live cached client belonging to a task
    pub async fn client_for_task(&self, task_id: &str) -> Option<Arc<dyn AgentClient>> {
        let prefix = format!("{}:", task_id);
        let clients = self.clients.lock().await;
        clients
            .iter()
            .find(|(key, client)| (key.as_str() == task_id || key.starts_with(&prefix)) && client.is_alive())
            .map(|(_, client)| client.clone())
    }

    /// Persist a durable session id for a session key
    pub async fn save_session_id(&self, key: &str, durable_id: &str) -> CoreResult<()> {
        {
            let mut saved = self.saved_ids.lock().await;
            saved.insert(key.to_string(), durable_id.to_string());
        }
        self.id_store.save(key, durable_id)?;
        tracing::info!(key = %key, durable_id = %durable_id, "[SessionManager] Saved durable session id");
        Ok(())
    }

    /// Load the saved durable session id for a session key
    pub async fn load_saved_session_id(&self, key: &str) -> CoreResult<Option<String>> {
        {
            let saved = self.saved_ids.lock().await;
            if let Some(id) = saved.get(key) {
                return Ok(Some(id.clone()));
            }
        }
        let from_disk = self.id_store.load(key)?;
        if let Some(id) = &from_disk {
            let mut saved = self.saved_ids.lock().await;
            saved.insert(key.to_string(), id.clone());
        }
        Ok(from_disk)
    }

    /// Tear down every cached client belonging to a task
    ///
    /// Matches both the bare task id and any key prefixed `"{task_id}:"`,
    /// since historical entries exist in either form. Returns the count
    /// removed. Disconnect failures are logged and do not stop the sweep.
    pub async fn cleanup_task_clients(&self, task_id: &str) -> usize {
        let prefix = format!("{}:", task_id);
        let removed: Vec<(String, Arc<dyn AgentClient>)> = {
            let mut clients = self.clients.lock().await;
            let keys: Vec<String> = clients
                .keys()
                .filter(|key| key.as_str() == task_id || key.starts_with(&prefix))
                .cloned()
                .collect();
            keys.into_iter()
                .filter_map(|key| clients.remove(&key).map(|client| (key, client)))
                .collect()
        };

        for (key, client) in &removed {
            if let Err(e) = client.disconnect().await {
                tracing::warn!(
                    session_id = %key,
                    error = %e,
                    "[SessionManager] Disconnect during cleanup failed"
                );
            }
        }

        tracing::info!(task_id = %task_id, count = removed.len(), "[SessionManager] Cleaned up task clients");
        removed.len()
    }

    /// Number of cached clients
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::testing::{ScriptedClient, StaticFactory};

    fn create_test_manager() -> (SessionManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let manager = SessionManager::new(SessionIdStore::with_dir(temp_dir.path()));
        (manager, temp_dir)
    }

    #[test]
    fn test_session_key() {
        assert_eq!(SessionManager::session_key("task-1", None), "task-1");
        assert_eq!(
            SessionManager::session_key("task-1", Some("planner")),
            "task-1:planner"
        );
    }

    #[tokio::test]
    async fn test_first_use_uses_internal_key() {
        let (manager, _temp) = create_test_manager();
        let factory = StaticFactory::new(vec![ScriptedClient::idle("task-1")]);

        let (key, client) = manager
            .obtain(&factory, "task-1", None, "sub-1", false)
            .await
            .unwrap();

        assert_eq!(key, "task-1");
        assert_eq!(client.session_id(), "task-1");
        assert_eq!(factory.created(), vec![("task-1".to_string(), None)]);
    }

    #[tokio::test]
    async fn test_saved_id_is_reused_for_resume() {
        let (manager, _temp) = create_test_manager();
        manager.save_session_id("task-1", "durable-9").await.unwrap();

        let factory = StaticFactory::new(vec![ScriptedClient::idle("durable-9")]);
        let (key, client) = manager
            .obtain(&factory, "task-1", None, "sub-2", false)
            .await
            .unwrap();

        assert_eq!(key, "task-1");
        assert_eq!(client.session_id(), "durable-9");
        assert_eq!(
            factory.created(),
            vec![("durable-9".to_string(), Some("durable-9".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_new_session_mints_fresh_id_and_keeps_old_client() {
        let (manager, _temp) = create_test_manager();

        let factory = StaticFactory::new(vec![ScriptedClient::idle("task-1")]);
        manager
            .obtain(&factory, "task-1", None, "sub-1", false)
            .await
            .unwrap();
        manager.save_session_id("task-1", "durable-9").await.unwrap();

        // Forcing a new session must mint an id from the subtask and leave the
        // old client cached under its old key.
        let factory = StaticFactory::new(vec![ScriptedClient::idle("sub-2")]);
        let (_, client) = manager
            .obtain(&factory, "task-1", None, "sub-2", true)
            .await
            .unwrap();

        assert_eq!(client.session_id(), "sub-2");
        assert_eq!(factory.created(), vec![("sub-2".to_string(), None)]);
        assert!(manager.get_client("task-1").await.is_some());
        assert_eq!(manager.client_count().await, 2);
    }

    #[tokio::test]
    async fn test_dead_cached_client_is_replaced() {
        let (manager, _temp) = create_test_manager();

        let dead = ScriptedClient::idle("task-1");
        let factory = StaticFactory::new(vec![dead.clone()]);
        manager
            .obtain(&factory, "task-1", None, "sub-1", false)
            .await
            .unwrap();
        dead.kill();

        let factory = StaticFactory::new(vec![ScriptedClient::idle("task-1")]);
        let (_, client) = manager
            .obtain(&factory, "task-1", None, "sub-2", false)
            .await
            .unwrap();

        assert!(client.is_alive());
        assert_eq!(factory.created().len(), 1);
        assert_eq!(manager.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_connect_is_not_cached() {
        let (manager, _temp) = create_test_manager();

        let broken = ScriptedClient::idle("task-1");
        broken.fail_next_connect();
        let factory = StaticFactory::new(vec![broken]);

        let result = manager
            .obtain(&factory, "task-1", None, "sub-1", false)
            .await;

        assert!(result.is_err());
        assert_eq!(manager.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_get_client_discards_dead() {
        let (manager, _temp) = create_test_manager();

        let client = ScriptedClient::idle("task-1");
        manager.set_client("task-1", client.clone()).await;
        assert!(manager.get_client("task-1").await.is_some());

        client.kill();
        assert!(manager.get_client("task-1").await.is_none());
        assert_eq!(manager.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_matches_bare_id_and_prefix() {
        let (manager, _temp) = create_test_manager();

        manager.set_client("task-1", ScriptedClient::idle("task-1")).await;
        manager
            .set_client("task-1:planner", ScriptedClient::idle("task-1:planner"))
            .await;
        manager
            .set_client("task-1:coder", ScriptedClient::idle("task-1:coder"))
            .await;
        manager.set_client("task-10", ScriptedClient::idle("task-10")).await;
        manager.set_client("other", ScriptedClient::idle("other")).await;

        let removed = manager.cleanup_task_clients("task-1").await;

        assert_eq!(removed, 3);
        assert_eq!(manager.client_count().await, 2);
        assert!(manager.get_client("task-10").await.is_some());
        assert!(manager.get_client("other").await.is_some());
    }

    #[tokio::test]
    async fn test_saved_id_survives_reload() {
        let temp_dir = TempDir::new().unwrap();

        {
            let manager = SessionManager::new(SessionIdStore::with_dir(temp_dir.path()));
            manager.save_session_id("task-1", "durable-9").await.unwrap();
        }

        // A fresh manager over the same directory sees the saved id.
        let manager = SessionManager::new(SessionIdStore::with_dir(temp_dir.path()));
        assert_eq!(
            manager.load_saved_session_id("task-1").await.unwrap().as_deref(),
            Some("durable-9")
        );
    }
}
