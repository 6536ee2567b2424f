//! Optimistic synchronisation between the local caches and the server.
//!
//! Each mutation snapshots the cache, applies the change locally, sends the
//! request, then either reconciles with the server's answer or restores the
//! snapshot. A failed mutation marks the cache stale and the next settle
//! refetches it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use clarydo_api::{ListSummary, PresenceHeartbeatRequest, Todo, UpdateTodoRequest};

use crate::cache::{FetchTicket, ListCache, TodoCache, is_placeholder};
use crate::changes::{TodoChange, diff_todos};
use crate::client::{ApiClient, ClientError, Result};

/// How often todos are re-fetched while a list is open.
pub const POLL_INTERVAL: Duration = Duration::from_secs(8);

/// How often presence is refreshed while a list is open.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

fn require_text(text: &str, what: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Invalid(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

fn require_confirmed(id: &str) -> Result<()> {
    if is_placeholder(id) {
        return Err(ClientError::Invalid(
            "item has not been saved yet".to_string(),
        ));
    }
    Ok(())
}

// ─── Todos ──────────────────────────────────────────────────────────────────

pub struct TodoSync {
    client: ApiClient,
    cache: Mutex<TodoCache>,
    stale: AtomicBool,
}

impl TodoSync {
    pub fn new(client: ApiClient, list_id: impl Into<String>) -> Self {
        Self {
            client,
            cache: Mutex::new(TodoCache::new(list_id)),
            stale: AtomicBool::new(true),
        }
    }

    fn cache(&self) -> MutexGuard<'_, TodoCache> {
        self.cache.lock().expect("todo cache mutex poisoned")
    }

    pub fn list_id(&self) -> String {
        self.cache().list_id().to_string()
    }

    pub fn todos(&self) -> Vec<Todo> {
        self.cache().snapshot()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }

    /// Fetch the list from the server and report what changed since the last view.
    ///
    /// Returns `None` when a local mutation overtook the fetch and it was discarded.
    pub async fn refresh(&self) -> Result<Option<Vec<TodoChange>>> {
        let (ticket, list_id) = {
            let cache = self.cache();
            (cache.begin_fetch(), cache.list_id().to_string())
        };
        let fetched = self.client.list_todos(&list_id).await?;
        Ok(self.apply_fetched(ticket, fetched))
    }

    fn apply_fetched(&self, ticket: FetchTicket, fetched: Vec<Todo>) -> Option<Vec<TodoChange>> {
        let mut cache = self.cache();
        let previous = cache.snapshot();
        if !cache.apply_fetch(ticket, fetched) {
            return None;
        }
        self.stale.store(false, Ordering::Relaxed);
        Some(diff_todos(&previous, cache.todos()))
    }

    fn begin(&self, apply: impl FnOnce(&mut TodoCache)) -> Vec<Todo> {
        let mut cache = self.cache();
        let snapshot = cache.snapshot();
        apply(&mut cache);
        snapshot
    }

    fn rollback(&self, snapshot: Vec<Todo>, err: &ClientError) {
        tracing::warn!("todo mutation failed, rolling back: {err}");
        self.cache().restore(snapshot);
        self.stale.store(true, Ordering::Relaxed);
    }

    async fn settle(&self) {
        if !self.is_stale() {
            return;
        }
        if let Err(e) = self.refresh().await {
            tracing::warn!("refetch after failed mutation: {e}");
        }
    }

    pub async fn add(&self, text: &str) -> Result<Todo> {
        let text = require_text(text, "text")?;
        let mut placeholder = String::new();
        let snapshot = self.begin(|cache| placeholder = cache.insert_optimistic(&text));

        let list_id = self.list_id();
        let result = self.client.create_todo(&list_id, &text).await;
        match &result {
            Ok(todo) => self.cache().confirm_create(&placeholder, todo.clone()),
            Err(e) => self.rollback(snapshot, e),
        }
        self.settle().await;
        result
    }

    pub async fn update(&self, id: &str, update: UpdateTodoRequest) -> Result<Todo> {
        require_confirmed(id)?;
        let snapshot = self.begin(|cache| {
            cache.apply_update(id, &update);
        });

        let result = self.client.update_todo(id, &update).await;
        match &result {
            Ok(todo) => self.cache().confirm_update(todo.clone()),
            Err(e) => self.rollback(snapshot, e),
        }
        self.settle().await;
        result
    }

    /// Flip the done flag of a cached todo.
    pub async fn toggle(&self, id: &str) -> Result<Todo> {
        require_confirmed(id)?;
        let done = self
            .cache()
            .get(id)
            .map(|t| !t.done)
            .ok_or_else(|| ClientError::Invalid(format!("unknown todo {id}")))?;
        self.update(
            id,
            UpdateTodoRequest {
                text: None,
                done: Some(done),
            },
        )
        .await
    }

    pub async fn edit(&self, id: &str, text: &str) -> Result<Todo> {
        let text = require_text(text, "text")?;
        self.update(
            id,
            UpdateTodoRequest {
                text: Some(text),
                done: None,
            },
        )
        .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require_confirmed(id)?;
        let snapshot = self.begin(|cache| {
            cache.remove(id);
        });

        let result = self.client.delete_todo(id).await.map(|_| ());
        if let Err(e) = &result {
            self.rollback(snapshot, e);
        }
        self.settle().await;
        result
    }

    /// Delete every finished todo. Returns how many were removed.
    pub async fn clear_completed(&self) -> Result<usize> {
        let mut ids = Vec::new();
        let snapshot = self.begin(|cache| {
            ids = cache.completed_ids();
            cache.remove_many(&ids);
        });
        if ids.is_empty() {
            return Ok(0);
        }

        let mut set = JoinSet::new();
        for id in ids.iter().cloned() {
            let client = self.client.clone();
            set.spawn(async move { client.delete_todo(&id).await });
        }
        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| ClientError::Invalid(format!("delete task: {e}")));
            if let Err(e) = outcome.and_then(|r| r) {
                first_err.get_or_insert(e);
            }
        }

        let result = match first_err {
            None => Ok(ids.len()),
            Some(e) => {
                self.rollback(snapshot, &e);
                Err(e)
            }
        };
        self.settle().await;
        result
    }

    /// Poll the server every [`POLL_INTERVAL`], handing non-empty change sets to `on_change`.
    pub fn spawn_polling<F>(self: &Arc<Self>, on_change: F) -> JoinHandle<()>
    where
        F: Fn(Vec<TodoChange>) + Send + 'static,
    {
        self.spawn_polling_every(POLL_INTERVAL, on_change)
    }

    pub fn spawn_polling_every<F>(self: &Arc<Self>, period: Duration, on_change: F) -> JoinHandle<()>
    where
        F: Fn(Vec<TodoChange>) + Send + 'static,
    {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut first = true;
            loop {
                ticker.tick().await;
                match sync.refresh().await {
                    // The initial load is not a change made by someone else.
                    Ok(Some(_)) if first => first = false,
                    Ok(Some(changes)) if !changes.is_empty() => on_change(changes),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("todo poll failed: {e}"),
                }
            }
        })
    }
}

/// Send a presence heartbeat every [`HEARTBEAT_INTERVAL`] until the task is aborted.
pub fn spawn_presence_heartbeat(client: ApiClient, req: PresenceHeartbeatRequest) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = client.heartbeat(&req).await {
                tracing::debug!(list_id = %req.list_id, "presence heartbeat failed: {e}");
            }
        }
    })
}

// ─── Lists ──────────────────────────────────────────────────────────────────

pub struct ListSync {
    client: ApiClient,
    cache: Mutex<ListCache>,
}

impl ListSync {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cache: Mutex::new(ListCache::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, ListCache> {
        self.cache.lock().expect("list cache mutex poisoned")
    }

    pub fn lists(&self) -> Vec<ListSummary> {
        self.cache().snapshot()
    }

    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.cache().begin_fetch();
        let fetched = self.client.list_lists().await?;
        self.cache().apply_fetch(ticket, fetched);
        Ok(())
    }

    async fn refetch(&self, err: &ClientError) {
        tracing::warn!("list mutation failed, rolling back: {err}");
        if let Err(e) = self.refresh().await {
            tracing::warn!("refetch lists: {e}");
        }
    }

    pub async fn create(&self, name: &str) -> Result<ListSummary> {
        let name = require_text(name, "name")?;
        let (snapshot, placeholder) = {
            let mut cache = self.cache();
            let snapshot = cache.snapshot();
            (snapshot, cache.insert_optimistic(&name))
        };

        let result = self.client.create_list(&name).await;
        match &result {
            Ok(list) => self.cache().confirm_create(&placeholder, list.clone()),
            Err(e) => {
                self.cache().restore(snapshot);
                self.refetch(e).await;
            }
        }
        result
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<ListSummary> {
        require_confirmed(id)?;
        let name = require_text(name, "name")?;
        let snapshot = {
            let mut cache = self.cache();
            let snapshot = cache.snapshot();
            cache.rename(id, &name);
            snapshot
        };

        let result = self.client.rename_list(id, &name).await;
        match &result {
            Ok(list) => self.cache().confirm_update(list.clone()),
            Err(e) => {
                self.cache().restore(snapshot);
                self.refetch(e).await;
            }
        }
        result
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        require_confirmed(id)?;
        let snapshot = {
            let mut cache = self.cache();
            let snapshot = cache.snapshot();
            cache.remove(id);
            snapshot
        };

        let result = self.client.delete_list(id).await.map(|_| ());
        if let Err(e) = &result {
            self.cache().restore(snapshot);
            self.refetch(e).await;
        }
        result
    }
}
