//! Local caches with optimistic mutations.
//!
//! Every mutation bumps a generation counter. A fetch records the generation
//! it started at and its result is dropped if anything changed in between,
//! so a poll that raced an optimistic edit never clobbers it.

use chrono::Utc;

use clarydo_api::{ListRole, ListSummary, Todo, UpdateTodoRequest};

/// Prefix of ids handed out to items the server has not confirmed yet.
pub const OPTIMISTIC_PREFIX: &str = "optimistic-";

pub fn placeholder_id() -> String {
    format!("{OPTIMISTIC_PREFIX}{}", uuid::Uuid::new_v4())
}

pub fn is_placeholder(id: &str) -> bool {
    id.starts_with(OPTIMISTIC_PREFIX)
}

fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Generation a fetch was started at. See [`TodoCache::begin_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

// ─── Todos ──────────────────────────────────────────────────────────────────

/// Todos of one list, newest first.
#[derive(Debug, Clone, Default)]
pub struct TodoCache {
    list_id: String,
    todos: Vec<Todo>,
    generation: u64,
}

impl TodoCache {
    pub fn new(list_id: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            ..Self::default()
        }
    }

    pub fn list_id(&self) -> &str {
        &self.list_id
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    /// Prepend an unconfirmed todo and return its placeholder id.
    pub fn insert_optimistic(&mut self, text: &str) -> String {
        let id = placeholder_id();
        self.todos.insert(
            0,
            Todo {
                id: id.clone(),
                text: text.to_string(),
                done: false,
                created_at: now_timestamp(),
                list_id: self.list_id.clone(),
            },
        );
        self.generation += 1;
        id
    }

    /// Swap the placeholder for the todo the server created.
    pub fn confirm_create(&mut self, placeholder: &str, todo: Todo) {
        if let Some(slot) = self.todos.iter_mut().find(|t| t.id == placeholder) {
            *slot = todo;
        } else if self.get(&todo.id).is_none() {
            self.todos.insert(0, todo);
        }
    }

    /// Apply a partial update locally. Returns `false` if the todo is unknown.
    pub fn apply_update(&mut self, id: &str, update: &UpdateTodoRequest) -> bool {
        let Some(todo) = self.todos.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        if let Some(text) = &update.text {
            todo.text = text.clone();
        }
        if let Some(done) = update.done {
            todo.done = done;
        }
        self.generation += 1;
        true
    }

    pub fn confirm_update(&mut self, todo: Todo) {
        if let Some(slot) = self.todos.iter_mut().find(|t| t.id == todo.id) {
            *slot = todo;
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Todo> {
        let idx = self.todos.iter().position(|t| t.id == id)?;
        self.generation += 1;
        Some(self.todos.remove(idx))
    }

    pub fn remove_many(&mut self, ids: &[String]) {
        let before = self.todos.len();
        self.todos.retain(|t| !ids.contains(&t.id));
        if self.todos.len() != before {
            self.generation += 1;
        }
    }

    /// Ids of finished todos the server knows about.
    pub fn completed_ids(&self) -> Vec<String> {
        self.todos
            .iter()
            .filter(|t| t.done && !is_placeholder(&t.id))
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn open_count(&self) -> usize {
        self.todos.iter().filter(|t| !t.done).count()
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.todos.clone()
    }

    /// Roll back to a snapshot taken before an optimistic mutation.
    pub fn restore(&mut self, snapshot: Vec<Todo>) {
        self.todos = snapshot;
        self.generation += 1;
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.generation)
    }

    /// Replace the contents with fetched todos unless a mutation happened
    /// since `ticket` was taken. Returns whether the result was applied.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, todos: Vec<Todo>) -> bool {
        if ticket.0 != self.generation {
            tracing::debug!(list_id = %self.list_id, "discarding stale todo fetch");
            return false;
        }
        self.todos = todos;
        true
    }
}

// ─── Lists ──────────────────────────────────────────────────────────────────

/// The lists visible to the current user, most recently updated first.
#[derive(Debug, Clone, Default)]
pub struct ListCache {
    lists: Vec<ListSummary>,
    generation: u64,
}

impl ListCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lists(&self) -> &[ListSummary] {
        &self.lists
    }

    pub fn get(&self, id: &str) -> Option<&ListSummary> {
        self.lists.iter().find(|l| l.id == id)
    }

    fn sort(&mut self) {
        self.lists.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    /// Add an unconfirmed list owned by the current user.
    pub fn insert_optimistic(&mut self, name: &str) -> String {
        let id = placeholder_id();
        let now = now_timestamp();
        self.lists.push(ListSummary {
            id: id.clone(),
            name: name.to_string(),
            created_at: now.clone(),
            updated_at: now,
            role: ListRole::Owner,
        });
        self.sort();
        self.generation += 1;
        id
    }

    pub fn confirm_create(&mut self, placeholder: &str, list: ListSummary) {
        if let Some(slot) = self.lists.iter_mut().find(|l| l.id == placeholder) {
            *slot = list;
        } else if self.get(&list.id).is_none() {
            self.lists.push(list);
        }
        self.sort();
    }

    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let Some(list) = self.lists.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        list.name = name.to_string();
        list.updated_at = now_timestamp();
        self.sort();
        self.generation += 1;
        true
    }

    pub fn confirm_update(&mut self, list: ListSummary) {
        if let Some(slot) = self.lists.iter_mut().find(|l| l.id == list.id) {
            *slot = list;
            self.sort();
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ListSummary> {
        let idx = self.lists.iter().position(|l| l.id == id)?;
        self.generation += 1;
        Some(self.lists.remove(idx))
    }

    pub fn snapshot(&self) -> Vec<ListSummary> {
        self.lists.clone()
    }

    pub fn restore(&mut self, snapshot: Vec<ListSummary>) {
        self.lists = snapshot;
        self.generation += 1;
    }

    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.generation)
    }

    pub fn apply_fetch(&mut self, ticket: FetchTicket, lists: Vec<ListSummary>) -> bool {
        if ticket.0 != self.generation {
            return false;
        }
        self.lists = lists;
        self.sort();
        true
    }
}
