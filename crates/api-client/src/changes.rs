//! Detect what other collaborators changed between two polls.

use std::collections::{HashMap, HashSet};

use clarydo_api::Todo;

use crate::cache::is_placeholder;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoChange {
    Created(Todo),
    Deleted(Todo),
    Completed(Todo),
    Reopened(Todo),
    Edited(Todo),
}

impl TodoChange {
    pub fn todo(&self) -> &Todo {
        match self {
            Self::Created(t)
            | Self::Deleted(t)
            | Self::Completed(t)
            | Self::Reopened(t)
            | Self::Edited(t) => t,
        }
    }
}

/// Compare two snapshots of a list.
///
/// Changes come in `current` order, followed by deletions in `previous`
/// order. A todo whose done flag flipped is reported as completed/reopened
/// only, even if its text changed too. Unconfirmed placeholders are ignored.
pub fn diff_todos(previous: &[Todo], current: &[Todo]) -> Vec<TodoChange> {
    let before: HashMap<&str, &Todo> = previous
        .iter()
        .filter(|t| !is_placeholder(&t.id))
        .map(|t| (t.id.as_str(), t))
        .collect();
    let now: HashSet<&str> = current.iter().map(|t| t.id.as_str()).collect();

    let mut changes = Vec::new();
    for todo in current.iter().filter(|t| !is_placeholder(&t.id)) {
        match before.get(todo.id.as_str()) {
            None => changes.push(TodoChange::Created(todo.clone())),
            Some(old) if old.done != todo.done => changes.push(if todo.done {
                TodoChange::Completed(todo.clone())
            } else {
                TodoChange::Reopened(todo.clone())
            }),
            Some(old) if old.text != todo.text => changes.push(TodoChange::Edited(todo.clone())),
            Some(_) => {}
        }
    }
    for todo in previous.iter().filter(|t| !is_placeholder(&t.id)) {
        if !now.contains(todo.id.as_str()) {
            changes.push(TodoChange::Deleted(todo.clone()));
        }
    }
    changes
}

/// One-line message describing `changes`, or `None` when nothing changed.
pub fn summarize_changes(changes: &[TodoChange], list_name: &str) -> Option<String> {
    let label = if list_name.trim().is_empty() {
        "your list"
    } else {
        list_name
    };
    match changes {
        [] => None,
        [change] => {
            let text = &change.todo().text;
            Some(match change {
                TodoChange::Created(_) => format!("\"{text}\" was added."),
                TodoChange::Deleted(_) => format!("\"{text}\" was deleted."),
                TodoChange::Completed(_) => format!("\"{text}\" was checked off."),
                TodoChange::Reopened(_) => format!("\"{text}\" was reopened."),
                TodoChange::Edited(_) => format!("\"{text}\" was edited."),
            })
        }
        many => Some(format!("{} changes in \"{label}\".", many.len())),
    }
}
