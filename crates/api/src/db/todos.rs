//! Todo query builders.

use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Todos;
use crate::UpdateTodoRequest;

fn todo_columns() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            Todos::Id,
            Todos::Text,
            Todos::Done,
            Todos::CreatedAt,
            Todos::ListId,
        ])
        .from(Todos::Table)
        .to_owned()
}

/// INSERT a todo (not done).
pub fn insert(id: &str, list_id: &str, text: &str) -> Built {
    Query::insert()
        .into_table(Todos::Table)
        .columns([Todos::Id, Todos::ListId, Todos::Text, Todos::Done])
        .values_panic([id.into(), list_id.into(), text.into(), false.into()])
        .build(SqliteQueryBuilder)
}

/// SELECT one todo. Columns: id, text, done, created_at, list_id.
pub fn get(id: &str) -> Built {
    todo_columns()
        .and_where(Expr::col(Todos::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Parent list of a todo. Columns: list_id.
pub fn list_id_of(id: &str) -> Built {
    Query::select()
        .column(Todos::ListId)
        .from(Todos::Table)
        .and_where(Expr::col(Todos::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Todos of a list, newest first. Same columns as [`get`].
pub fn list_by_list(list_id: &str) -> Built {
    todo_columns()
        .and_where(Expr::col(Todos::ListId).eq(list_id))
        .order_by(Todos::CreatedAt, Order::Desc)
        .order_by(Todos::Id, Order::Desc)
        .build(SqliteQueryBuilder)
}

/// UPDATE the fields present in `update`. Returns `None` when nothing is set.
pub fn update(id: &str, update: &UpdateTodoRequest) -> Option<Built> {
    if update.text.is_none() && update.done.is_none() {
        return None;
    }
    let mut query = Query::update();
    query.table(Todos::Table);
    if let Some(text) = &update.text {
        query.value(Todos::Text, text.as_str());
    }
    if let Some(done) = update.done {
        query.value(Todos::Done, done);
    }
    query.and_where(Expr::col(Todos::Id).eq(id));
    Some(query.build(SqliteQueryBuilder))
}

/// DELETE a todo.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Todos::Table)
        .and_where(Expr::col(Todos::Id).eq(id))
        .build(SqliteQueryBuilder)
}
