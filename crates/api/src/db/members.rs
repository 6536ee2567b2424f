//! List membership query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{ListMembers, Users};

/// INSERT a list member.
pub fn insert(list_id: &str, user_id: &str, role: &str) -> Built {
    Query::insert()
        .into_table(ListMembers::Table)
        .columns([ListMembers::ListId, ListMembers::UserId, ListMembers::Role])
        .values_panic([list_id.into(), user_id.into(), role.into()])
        .build(SqliteQueryBuilder)
}

/// DELETE a list member.
pub fn delete(list_id: &str, user_id: &str) -> Built {
    Query::delete()
        .from_table(ListMembers::Table)
        .and_where(Expr::col(ListMembers::ListId).eq(list_id))
        .and_where(Expr::col(ListMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Check if a user is a member of a list.
pub fn exists(list_id: &str, user_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(ListMembers::Table)
        .and_where(Expr::col(ListMembers::ListId).eq(list_id))
        .and_where(Expr::col(ListMembers::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

fn member_columns() -> sea_query::SelectStatement {
    Query::select()
        .column((ListMembers::Table, ListMembers::ListId))
        .column((ListMembers::Table, ListMembers::UserId))
        .column((Users::Table, Users::Username))
        .column((ListMembers::Table, ListMembers::Role))
        .column((ListMembers::Table, ListMembers::CreatedAt))
        .from(ListMembers::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((ListMembers::Table, ListMembers::UserId)),
        )
        .to_owned()
}

/// One membership row. Columns: list_id, user_id, username, role, created_at.
pub fn get(list_id: &str, user_id: &str) -> Built {
    member_columns()
        .and_where(Expr::col((ListMembers::Table, ListMembers::ListId)).eq(list_id))
        .and_where(Expr::col((ListMembers::Table, ListMembers::UserId)).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Members of a list, oldest first. Same columns as [`get`].
pub fn list(list_id: &str) -> Built {
    member_columns()
        .and_where(Expr::col((ListMembers::Table, ListMembers::ListId)).eq(list_id))
        .order_by((ListMembers::Table, ListMembers::CreatedAt), Order::Asc)
        .build(SqliteQueryBuilder)
}

/// User ids of all members of a list.
pub fn member_ids(list_id: &str) -> Built {
    Query::select()
        .column(ListMembers::UserId)
        .from(ListMembers::Table)
        .and_where(Expr::col(ListMembers::ListId).eq(list_id))
        .build(SqliteQueryBuilder)
}
