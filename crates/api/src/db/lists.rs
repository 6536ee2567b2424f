//! List query builders.

use sea_query::{Condition, Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{ListMembers, Lists};

/// Millisecond-precision timestamp so lists touched within the same second still sort.
const NOW_MILLIS: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

/// INSERT a new list.
pub fn insert(id: &str, name: &str, owner_id: &str) -> Built {
    Query::insert()
        .into_table(Lists::Table)
        .columns([Lists::Id, Lists::Name, Lists::OwnerId])
        .values_panic([id.into(), name.into(), owner_id.into()])
        .build(SqliteQueryBuilder)
}

/// SELECT a list. Columns: id, name, owner_id, created_at, updated_at.
pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns([
            Lists::Id,
            Lists::Name,
            Lists::OwnerId,
            Lists::CreatedAt,
            Lists::UpdatedAt,
        ])
        .from(Lists::Table)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Owner and the user's membership role in one row. Columns: owner_id, role (nullable).
///
/// No row means the list does not exist.
pub fn access_row(list_id: &str, user_id: &str) -> Built {
    Query::select()
        .column((Lists::Table, Lists::OwnerId))
        .column((ListMembers::Table, ListMembers::Role))
        .from(Lists::Table)
        .left_join(
            ListMembers::Table,
            Condition::all()
                .add(
                    Expr::col((ListMembers::Table, ListMembers::ListId))
                        .equals((Lists::Table, Lists::Id)),
                )
                .add(Expr::col((ListMembers::Table, ListMembers::UserId)).eq(user_id)),
        )
        .and_where(Expr::col((Lists::Table, Lists::Id)).eq(list_id))
        .build(SqliteQueryBuilder)
}

/// Lists visible to a user, most recently updated first.
/// Columns: id, name, created_at, updated_at, role.
pub fn list_for_user(user_id: &str) -> Built {
    // CASE + OR across a left join: keep as raw SQL
    let sql = concat!(
        "SELECT l.\"id\", l.\"name\", l.\"created_at\", l.\"updated_at\", ",
        "CASE WHEN l.\"owner_id\" = ? THEN 'owner' ELSE m.\"role\" END AS \"role\" ",
        "FROM \"lists\" l ",
        "LEFT JOIN \"list_members\" m ON m.\"list_id\" = l.\"id\" AND m.\"user_id\" = ? ",
        "WHERE l.\"owner_id\" = ? OR m.\"user_id\" IS NOT NULL ",
        "ORDER BY l.\"updated_at\" DESC, l.\"created_at\" DESC",
    )
    .to_string();
    let values = sea_query::Values(vec![user_id.into(), user_id.into(), user_id.into()]);
    (sql, values)
}

/// Rename a list and bump its `updated_at`.
pub fn update_name(id: &str, name: &str) -> Built {
    Query::update()
        .table(Lists::Table)
        .value(Lists::Name, name)
        .value(Lists::UpdatedAt, Expr::cust(NOW_MILLIS))
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Bump a list's `updated_at` after one of its todos changed.
pub fn touch(id: &str) -> Built {
    Query::update()
        .table(Lists::Table)
        .value(Lists::UpdatedAt, Expr::cust(NOW_MILLIS))
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// DELETE a list. Todos, members and invites cascade.
pub fn delete(id: &str) -> Built {
    Query::delete()
        .from_table(Lists::Table)
        .and_where(Expr::col(Lists::Id).eq(id))
        .build(SqliteQueryBuilder)
}
