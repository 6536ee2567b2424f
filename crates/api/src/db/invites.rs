//! List invite query builders.

use sea_query::{Alias, Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::ListInvites;
use crate::InviteStatus;

/// INSERT a pending invite.
pub fn insert(id: &str, list_id: &str, invited_user_id: &str, invited_by: &str) -> Built {
    Query::insert()
        .into_table(ListInvites::Table)
        .columns([
            ListInvites::Id,
            ListInvites::ListId,
            ListInvites::InvitedUserId,
            ListInvites::InvitedBy,
            ListInvites::Status,
        ])
        .values_panic([
            id.into(),
            list_id.into(),
            invited_user_id.into(),
            invited_by.into(),
            InviteStatus::Pending.as_str().into(),
        ])
        .build(SqliteQueryBuilder)
}

/// SELECT an invite. Columns: id, list_id, invited_user_id, invited_by, status, created_at.
pub fn get(id: &str) -> Built {
    Query::select()
        .columns([
            ListInvites::Id,
            ListInvites::ListId,
            ListInvites::InvitedUserId,
            ListInvites::InvitedBy,
            ListInvites::Status,
            ListInvites::CreatedAt,
        ])
        .from(ListInvites::Table)
        .and_where(Expr::col(ListInvites::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Count pending invites for this user on this list.
pub fn pending_exists(list_id: &str, invited_user_id: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(ListInvites::Table)
        .and_where(Expr::col(ListInvites::ListId).eq(list_id))
        .and_where(Expr::col(ListInvites::InvitedUserId).eq(invited_user_id))
        .and_where(Expr::col(ListInvites::Status).eq(InviteStatus::Pending.as_str()))
        .build(SqliteQueryBuilder)
}

/// Newest pending invite addressed to a user.
/// Columns: id, list_id, list_name, inviter_username (nullable), created_at.
pub fn latest_pending_for(user_id: &str) -> Built {
    let sql = concat!(
        "SELECT i.\"id\", i.\"list_id\", l.\"name\", u.\"username\", i.\"created_at\" ",
        "FROM \"list_invites\" i ",
        "INNER JOIN \"lists\" l ON l.\"id\" = i.\"list_id\" ",
        "LEFT JOIN \"users\" u ON u.\"id\" = i.\"invited_by\" ",
        "WHERE i.\"invited_user_id\" = ? AND i.\"status\" = ? ",
        "ORDER BY i.\"created_at\" DESC LIMIT 1",
    )
    .to_string();
    let values = sea_query::Values(vec![
        user_id.into(),
        InviteStatus::Pending.as_str().into(),
    ]);
    (sql, values)
}

/// Move an invite to a new status.
pub fn update_status(id: &str, status: InviteStatus) -> Built {
    Query::update()
        .table(ListInvites::Table)
        .value(ListInvites::Status, status.as_str())
        .and_where(Expr::col(ListInvites::Id).eq(id))
        .build(SqliteQueryBuilder)
}
