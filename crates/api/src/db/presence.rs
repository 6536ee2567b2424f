//! Presence heartbeat query builders.

use sea_query::{Expr, OnConflict, Order, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Presence;
use crate::service::PRESENCE_WINDOW_SECS;

/// Upsert the caller's single presence row, stamping `last_seen` with now.
pub fn upsert(
    user_id: &str,
    list_id: &str,
    display_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Built {
    Query::insert()
        .into_table(Presence::Table)
        .columns([
            Presence::UserId,
            Presence::ListId,
            Presence::DisplayName,
            Presence::AvatarUrl,
            Presence::LastSeen,
        ])
        .values_panic([
            user_id.into(),
            list_id.into(),
            display_name.map(str::to_string).into(),
            avatar_url.map(str::to_string).into(),
            Expr::cust("datetime('now')"),
        ])
        .on_conflict(
            OnConflict::column(Presence::UserId)
                .update_columns([
                    Presence::ListId,
                    Presence::DisplayName,
                    Presence::AvatarUrl,
                    Presence::LastSeen,
                ])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// Users seen on a list inside the presence window, excluding `exclude_user_id`.
/// Columns: user_id, display_name, avatar_url, last_seen.
pub fn active_for_list(list_id: &str, exclude_user_id: &str) -> Built {
    let window = format!("datetime('now', '-{PRESENCE_WINDOW_SECS} seconds')");
    Query::select()
        .columns([
            Presence::UserId,
            Presence::DisplayName,
            Presence::AvatarUrl,
            Presence::LastSeen,
        ])
        .from(Presence::Table)
        .and_where(Expr::col(Presence::ListId).eq(list_id))
        .and_where(Expr::col(Presence::UserId).ne(exclude_user_id))
        .and_where(Expr::col(Presence::LastSeen).gte(Expr::cust(window)))
        .order_by(Presence::LastSeen, Order::Desc)
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_is_single_row_per_user() {
        let (sql, values) = upsert("u1", "l1", Some("Ann"), None);
        assert!(sql.contains("ON CONFLICT"), "{sql}");
        assert!(sql.contains("datetime('now')"), "{sql}");
        assert_eq!(values.0.len(), 4);
    }

    #[test]
    fn active_query_uses_window() {
        let (sql, values) = active_for_list("l1", "u1");
        assert!(sql.contains("'-30 seconds'"), "{sql}");
        assert_eq!(values.0.len(), 2);
    }
}
