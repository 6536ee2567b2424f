//! Push subscription and notification cooldown query builders.

use sea_query::{Expr, OnConflict, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{NotificationCooldowns, PushSubscriptions};

/// Store a subscription, replacing the keys if the endpoint is already known for the user.
pub fn upsert(user_id: &str, endpoint: &str, p256dh: &str, auth: &str) -> Built {
    Query::insert()
        .into_table(PushSubscriptions::Table)
        .columns([
            PushSubscriptions::UserId,
            PushSubscriptions::Endpoint,
            PushSubscriptions::P256dh,
            PushSubscriptions::Auth,
        ])
        .values_panic([user_id.into(), endpoint.into(), p256dh.into(), auth.into()])
        .on_conflict(
            OnConflict::columns([PushSubscriptions::UserId, PushSubscriptions::Endpoint])
                .update_columns([PushSubscriptions::P256dh, PushSubscriptions::Auth])
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}

/// A user's subscriptions. Columns: endpoint, p256dh, auth.
pub fn list_for_user(user_id: &str) -> Built {
    Query::select()
        .columns([
            PushSubscriptions::Endpoint,
            PushSubscriptions::P256dh,
            PushSubscriptions::Auth,
        ])
        .from(PushSubscriptions::Table)
        .and_where(Expr::col(PushSubscriptions::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Drop one endpoint of a user (gone at the push service).
pub fn delete_endpoint(user_id: &str, endpoint: &str) -> Built {
    Query::delete()
        .from_table(PushSubscriptions::Table)
        .and_where(Expr::col(PushSubscriptions::UserId).eq(user_id))
        .and_where(Expr::col(PushSubscriptions::Endpoint).eq(endpoint))
        .build(SqliteQueryBuilder)
}

/// Drop all of a user's subscriptions.
pub fn delete_for_user(user_id: &str) -> Built {
    Query::delete()
        .from_table(PushSubscriptions::Table)
        .and_where(Expr::col(PushSubscriptions::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

// ── Cooldowns ──────────────────────────────────────────────────────────────

/// Last notification time for a user on a list. Columns: last_notified_at.
pub fn get_cooldown(list_id: &str, user_id: &str) -> Built {
    Query::select()
        .column(NotificationCooldowns::LastNotifiedAt)
        .from(NotificationCooldowns::Table)
        .and_where(Expr::col(NotificationCooldowns::ListId).eq(list_id))
        .and_where(Expr::col(NotificationCooldowns::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Record that a user was just notified about a list.
pub fn upsert_cooldown(list_id: &str, user_id: &str, notified_at: &str) -> Built {
    Query::insert()
        .into_table(NotificationCooldowns::Table)
        .columns([
            NotificationCooldowns::ListId,
            NotificationCooldowns::UserId,
            NotificationCooldowns::LastNotifiedAt,
        ])
        .values_panic([list_id.into(), user_id.into(), notified_at.into()])
        .on_conflict(
            OnConflict::columns([NotificationCooldowns::ListId, NotificationCooldowns::UserId])
                .update_column(NotificationCooldowns::LastNotifiedAt)
                .to_owned(),
        )
        .build(SqliteQueryBuilder)
}
