//! Change notifications for list collaborators.

use std::sync::Arc;

use chrono::Utc;

use clarydo_api::db as dbq;
use clarydo_api::{NotificationPayload, service};

use crate::AppState;
use crate::push::{PushSender, send_push_to_user};
use crate::storage::{Db, sq_execute, sq_query_map, sq_query_opt};

/// Body shown for every list change notification.
pub const LIST_UPDATED_BODY: &str = "The list was updated";

pub fn list_updated_payload(list_id: &str, list_name: &str) -> NotificationPayload {
    NotificationPayload {
        title: list_name.to_string(),
        body: LIST_UPDATED_BODY.to_string(),
        tag: Some(format!("list-{list_id}")),
        url: Some(format!("/?list={list_id}")),
    }
}

/// Notify everyone on a list except `changed_by`, honouring the per-user cooldown.
///
/// Returns the user ids that were notified.
pub async fn notify_list_members(
    db: &Db,
    sender: &Arc<dyn PushSender>,
    list_id: &str,
    changed_by: &str,
) -> anyhow::Result<Vec<String>> {
    let now = Utc::now();

    let (list_name, due) = {
        let conn = db.conn();
        let list = sq_query_opt(&conn, dbq::lists::get_by_id(list_id), |row| {
            Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        let Some((list_name, owner_id)) = list else {
            return Ok(Vec::new());
        };

        let member_ids: Vec<String> =
            sq_query_map(&conn, dbq::members::member_ids(list_id), |row| row.get(0))?;

        let mut due = Vec::new();
        for user_id in service::notification_recipients(&owner_id, &member_ids, changed_by) {
            let last: Option<String> =
                sq_query_opt(&conn, dbq::push::get_cooldown(list_id, &user_id), |row| {
                    row.get(0)
                })?;
            if service::cooldown_elapsed(last.as_deref(), now) {
                due.push(user_id);
            }
        }
        (list_name, due)
    };

    let payload = list_updated_payload(list_id, &list_name);
    let notified_at = service::format_sqlite_datetime(now);
    for user_id in &due {
        if let Err(e) = send_push_to_user(db, sender, user_id, &payload).await {
            tracing::warn!(%user_id, "list notification failed: {e}");
        }
        let conn = db.conn();
        sq_execute(&conn, dbq::push::upsert_cooldown(list_id, user_id, &notified_at))?;
        drop(conn);
    }

    Ok(due)
}

/// Fire-and-forget [`notify_list_members`] so the handler can respond right away.
pub fn spawn_list_notification(state: &AppState, list_id: &str, changed_by: &str) {
    let db = state.db.clone();
    let sender = Arc::clone(&state.push);
    let list_id = list_id.to_string();
    let changed_by = changed_by.to_string();
    tokio::spawn(async move {
        match notify_list_members(&db, &sender, &list_id, &changed_by).await {
            Ok(notified) if !notified.is_empty() => {
                tracing::debug!(%list_id, count = notified.len(), "list change notified");
            }
            Ok(_) => {}
            Err(e) => tracing::error!(%list_id, "notify list members: {e}"),
        }
    });
}
