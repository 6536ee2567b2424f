//! Web Push delivery.
//!
//! Handlers never talk to a push service directly: they go through the
//! [`PushSender`] stored in the app state, so tests can swap in a recorder
//! and servers without VAPID keys fall back to [`NoopPushSender`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessage, WebPushMessageBuilder,
};

use clarydo_api::db as dbq;
use clarydo_api::{NotificationPayload, PushKeys, PushSubscriptionRequest};

use crate::config::AppConfig;
use crate::storage::{Db, sq_execute, sq_query_map};

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The push service no longer knows this subscription (404/410).
    #[error("push subscription is gone")]
    Gone,
    #[error("push delivery failed: {0}")]
    Failed(String),
    #[error("encoding push payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<WebPushError> for PushError {
    fn from(e: WebPushError) -> Self {
        match e.short_description() {
            "endpoint_not_valid" | "endpoint_not_found" => Self::Gone,
            _ => Self::Failed(e.to_string()),
        }
    }
}

/// Delivers one notification to one browser subscription.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscriptionRequest,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}

/// Web Push with VAPID.
pub struct WebPushSender {
    client: IsahcWebPushClient,
    private_key: String,
    subject: String,
}

impl WebPushSender {
    pub fn new(private_key: impl Into<String>, subject: impl Into<String>) -> Result<Self, PushError> {
        Ok(Self {
            client: IsahcWebPushClient::new()?,
            private_key: private_key.into(),
            subject: subject.into(),
        })
    }

    fn build_message(
        &self,
        subscription: &PushSubscriptionRequest,
        payload: &NotificationPayload,
    ) -> Result<WebPushMessage, PushError> {
        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );
        let body = serde_json::to_vec(payload)?;

        let mut signature = VapidSignatureBuilder::from_base64(&self.private_key, &info)?;
        signature.add_claim("sub", self.subject.as_str());

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, &body);
        builder.set_vapid_signature(signature.build()?);
        Ok(builder.build()?)
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &PushSubscriptionRequest,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let message = self.build_message(subscription, payload)?;
        self.client.send(message).await?;
        Ok(())
    }
}

/// Used when no VAPID key is configured: logs and drops every notification.
pub struct NoopPushSender;

#[async_trait]
impl PushSender for NoopPushSender {
    async fn send(
        &self,
        subscription: &PushSubscriptionRequest,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        tracing::debug!(
            endpoint = %subscription.endpoint,
            title = %payload.title,
            "push disabled, dropping notification"
        );
        Ok(())
    }
}

/// Pick the sender for this configuration.
pub fn sender_from_config(config: &AppConfig) -> Arc<dyn PushSender> {
    let Some(key) = config.vapid_private_key.as_deref() else {
        tracing::warn!("VAPID_PRIVATE_KEY not set, push notifications are disabled");
        return Arc::new(NoopPushSender);
    };
    match WebPushSender::new(key, config.vapid_subject.as_str()) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            tracing::error!("push client setup failed, push notifications are disabled: {e}");
            Arc::new(NoopPushSender)
        }
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PushReport {
    pub sent: usize,
    pub failed: usize,
    pub removed: usize,
}

fn subscription_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PushSubscriptionRequest> {
    Ok(PushSubscriptionRequest {
        endpoint: row.get(0)?,
        keys: PushKeys {
            p256dh: row.get(1)?,
            auth: row.get(2)?,
        },
    })
}

/// Send `payload` to every subscription of `user_id` concurrently.
///
/// Subscriptions the push service reports as gone are deleted.
pub async fn send_push_to_user(
    db: &Db,
    sender: &Arc<dyn PushSender>,
    user_id: &str,
    payload: &NotificationPayload,
) -> anyhow::Result<PushReport> {
    let subscriptions = {
        let conn = db.conn();
        sq_query_map(&conn, dbq::push::list_for_user(user_id), subscription_from_row)?
    };

    let mut report = PushReport::default();
    if subscriptions.is_empty() {
        return Ok(report);
    }

    let payload = Arc::new(payload.clone());
    let mut tasks = JoinSet::new();
    for subscription in subscriptions {
        let sender = Arc::clone(sender);
        let payload = Arc::clone(&payload);
        tasks.spawn(async move {
            let result = sender.send(&subscription, &payload).await;
            (subscription.endpoint, result)
        });
    }

    let mut gone = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.sent += 1,
            Ok((endpoint, Err(PushError::Gone))) => gone.push(endpoint),
            Ok((endpoint, Err(e))) => {
                tracing::warn!(%endpoint, "push delivery failed: {e}");
                report.failed += 1;
            }
            Err(e) => {
                tracing::error!("push task aborted: {e}");
                report.failed += 1;
            }
        }
    }

    if !gone.is_empty() {
        let conn = db.conn();
        for endpoint in &gone {
            sq_execute(&conn, dbq::push::delete_endpoint(user_id, endpoint))?;
            tracing::info!(%endpoint, "removed expired push subscription");
        }
        report.removed = gone.len();
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ensure_dev_user, init_db};
    use clarydo_api::service::DEV_USER_ID;

    /// Rejects endpoints containing "gone", accepts everything else.
    struct FlakySender;

    #[async_trait]
    impl PushSender for FlakySender {
        async fn send(
            &self,
            subscription: &PushSubscriptionRequest,
            _payload: &NotificationPayload,
        ) -> Result<(), PushError> {
            if subscription.endpoint.contains("gone") {
                Err(PushError::Gone)
            } else if subscription.endpoint.contains("broken") {
                Err(PushError::Failed("503".into()))
            } else {
                Ok(())
            }
        }
    }

    fn payload() -> NotificationPayload {
        NotificationPayload {
            title: "Groceries".into(),
            body: "The list was updated".into(),
            tag: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn gone_subscriptions_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        ensure_dev_user(&db).unwrap();
        {
            let conn = db.conn();
            for endpoint in ["https://push/ok", "https://push/gone", "https://push/broken"] {
                sq_execute(&conn, dbq::push::upsert(DEV_USER_ID, endpoint, "k", "a")).unwrap();
            }
        }

        let sender: Arc<dyn PushSender> = Arc::new(FlakySender);
        let report = send_push_to_user(&db, &sender, DEV_USER_ID, &payload())
            .await
            .unwrap();
        assert_eq!(
            report,
            PushReport {
                sent: 1,
                failed: 1,
                removed: 1
            }
        );

        let conn = db.conn();
        let left = sq_query_map(&conn, dbq::push::list_for_user(DEV_USER_ID), subscription_from_row)
            .unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|s| !s.endpoint.contains("gone")));
    }

    #[tokio::test]
    async fn no_subscriptions_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        let sender: Arc<dyn PushSender> = Arc::new(NoopPushSender);
        let report = send_push_to_user(&db, &sender, "nobody", &payload())
            .await
            .unwrap();
        assert_eq!(report, PushReport::default());
    }

    #[test]
    fn missing_vapid_key_uses_noop_sender() {
        // Only checks that setup does not fail without keys.
        let _sender = sender_from_config(&AppConfig::default());
    }
}
