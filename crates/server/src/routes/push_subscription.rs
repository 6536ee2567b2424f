use std::sync::Arc;

use axum::{Json, extract::State};

use clarydo_api::{
    NotificationPayload, PushSubscriptionRequest, SuccessResponse, TestPushResponse, db as dbq,
};

use crate::error::ApiErr;
use crate::extract::ApiJson;
use crate::push::{PushSender, send_push_to_user};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_execute};

/// POST /api/push-subscription: store the browser's subscription for the caller.
pub async fn subscribe(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<PushSubscriptionRequest>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    if req.endpoint.trim().is_empty() || req.keys.p256dh.is_empty() || req.keys.auth.is_empty() {
        return Err(ApiErr::bad_request("endpoint and keys are required"));
    }
    let conn = db.conn();
    sq_execute(
        &conn,
        dbq::push::upsert(&user.user_id, &req.endpoint, &req.keys.p256dh, &req.keys.auth),
    )
    .map_err(ApiErr::from_db("save push subscription"))?;
    Ok(Json(SuccessResponse::ok()))
}

/// DELETE /api/push-subscription: drop every subscription of the caller.
pub async fn unsubscribe(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<SuccessResponse>, ApiErr> {
    let conn = db.conn();
    sq_execute(&conn, dbq::push::delete_for_user(&user.user_id))
        .map_err(ApiErr::from_db("delete push subscriptions"))?;
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/test-push: send a test notification to the caller's devices.
pub async fn test_push(
    State(db): State<Db>,
    State(sender): State<Arc<dyn PushSender>>,
    user: AuthUser,
) -> Result<Json<TestPushResponse>, ApiErr> {
    let payload = NotificationPayload {
        title: "Test Notification".into(),
        body: "Push notifications are working!".into(),
        tag: Some("test".into()),
        url: Some("/".into()),
    };
    let report = send_push_to_user(&db, &sender, &user.user_id, &payload)
        .await
        .map_err(ApiErr::from_db("test push"))?;
    tracing::debug!(user_id = %user.user_id, ?report, "test push sent");
    Ok(Json(TestPushResponse {
        success: true,
        message: "Notification sent".into(),
    }))
}
