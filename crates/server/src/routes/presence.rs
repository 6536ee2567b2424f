use axum::{
    Json,
    extract::State,
};

use clarydo_api::{PresenceHeartbeatRequest, PresenceUser, SuccessResponse, db as dbq};

use crate::access::ensure_list_access;
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiPath};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, presence_from_row, sq_execute, sq_query_map};

/// PUT /api/presence: heartbeat for the list the caller is looking at.
pub async fn heartbeat(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<PresenceHeartbeatRequest>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    if req.list_id.trim().is_empty() {
        return Err(ApiErr::bad_request("listId is required"));
    }
    let conn = db.conn();
    ensure_list_access(&conn, &req.list_id, &user.user_id)?;
    let display_name = req.display_name.as_deref().or(Some(user.username.as_str()));
    sq_execute(
        &conn,
        dbq::presence::upsert(
            &user.user_id,
            &req.list_id,
            display_name,
            req.avatar_url.as_deref(),
        ),
    )
    .map_err(ApiErr::from_db("presence heartbeat"))?;
    Ok(Json(SuccessResponse::ok()))
}

/// GET /api/presence/:listId: other users seen on the list within the presence window.
pub async fn active_users(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
) -> Result<Json<Vec<PresenceUser>>, ApiErr> {
    let conn = db.conn();
    ensure_list_access(&conn, &list_id, &user.user_id)?;
    let users = sq_query_map(
        &conn,
        dbq::presence::active_for_list(&list_id, &user.user_id),
        presence_from_row,
    )
    .map_err(ApiErr::from_db("active presence"))?;
    Ok(Json(users))
}
