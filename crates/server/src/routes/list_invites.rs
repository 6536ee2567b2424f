use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use rusqlite::Connection;
use uuid::Uuid;

use clarydo_api::{
    AcceptInviteResponse, CreateInviteRequest, CreateInviteResponse, InviteRecord, InviteStatus,
    LatestInviteResponse, ListRole, SuccessResponse, db as dbq,
};

use crate::access::ensure_list_ownership;
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiPath};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, pending_invite_from_row, sq_execute, sq_query_opt, sq_query_row};

/// An invite row as needed to accept or decline it.
#[derive(Debug)]
struct StoredInvite {
    list_id: String,
    invited_user_id: String,
    status: InviteStatus,
}

/// Load an invite addressed to `user_id` that is still pending.
fn pending_invite_for(
    conn: &Connection,
    invite_id: &str,
    user_id: &str,
) -> Result<StoredInvite, ApiErr> {
    let invite = sq_query_opt(conn, dbq::invites::get(invite_id), |row| {
        Ok((
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(4)?,
        ))
    })
    .map_err(ApiErr::from_db("invite lookup"))?
    .ok_or_else(|| ApiErr::not_found("Invite not found"))?;

    let invite = StoredInvite {
        list_id: invite.0,
        invited_user_id: invite.1,
        status: invite.2.parse()?,
    };
    if invite.invited_user_id != user_id {
        return Err(ApiErr::forbidden("this invite is addressed to someone else"));
    }
    if invite.status != InviteStatus::Pending {
        return Err(ApiErr::bad_request("Invite already handled"));
    }
    Ok(invite)
}

fn is_member(conn: &Connection, list_id: &str, user_id: &str) -> Result<bool, ApiErr> {
    sq_query_row(conn, dbq::members::exists(list_id, user_id), |row| {
        row.get::<_, i64>(0)
    })
    .map(|count| count > 0)
    .map_err(ApiErr::from_db("membership lookup"))
}

/// POST /api/list-invites: invite a user by username (owner only).
pub async fn create_invite(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateInviteRequest>,
) -> Result<(StatusCode, Json<CreateInviteResponse>), ApiErr> {
    let (Some(list_id), Some(username)) = (
        req.list_id.as_deref().filter(|v| !v.is_empty()),
        req.username.as_deref().map(str::trim).filter(|v| !v.is_empty()),
    ) else {
        return Err(ApiErr::bad_request("listId and username are required"));
    };

    let conn = db.conn();
    ensure_list_ownership(&conn, list_id, &user.user_id)?;

    let (invited_id, invited_username) =
        sq_query_opt(&conn, dbq::users::get_by_username(username), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(ApiErr::from_db("invitee lookup"))?
        .ok_or_else(|| ApiErr::not_found("User not found"))?;

    if invited_id == user.user_id {
        return Err(ApiErr::bad_request("Cannot invite yourself"));
    }
    if is_member(&conn, list_id, &invited_id)? {
        return Err(ApiErr::bad_request("User is already a member"));
    }

    let pending: i64 = sq_query_row(&conn, dbq::invites::pending_exists(list_id, &invited_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("pending invite lookup"))?;
    if pending > 0 {
        return Err(ApiErr::conflict("Invite already pending"));
    }

    let invite_id = Uuid::new_v4().to_string();
    sq_execute(
        &conn,
        dbq::invites::insert(&invite_id, list_id, &invited_id, &user.user_id),
    )
    .map_err(ApiErr::from_db("create invite"))?;

    let invite = sq_query_row(&conn, dbq::invites::get(&invite_id), |row| {
        Ok(InviteRecord {
            id: row.get(0)?,
            list_id: row.get(1)?,
            invited_user_id: row.get(2)?,
            created_at: row.get(5)?,
        })
    })
    .map_err(ApiErr::from_db("read invite"))?;

    tracing::info!(%list_id, invited = %invited_username, "invite created");
    Ok((
        StatusCode::CREATED,
        Json(CreateInviteResponse {
            invite,
            invited_username,
        }),
    ))
}

/// GET /api/list-invites/latest: newest pending invite for the caller, if any.
pub async fn latest_invite(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<LatestInviteResponse>, ApiErr> {
    let conn = db.conn();
    let invite = sq_query_opt(
        &conn,
        dbq::invites::latest_pending_for(&user.user_id),
        pending_invite_from_row,
    )
    .map_err(ApiErr::from_db("latest invite"))?;
    Ok(Json(LatestInviteResponse { invite }))
}

/// POST /api/list-invites/:id/accept: join the list as an editor.
pub async fn accept_invite(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(invite_id): ApiPath<String>,
) -> Result<Json<AcceptInviteResponse>, ApiErr> {
    let conn = db.conn();
    let invite = pending_invite_for(&conn, &invite_id, &user.user_id)?;

    if !is_member(&conn, &invite.list_id, &user.user_id)? {
        sq_execute(
            &conn,
            dbq::members::insert(&invite.list_id, &user.user_id, ListRole::Editor.as_str()),
        )
        .map_err(ApiErr::from_db("accept invite membership"))?;
    }
    sq_execute(
        &conn,
        dbq::invites::update_status(&invite_id, InviteStatus::Accepted),
    )
    .map_err(ApiErr::from_db("accept invite"))?;

    let list_name = sq_query_opt(&conn, dbq::lists::get_by_id(&invite.list_id), |row| {
        row.get::<_, String>(1)
    })
    .map_err(ApiErr::from_db("accept invite list"))?
    .unwrap_or_default();

    tracing::info!(list_id = %invite.list_id, user_id = %user.user_id, "invite accepted");
    Ok(Json(AcceptInviteResponse {
        success: true,
        list_id: invite.list_id,
        list_name,
    }))
}

/// POST /api/list-invites/:id/decline
pub async fn decline_invite(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(invite_id): ApiPath<String>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    let conn = db.conn();
    pending_invite_for(&conn, &invite_id, &user.user_id)?;
    sq_execute(
        &conn,
        dbq::invites::update_status(&invite_id, InviteStatus::Declined),
    )
    .map_err(ApiErr::from_db("decline invite"))?;
    Ok(Json(SuccessResponse::ok()))
}
