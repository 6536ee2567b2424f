use axum::{
    Json,
    extract::State,
    http::StatusCode,
};

use clarydo_api::{
    AddMemberRequest, MemberResponse, RemoveMemberQuery, SuccessResponse, db as dbq, service,
};

use crate::access::{ensure_list_access, ensure_list_ownership};
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::auth::AuthUser;
use crate::storage::{
    Db, is_constraint_violation, member_from_row, sq_execute, sq_query_map, sq_query_opt,
    sq_query_row,
};

/// POST /api/list-members: add a user to a list directly (owner only).
pub async fn add_member(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiErr> {
    let (Some(list_id), Some(member_id)) = (req.list_id.as_deref(), req.user_id.as_deref()) else {
        return Err(ApiErr::bad_request("listId and userId are required"));
    };
    let role = service::member_role_for_add(req.role)?;

    let conn = db.conn();
    ensure_list_ownership(&conn, list_id, &user.user_id)?;

    let exists = sq_query_opt(&conn, dbq::users::get_by_id(member_id), |row| {
        row.get::<_, String>(0)
    })
    .map_err(ApiErr::from_db("member user lookup"))?;
    if exists.is_none() {
        return Err(ApiErr::not_found("user not found"));
    }

    sq_execute(&conn, dbq::members::insert(list_id, member_id, role.as_str())).map_err(|e| {
        if is_constraint_violation(&e) {
            ApiErr::conflict("user is already a member of this list")
        } else {
            ApiErr::from_db("add member")(e)
        }
    })?;

    let member = sq_query_row(&conn, dbq::members::get(list_id, member_id), member_from_row)
        .map_err(ApiErr::from_db("read member"))?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// GET /api/list-members/:listId: everyone on a list (owner only).
pub async fn list_members(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
) -> Result<Json<Vec<MemberResponse>>, ApiErr> {
    let conn = db.conn();
    ensure_list_ownership(&conn, &list_id, &user.user_id)?;
    let members = sq_query_map(&conn, dbq::members::list(&list_id), member_from_row)
        .map_err(ApiErr::from_db("list members"))?;
    Ok(Json(members))
}

/// DELETE /api/list-members/:listId?userId=: remove a member, or leave the list
/// when `userId` is omitted.
pub async fn remove_member(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<RemoveMemberQuery>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    let target = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| user.user_id.clone());

    let conn = db.conn();
    let role = ensure_list_access(&conn, &list_id, &user.user_id)?;
    service::check_member_removal(&user.user_id, role, &target)?;

    sq_execute(&conn, dbq::members::delete(&list_id, &target))
        .map_err(ApiErr::from_db("remove member"))?;
    tracing::info!(%list_id, user_id = %target, "member removed");
    Ok(Json(SuccessResponse::ok()))
}
