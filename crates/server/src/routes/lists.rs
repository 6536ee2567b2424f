use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use clarydo_api::{
    CreateListRequest, JoinListResponse, ListRole, ListSummary, SuccessResponse,
    UpdateListRequest, db as dbq, service,
};

use crate::access::ensure_list_ownership;
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiPath};
use crate::routes::auth::AuthUser;
use crate::storage::{Db, list_from_row, sq_execute, sq_query_map, sq_query_opt, sq_query_row};

/// Read a list back as the owner sees it.
fn owner_view(conn: &rusqlite::Connection, list_id: &str) -> Result<ListSummary, ApiErr> {
    sq_query_row(conn, dbq::lists::get_by_id(list_id), |row| {
        Ok(ListSummary {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            role: ListRole::Owner,
        })
    })
    .map_err(ApiErr::from_db("read list"))
}

/// GET /api/lists: lists the caller owns or is a member of, most recently updated first.
pub async fn list_lists(
    State(db): State<Db>,
    user: AuthUser,
) -> Result<Json<Vec<ListSummary>>, ApiErr> {
    let conn = db.conn();
    let lists = sq_query_map(&conn, dbq::lists::list_for_user(&user.user_id), list_from_row)
        .map_err(ApiErr::from_db("list lists"))?;
    Ok(Json(lists))
}

/// POST /api/lists: create a list owned by the caller.
pub async fn create_list(
    State(db): State<Db>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateListRequest>,
) -> Result<(StatusCode, Json<ListSummary>), ApiErr> {
    let name = service::validate_list_name(&req.name)?;
    let list_id = Uuid::new_v4().to_string();

    let conn = db.conn();
    sq_execute(&conn, dbq::lists::insert(&list_id, &name, &user.user_id))
        .map_err(ApiErr::from_db("create list"))?;

    // Access checks fall back to owner_id, so a missing owner row is not fatal.
    if let Err(e) = sq_execute(
        &conn,
        dbq::members::insert(&list_id, &user.user_id, ListRole::Owner.as_str()),
    ) {
        tracing::error!(%list_id, "insert owner membership: {e}");
    }

    let list = owner_view(&conn, &list_id)?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// PATCH /api/lists/:id: rename a list (owner only).
pub async fn update_list(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateListRequest>,
) -> Result<Json<ListSummary>, ApiErr> {
    let conn = db.conn();
    ensure_list_ownership(&conn, &list_id, &user.user_id)?;
    let name = service::validate_list_name(&req.name)?;

    sq_execute(&conn, dbq::lists::update_name(&list_id, &name))
        .map_err(ApiErr::from_db("rename list"))?;

    Ok(Json(owner_view(&conn, &list_id)?))
}

/// DELETE /api/lists/:id: delete a list with its todos, members and invites (owner only).
pub async fn delete_list(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    let conn = db.conn();
    ensure_list_ownership(&conn, &list_id, &user.user_id)?;
    sq_execute(&conn, dbq::lists::delete(&list_id)).map_err(ApiErr::from_db("delete list"))?;
    tracing::info!(%list_id, "list deleted");
    Ok(Json(SuccessResponse::ok()))
}

/// POST /api/lists/:id/join: join a shared list through its invite link as an editor.
pub async fn join_list(
    State(db): State<Db>,
    user: AuthUser,
    ApiPath(list_id): ApiPath<String>,
) -> Result<Json<JoinListResponse>, ApiErr> {
    let conn = db.conn();
    let list = sq_query_opt(&conn, dbq::lists::get_by_id(&list_id), |row| {
        Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
    })
    .map_err(ApiErr::from_db("join list lookup"))?;
    let Some((list_name, owner_id)) = list else {
        return Err(ApiErr::not_found("List not found"));
    };

    let already = |msg: &str| {
        ApiErr::bad_request(msg)
            .with_field("listId", list_id.as_str())
            .with_field("listName", list_name.as_str())
    };

    if owner_id == user.user_id {
        return Err(already("You are already the owner of this list"));
    }

    let is_member: i64 = sq_query_row(&conn, dbq::members::exists(&list_id, &user.user_id), |row| {
        row.get(0)
    })
    .map_err(ApiErr::from_db("join list membership"))?;
    if is_member > 0 {
        return Err(already("You are already a member of this list"));
    }

    sq_execute(
        &conn,
        dbq::members::insert(&list_id, &user.user_id, ListRole::Editor.as_str()),
    )
    .map_err(ApiErr::from_db("join list"))?;

    tracing::info!(%list_id, user_id = %user.user_id, "joined list via link");
    Ok(Json(JoinListResponse {
        success: true,
        list_id,
        list_name,
    }))
}
