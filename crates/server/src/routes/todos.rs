use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use uuid::Uuid;

use clarydo_api::{
    CreateTodoRequest, SuccessResponse, Todo, TodoListQuery, UpdateTodoRequest, db as dbq, service,
};

use crate::AppState;
use crate::access::{ensure_can_edit, ensure_list_access};
use crate::error::ApiErr;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::notify::spawn_list_notification;
use crate::routes::auth::AuthUser;
use crate::storage::{Db, sq_execute, sq_query_map, sq_query_opt, sq_query_row, todo_from_row};

const NO_STORE: &str = "no-store, no-cache, must-revalidate";

/// Parent list of a todo, 404 if the todo does not exist.
fn todo_list_id(conn: &rusqlite::Connection, todo_id: &str) -> Result<String, ApiErr> {
    sq_query_opt(conn, dbq::todos::list_id_of(todo_id), |row| row.get(0))
        .map_err(ApiErr::from_db("todo lookup"))?
        .ok_or_else(|| ApiErr::not_found("Todo not found"))
}

/// Bump the list's `updated_at`. A failure only affects list ordering.
fn touch_list(conn: &rusqlite::Connection, list_id: &str) {
    if let Err(e) = sq_execute(conn, dbq::lists::touch(list_id)) {
        tracing::warn!(%list_id, "touch list: {e}");
    }
}

/// GET /api/todos?listId=: todos of a list, newest first. Never cached.
pub async fn list_todos(
    State(db): State<Db>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<TodoListQuery>,
) -> Result<impl IntoResponse, ApiErr> {
    let list_id = service::require_field(query.list_id.as_deref(), "listId")?;

    let conn = db.conn();
    ensure_list_access(&conn, list_id, &user.user_id)?;
    let todos: Vec<Todo> = sq_query_map(&conn, dbq::todos::list_by_list(list_id), todo_from_row)
        .map_err(ApiErr::from_db("list todos"))?;

    Ok(([(header::CACHE_CONTROL, NO_STORE)], Json(todos)))
}

/// POST /api/todos: add a todo to a list (owner or editor).
pub async fn create_todo(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<Todo>), ApiErr> {
    let text = service::validate_todo_text(&req.text)?;
    let list_id = service::require_field(req.list_id.as_deref(), "listId")?;
    let todo_id = Uuid::new_v4().to_string();

    let todo = {
        let conn = state.db.conn();
        ensure_can_edit(&conn, list_id, &user.user_id)?;
        sq_execute(&conn, dbq::todos::insert(&todo_id, list_id, &text))
            .map_err(ApiErr::from_db("create todo"))?;
        touch_list(&conn, list_id);
        sq_query_row(&conn, dbq::todos::get(&todo_id), todo_from_row)
            .map_err(ApiErr::from_db("read todo"))?
    };

    spawn_list_notification(&state, list_id, &user.user_id);
    Ok((StatusCode::CREATED, Json(todo)))
}

/// PATCH /api/todos/:id: change text and/or done (owner or editor).
pub async fn update_todo(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(todo_id): ApiPath<String>,
    ApiJson(req): ApiJson<UpdateTodoRequest>,
) -> Result<Json<Todo>, ApiErr> {
    let update = service::normalize_todo_update(&req)?;

    let todo = {
        let conn = state.db.conn();
        let list_id = todo_list_id(&conn, &todo_id)?;
        ensure_can_edit(&conn, &list_id, &user.user_id)?;

        if let Some(built) = dbq::todos::update(&todo_id, &update) {
            sq_execute(&conn, built).map_err(ApiErr::from_db("update todo"))?;
        }
        touch_list(&conn, &list_id);
        sq_query_row(&conn, dbq::todos::get(&todo_id), todo_from_row)
            .map_err(ApiErr::from_db("read todo"))?
    };

    spawn_list_notification(&state, &todo.list_id, &user.user_id);
    Ok(Json(todo))
}

/// DELETE /api/todos/:id: remove a todo (owner or editor).
pub async fn delete_todo(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(todo_id): ApiPath<String>,
) -> Result<Json<SuccessResponse>, ApiErr> {
    let list_id = {
        let conn = state.db.conn();
        let list_id = todo_list_id(&conn, &todo_id)?;
        ensure_can_edit(&conn, &list_id, &user.user_id)?;
        sq_execute(&conn, dbq::todos::delete(&todo_id)).map_err(ApiErr::from_db("delete todo"))?;
        touch_list(&conn, &list_id);
        list_id
    };

    spawn_list_notification(&state, &list_id, &user.user_id);
    Ok(Json(SuccessResponse::ok()))
}
