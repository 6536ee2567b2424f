//! List access checks shared by the list, todo, member, invite and presence routes.

use rusqlite::Connection;

use clarydo_api::db as dbq;
use clarydo_api::{ListRole, service};

use crate::error::ApiErr;
use crate::storage::sq_query_opt;

/// Resolve the caller's role on a list.
///
/// 404 when the list does not exist, 403 when the caller is neither owner nor member.
pub fn ensure_list_access(
    conn: &Connection,
    list_id: &str,
    user_id: &str,
) -> Result<ListRole, ApiErr> {
    let row = sq_query_opt(conn, dbq::lists::access_row(list_id, user_id), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
    })
    .map_err(ApiErr::from_db("list access"))?;

    let Some((owner_id, membership)) = row else {
        return Err(ApiErr::not_found("list not found"));
    };
    let membership = membership
        .map(|role| role.parse::<ListRole>())
        .transpose()?;

    Ok(service::resolve_list_role(&owner_id, user_id, membership)?)
}

/// Like [`ensure_list_access`], but only the owner passes.
pub fn ensure_list_ownership(
    conn: &Connection,
    list_id: &str,
    user_id: &str,
) -> Result<(), ApiErr> {
    let role = ensure_list_access(conn, list_id, user_id)?;
    service::require_owner(role)?;
    Ok(())
}

/// Owners and editors pass; viewers get 403.
pub fn ensure_can_edit(conn: &Connection, list_id: &str, user_id: &str) -> Result<ListRole, ApiErr> {
    let role = ensure_list_access(conn, list_id, user_id)?;
    service::require_editor(role)?;
    Ok(role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Db, init_db, sq_execute};
    use axum::http::StatusCode;

    fn setup() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        {
            let conn = db.conn();
            for (id, name) in [("owner", "olga"), ("editor", "ed"), ("viewer", "vic"), ("stranger", "sam")] {
                sq_execute(&conn, dbq::users::insert_external(id, name)).unwrap();
            }
            sq_execute(&conn, dbq::lists::insert("l1", "Home", "owner")).unwrap();
            sq_execute(&conn, dbq::members::insert("l1", "editor", "editor")).unwrap();
            sq_execute(&conn, dbq::members::insert("l1", "viewer", "viewer")).unwrap();
        }
        (dir, db)
    }

    #[test]
    fn owner_without_member_row_is_owner() {
        let (_dir, db) = setup();
        let conn = db.conn();
        assert_eq!(ensure_list_access(&conn, "l1", "owner").unwrap(), ListRole::Owner);
        assert_eq!(ensure_list_access(&conn, "l1", "editor").unwrap(), ListRole::Editor);
    }

    #[test]
    fn unknown_list_and_stranger_are_rejected() {
        let (_dir, db) = setup();
        let conn = db.conn();
        let err = ensure_list_access(&conn, "missing", "owner").unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let err = ensure_list_access(&conn, "l1", "stranger").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn viewers_cannot_edit_and_editors_cannot_own() {
        let (_dir, db) = setup();
        let conn = db.conn();
        assert!(ensure_can_edit(&conn, "l1", "editor").is_ok());
        assert_eq!(
            ensure_can_edit(&conn, "l1", "viewer").unwrap_err().status(),
            StatusCode::FORBIDDEN
        );
        assert!(ensure_list_ownership(&conn, "l1", "owner").is_ok());
        assert_eq!(
            ensure_list_ownership(&conn, "l1", "editor").unwrap_err().status(),
            StatusCode::FORBIDDEN
        );
    }
}
