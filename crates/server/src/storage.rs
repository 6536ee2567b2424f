use anyhow::{Context, Result};
use rusqlite::{Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use clarydo_api::db::{self as dbq, Built};
use clarydo_api::service::{DEV_USER_ID, DEV_USERNAME};
use clarydo_api::{ListRole, ListSummary, MemberResponse, PendingInvite, PresenceUser, Todo};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("clarydo.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in dbq::migrations::MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("checking applied migrations")?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

/// Make sure the fixed dev user exists (dev auth mode).
pub fn ensure_dev_user(db: &Db) -> Result<()> {
    let conn = db.conn();
    sq_execute(&conn, dbq::users::insert_external(DEV_USER_ID, DEV_USERNAME))
        .context("inserting dev user")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query bindings
// ---------------------------------------------------------------------------

fn to_sql_value(value: &sea_query::Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    use sea_query::Value as Sq;

    match value {
        Sq::Bool(Some(b)) => Sql::Integer(i64::from(*b)),
        Sq::TinyInt(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::SmallInt(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::Int(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::BigInt(Some(i)) => Sql::Integer(*i),
        Sq::TinyUnsigned(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::SmallUnsigned(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::Unsigned(Some(i)) => Sql::Integer(i64::from(*i)),
        Sq::BigUnsigned(Some(i)) => Sql::Integer(i64::try_from(*i).unwrap_or(i64::MAX)),
        Sq::Float(Some(f)) => Sql::Real(f64::from(*f)),
        Sq::Double(Some(f)) => Sql::Real(*f),
        Sq::String(Some(s)) => Sql::Text(String::clone(s)),
        Sq::Char(Some(c)) => Sql::Text(c.to_string()),
        Sq::Bytes(Some(b)) => Sql::Blob(Vec::clone(b)),
        _ => Sql::Null,
    }
}

fn bind(built: &Built) -> Vec<rusqlite::types::Value> {
    built.1.0.iter().map(to_sql_value).collect()
}

/// Execute a built statement. Returns the number of changed rows.
pub fn sq_execute(conn: &Connection, built: Built) -> rusqlite::Result<usize> {
    let params = bind(&built);
    conn.execute(&built.0, rusqlite::params_from_iter(params.iter()))
}

/// Run a built query expecting exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    let params = bind(&built);
    conn.query_row(&built.0, rusqlite::params_from_iter(params.iter()), f)
}

/// Run a built query expecting zero or one row.
pub fn sq_query_opt<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    match sq_query_row(conn, built, f) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Run a built query and map every row.
pub fn sq_query_map<T, F>(conn: &Connection, built: Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let params = bind(&built);
    let mut stmt = conn.prepare(&built.0)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), f)?;
    rows.collect()
}

/// `true` for UNIQUE / PRIMARY KEY violations.
pub fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn role_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ListRole> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown role {raw:?}").into(),
        )
    })
}

/// Map a row from [`dbq::lists::list_for_user`].
pub fn list_from_row(row: &Row<'_>) -> rusqlite::Result<ListSummary> {
    Ok(ListSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        role: role_column(row, 4)?,
    })
}

/// Map a row from [`dbq::todos::get`] / [`dbq::todos::list_by_list`].
pub fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        text: row.get(1)?,
        done: row.get(2)?,
        created_at: row.get(3)?,
        list_id: row.get(4)?,
    })
}

/// Map a row from [`dbq::members::get`] / [`dbq::members::list`].
pub fn member_from_row(row: &Row<'_>) -> rusqlite::Result<MemberResponse> {
    Ok(MemberResponse {
        list_id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        role: role_column(row, 3)?,
        created_at: row.get(4)?,
    })
}

/// Map a row from [`dbq::invites::latest_pending_for`].
pub fn pending_invite_from_row(row: &Row<'_>) -> rusqlite::Result<PendingInvite> {
    Ok(PendingInvite {
        id: row.get(0)?,
        list_id: row.get(1)?,
        list_name: row.get(2)?,
        inviter_username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Map a row from [`dbq::presence::active_for_list`].
pub fn presence_from_row(row: &Row<'_>) -> rusqlite::Result<PresenceUser> {
    Ok(PresenceUser {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        avatar_url: row.get(2)?,
        last_seen: row.get(3)?,
    })
}
