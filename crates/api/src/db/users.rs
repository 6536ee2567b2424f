//! User / auth query builders.

use sea_query::{Alias, Asterisk, Expr, Func, OnConflict, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::{RefreshTokens, Users};

// ── User lookups ───────────────────────────────────────────────────────────

/// Find user by id. Columns: id, username.
pub fn get_by_id(user_id: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::Username])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Profile fields. Columns: id, username, email, avatar_url, created_at.
pub fn get_profile(user_id: &str) -> Built {
    Query::select()
        .columns([
            Users::Id,
            Users::Username,
            Users::Email,
            Users::AvatarUrl,
            Users::CreatedAt,
        ])
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

fn login_columns() -> sea_query::SelectStatement {
    Query::select()
        .columns([
            Users::Id,
            Users::Username,
            Users::PasswordHash,
            Users::PasswordSalt,
        ])
        .from(Users::Table)
        .to_owned()
}

/// Find user by email for login. Columns: id, username, password_hash, password_salt.
pub fn get_by_email_for_login(email: &str) -> Built {
    login_columns()
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Find user by username for login. Same columns as [`get_by_email_for_login`].
pub fn get_by_username_for_login(username: &str) -> Built {
    login_columns()
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Find user by username (case-insensitive). Columns: id, username.
pub fn get_by_username(username: &str) -> Built {
    Query::select()
        .columns([Users::Id, Users::Username])
        .from(Users::Table)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Count users with this username.
pub fn username_exists(username: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::col(Users::Username).eq(username))
        .build(SqliteQueryBuilder)
}

/// Count users with this email.
pub fn email_exists(email: &str) -> Built {
    Query::select()
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("count"))
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

// ── User inserts ───────────────────────────────────────────────────────────

/// Insert user with email/password.
pub fn insert_with_email(
    id: &str,
    username: &str,
    email: &str,
    password_hash: &str,
    password_salt: &str,
) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::Username,
            Users::Email,
            Users::PasswordHash,
            Users::PasswordSalt,
        ])
        .values_panic([
            id.into(),
            username.into(),
            email.into(),
            password_hash.into(),
            password_salt.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Insert a password-less user if the id is not taken yet.
pub fn insert_external(id: &str, username: &str) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([Users::Id, Users::Username])
        .values_panic([id.into(), username.into()])
        .on_conflict(OnConflict::column(Users::Id).do_nothing().to_owned())
        .build(SqliteQueryBuilder)
}

// ── Refresh tokens ─────────────────────────────────────────────────────────

/// Insert refresh token.
pub fn insert_refresh_token(id: &str, user_id: &str, token_hash: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(RefreshTokens::Table)
        .columns([
            RefreshTokens::Id,
            RefreshTokens::UserId,
            RefreshTokens::TokenHash,
            RefreshTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            user_id.into(),
            token_hash.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Lookup refresh token with user join. Columns: id, user_id, expires_at, username.
pub fn lookup_refresh_token(token_hash: &str) -> Built {
    Query::select()
        .column((RefreshTokens::Table, RefreshTokens::Id))
        .column((RefreshTokens::Table, RefreshTokens::UserId))
        .column((RefreshTokens::Table, RefreshTokens::ExpiresAt))
        .column((Users::Table, Users::Username))
        .from(RefreshTokens::Table)
        .inner_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id))
                .equals((RefreshTokens::Table, RefreshTokens::UserId)),
        )
        .and_where(Expr::col((RefreshTokens::Table, RefreshTokens::TokenHash)).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by hash.
pub fn delete_refresh_token(token_hash: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Delete refresh token by id.
pub fn delete_refresh_token_by_id(id: &str) -> Built {
    Query::delete()
        .from_table(RefreshTokens::Table)
        .and_where(Expr::col(RefreshTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}
