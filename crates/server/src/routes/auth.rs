use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

use clarydo_api::{
    AuthTokenResponse, CheckUsernameRequest, CheckUsernameResponse, LoginRequest, LogoutRequest,
    OkResponse, ProfileResponse, RefreshRequest, RegisterRequest, crypto, db as dbq,
    service::{self, DEV_USER_ID, LoginIdentifier},
};

use crate::AppConfig;
use crate::error::ApiErr;
use crate::extract::ApiJson;
use crate::storage::{Db, is_constraint_violation, sq_execute, sq_query_opt, sq_query_row};

fn now_unix() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated user resolved from `Authorization: Bearer <jwt>`.
///
/// With dev auth enabled, a request without the header acts as the dev user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Db: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(service::bearer_token);

        let user_id = match token {
            Some(token) => {
                if config.jwt_secret.is_empty() {
                    return Err(ApiErr::unauthorized("token auth is not configured"));
                }
                crypto::verify_jwt(token, &config.jwt_secret, now_unix())?
            }
            None if config.dev_auth => DEV_USER_ID.to_string(),
            None => return Err(ApiErr::unauthorized("Unauthorized")),
        };

        let db = Db::from_ref(state);
        let conn = db.conn();
        let username = sq_query_opt(&conn, dbq::users::get_by_id(&user_id), |row| {
            row.get::<_, String>(1)
        })
        .map_err(ApiErr::from_db("auth user lookup"))?
        .ok_or_else(|| ApiErr::unauthorized("user not found"))?;

        Ok(AuthUser { user_id, username })
    }
}

/// Issue a token pair and persist the refresh token hash.
fn issue_tokens(
    db: &Db,
    config: &AppConfig,
    user_id: &str,
    username: &str,
) -> Result<AuthTokenResponse, ApiErr> {
    let bundle = service::prepare_token_bundle(&config.jwt_secret, user_id, username, now_unix())?;
    let conn = db.conn();
    sq_execute(
        &conn,
        dbq::users::insert_refresh_token(
            &bundle.token_id,
            user_id,
            &bundle.token_hash,
            &bundle.expires_at,
        ),
    )
    .map_err(ApiErr::from_db("insert refresh token"))?;
    Ok(bundle.response)
}

fn count(db: &Db, built: dbq::Built) -> Result<i64, ApiErr> {
    let conn = db.conn();
    sq_query_row(&conn, built, |row| row.get(0)).map_err(ApiErr::from_db("count query"))
}

// ---------------------------------------------------------------------------
// Register
// ---------------------------------------------------------------------------

/// POST /api/auth/register: create an account and log it in.
pub async fn register(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthTokenResponse>), ApiErr> {
    if config.jwt_secret.is_empty() {
        return Err(ApiErr::internal("JWT_SECRET not configured"));
    }
    let email = service::validate_email(&req.email)?;
    let username = service::validate_username(&req.username)?;
    service::validate_password(&req.password)?;

    if count(&db, dbq::users::email_exists(&email))? > 0 {
        return Err(ApiErr::conflict("email already registered"));
    }
    if count(&db, dbq::users::username_exists(&username))? > 0 {
        return Err(ApiErr::conflict("username already taken"));
    }

    let (password_hash, password_salt) = crypto::hash_password(&req.password)?;
    let user_id = Uuid::new_v4().to_string();

    {
        let conn = db.conn();
        sq_execute(
            &conn,
            dbq::users::insert_with_email(&user_id, &username, &email, &password_hash, &password_salt),
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ApiErr::conflict("username or email already taken")
            } else {
                ApiErr::from_db("insert user")(e)
            }
        })?;
    }

    tracing::info!(%user_id, %username, "user registered");
    let tokens = issue_tokens(&db, &config, &user_id, &username)?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// POST /api/auth/login: email or username plus password.
pub async fn login(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    if req.password.is_empty() {
        return Err(ApiErr::bad_request("identifier and password are required"));
    }
    let identifier = service::parse_login_identifier(&req.identifier)?;

    let (built, by_username) = match &identifier {
        LoginIdentifier::Email(email) => (dbq::users::get_by_email_for_login(email), false),
        LoginIdentifier::Username(name) => (dbq::users::get_by_username_for_login(name), true),
    };

    let row = {
        let conn = db.conn();
        sq_query_opt(&conn, built, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(ApiErr::from_db("login lookup"))?
    };

    let Some((user_id, username, hash, salt)) = row else {
        return Err(if by_username {
            ApiErr::not_found("username not found")
        } else {
            ApiErr::unauthorized("invalid credentials")
        });
    };

    let (Some(hash), Some(salt)) = (hash, salt) else {
        return Err(ApiErr::unauthorized("invalid credentials"));
    };
    if !crypto::verify_password(&req.password, &hash, &salt) {
        return Err(ApiErr::unauthorized("invalid credentials"));
    }

    let tokens = issue_tokens(&db, &config, &user_id, &username)?;
    Ok(Json(tokens))
}

// ---------------------------------------------------------------------------
// Refresh / logout
// ---------------------------------------------------------------------------

/// POST /api/auth/refresh: rotate the refresh token.
pub async fn refresh(
    State(db): State<Db>,
    State(config): State<AppConfig>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);

    let (token_id, user_id, username) = {
        let conn = db.conn();
        let row = sq_query_opt(&conn, dbq::users::lookup_refresh_token(&token_hash), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(ApiErr::from_db("refresh token lookup"))?;
        let Some((token_id, user_id, expires_at, username)) = row else {
            return Err(ApiErr::unauthorized("invalid refresh token"));
        };

        sq_execute(&conn, dbq::users::delete_refresh_token_by_id(&token_id))
            .map_err(ApiErr::from_db("delete refresh token"))?;

        let now = service::format_sqlite_datetime(chrono::Utc::now());
        if expires_at < now {
            return Err(ApiErr::unauthorized("refresh token expired"));
        }
        (token_id, user_id, username)
    };

    tracing::debug!(%token_id, "refresh token rotated");
    let tokens = issue_tokens(&db, &config, &user_id, &username)?;
    Ok(Json(tokens))
}

/// POST /api/auth/logout: invalidate a refresh token.
pub async fn logout(
    State(db): State<Db>,
    ApiJson(req): ApiJson<LogoutRequest>,
) -> Result<Json<OkResponse>, ApiErr> {
    let token_hash = crypto::hash_token(&req.refresh_token);
    let conn = db.conn();
    sq_execute(&conn, dbq::users::delete_refresh_token(&token_hash))
        .map_err(ApiErr::from_db("logout"))?;
    Ok(Json(OkResponse { ok: true }))
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// GET /api/auth/me: profile of the current user.
pub async fn me(State(db): State<Db>, user: AuthUser) -> Result<Json<ProfileResponse>, ApiErr> {
    let conn = db.conn();
    sq_query_row(&conn, dbq::users::get_profile(&user.user_id), |row| {
        Ok(ProfileResponse {
            user_id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            avatar_url: row.get(3)?,
            created_at: row.get(4)?,
        })
    })
    .map(Json)
    .map_err(ApiErr::from_db("profile"))
}

/// POST /api/auth/check-username: is this username still free?
pub async fn check_username(
    State(db): State<Db>,
    ApiJson(req): ApiJson<CheckUsernameRequest>,
) -> Result<Json<CheckUsernameResponse>, ApiErr> {
    let username = service::validate_username(&req.username)?;
    let taken = count(&db, dbq::users::username_exists(&username))? > 0;
    Ok(Json(CheckUsernameResponse { available: !taken }))
}
