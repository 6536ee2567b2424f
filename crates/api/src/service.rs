//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they load rows, call into this module
//! for every validation and authorization decision, and write the result.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{AuthTokenResponse, ListRole, ServiceError, UpdateTodoRequest};

/// Fixed user id used when the server runs with dev auth enabled.
pub const DEV_USER_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Username given to the dev user.
pub const DEV_USERNAME: &str = "dev";

/// Minimum time between two change notifications for the same user and list.
pub const NOTIFY_COOLDOWN_MINUTES: i64 = 5;

/// Presence rows older than this are not reported as active.
pub const PRESENCE_WINDOW_SECS: i64 = 30;

/// SQLite `datetime('now')` format.
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') || email.len() > 254 {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Validate a password (8-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < 8 {
        return Err(ServiceError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    if len > 128 {
        return Err(ServiceError::BadRequest(
            "password must be at most 128 characters".into(),
        ));
    }
    Ok(())
}

/// Validate a username and return its canonical (lowercase) form.
///
/// Usernames are 2-20 characters of ASCII letters, digits and underscores.
pub fn validate_username(username: &str) -> Result<String, ServiceError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest("username is required".into()));
    }
    if trimmed.len() < 2 || trimmed.len() > 20 {
        return Err(ServiceError::BadRequest(
            "username must be between 2 and 20 characters".into(),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ServiceError::BadRequest(
            "username can only contain letters, numbers, and underscores".into(),
        ));
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Validate a list name. Returns the trimmed name.
pub fn validate_list_name(name: &str) -> Result<String, ServiceError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest("name is required".into()));
    }
    Ok(trimmed.to_string())
}

/// Validate todo text. Returns the trimmed text.
pub fn validate_todo_text(text: &str) -> Result<String, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::BadRequest("text is required".into()));
    }
    Ok(trimmed.to_string())
}

/// Normalize a partial todo update. At least one field must be present and
/// a present `text` must not be blank.
pub fn normalize_todo_update(req: &UpdateTodoRequest) -> Result<UpdateTodoRequest, ServiceError> {
    if req.text.is_none() && req.done.is_none() {
        return Err(ServiceError::BadRequest("no fields to update".into()));
    }
    let text = req.text.as_deref().map(validate_todo_text).transpose()?;
    Ok(UpdateTodoRequest {
        text,
        done: req.done,
    })
}

/// Unwrap a required request field, producing the standard 400 message.
pub fn require_field<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str, ServiceError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::BadRequest(format!("{name} is required"))),
    }
}

// ─── Login ──────────────────────────────────────────────────────────────────

/// How a login identifier should be resolved.
#[derive(Debug, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(String),
    Username(String),
}

/// Interpret a login identifier: anything containing `@` is an email,
/// everything else a username.
pub fn parse_login_identifier(identifier: &str) -> Result<LoginIdentifier, ServiceError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(ServiceError::BadRequest(
            "identifier and password are required".into(),
        ));
    }
    if identifier.contains('@') {
        Ok(LoginIdentifier::Email(identifier.to_lowercase()))
    } else {
        Ok(LoginIdentifier::Username(identifier.to_ascii_lowercase()))
    }
}

// ─── Authorization ──────────────────────────────────────────────────────────

/// Resolve a user's role on a list.
///
/// The list owner is always `owner`, even without a membership row. Anyone
/// else needs a membership row.
pub fn resolve_list_role(
    owner_id: &str,
    user_id: &str,
    membership: Option<ListRole>,
) -> Result<ListRole, ServiceError> {
    if owner_id == user_id {
        return Ok(ListRole::Owner);
    }
    membership.ok_or_else(|| ServiceError::Forbidden("access to this list is not allowed".into()))
}

/// Require the `owner` role.
pub fn require_owner(role: ListRole) -> Result<(), ServiceError> {
    if role != ListRole::Owner {
        return Err(ServiceError::Forbidden(
            "only owners can perform this action".into(),
        ));
    }
    Ok(())
}

/// Require a role that may change todos.
pub fn require_editor(role: ListRole) -> Result<(), ServiceError> {
    if !role.can_edit() {
        return Err(ServiceError::Forbidden("viewers cannot modify this list".into()));
    }
    Ok(())
}

/// Decide whether `actor` (with `actor_role`) may remove `target` from a list.
pub fn check_member_removal(
    actor: &str,
    actor_role: ListRole,
    target: &str,
) -> Result<(), ServiceError> {
    let is_owner = actor_role == ListRole::Owner;
    if target != actor && !is_owner {
        return Err(ServiceError::Forbidden(
            "only owners can remove other members".into(),
        ));
    }
    if target == actor && is_owner {
        return Err(ServiceError::BadRequest(
            "owners cannot leave their own list".into(),
        ));
    }
    Ok(())
}

/// Role assigned when adding a member directly. Defaults to `editor`; a
/// second `owner` is not allowed.
pub fn member_role_for_add(requested: Option<ListRole>) -> Result<ListRole, ServiceError> {
    match requested.unwrap_or(ListRole::Editor) {
        ListRole::Owner => Err(ServiceError::BadRequest(
            "a list can only have one owner".into(),
        )),
        role => Ok(role),
    }
}

// ─── Notifications ──────────────────────────────────────────────────────────

/// Everyone who should hear about a change: the owner plus members, minus the actor.
pub fn notification_recipients(owner_id: &str, member_ids: &[String], actor: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::with_capacity(member_ids.len() + 1);
    for id in std::iter::once(owner_id).chain(member_ids.iter().map(String::as_str)) {
        if id != actor && !recipients.iter().any(|r| r == id) {
            recipients.push(id.to_string());
        }
    }
    recipients
}

/// Parse a SQLite `datetime('now')` string as UTC.
pub fn parse_sqlite_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, SQLITE_DATETIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way SQLite's `datetime()` does.
pub fn format_sqlite_datetime(value: DateTime<Utc>) -> String {
    value.format(SQLITE_DATETIME_FORMAT).to_string()
}

/// `true` once the last notification is strictly older than the cooldown.
/// Unparseable timestamps count as elapsed.
pub fn cooldown_elapsed(last_notified_at: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(last) = last_notified_at.and_then(parse_sqlite_datetime) else {
        return true;
    };
    now - last > chrono::Duration::minutes(NOTIFY_COOLDOWN_MINUTES)
}

// ─── Token Bundle ───────────────────────────────────────────────────────────

/// Pre-computed token bundle returned by [`prepare_token_bundle`].
///
/// Contains everything needed to insert a refresh token and return the auth
/// response. The caller only needs to perform the DB INSERT.
pub struct TokenBundle {
    /// SHA-256 hash of the refresh token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the refresh_tokens row.
    pub token_id: String,
    /// `datetime` string for the refresh token expiry (DB column value).
    pub expires_at: String,
    /// Ready-to-return API response.
    pub response: AuthTokenResponse,
}

/// Build a [`TokenBundle`] containing a JWT, refresh token, and the auth response.
pub fn prepare_token_bundle(
    jwt_secret: &str,
    user_id: &str,
    username: &str,
    now_unix: u64,
) -> Result<TokenBundle, ServiceError> {
    use crate::crypto;

    if jwt_secret.is_empty() {
        return Err(ServiceError::Internal(
            "JWT authentication not configured".into(),
        ));
    }

    let access_token = crypto::sign_jwt(user_id, jwt_secret, now_unix);
    let refresh_token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&refresh_token);
    let token_id = uuid::Uuid::new_v4().to_string();

    let base = DateTime::from_timestamp(now_unix as i64, 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    let expires_at = base
        .checked_add_signed(chrono::Duration::seconds(
            crypto::REFRESH_EXPIRY_SECS as i64,
        ))
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))?;

    Ok(TokenBundle {
        token_hash,
        token_id,
        expires_at: format_sqlite_datetime(expires_at),
        response: AuthTokenResponse {
            access_token,
            refresh_token,
            expires_in: crypto::JWT_EXPIRY_SECS,
            user_id: user_id.to_string(),
            username: username.to_string(),
        },
    })
}

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_validated_and_lowercased() {
        assert_eq!(validate_username("  Alice_01 ").unwrap(), "alice_01");
        assert!(validate_username("a").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("émile").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn passwords_need_eight_chars() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password(&"x".repeat(129)).is_err());
    }

    #[test]
    fn blank_todo_text_is_rejected() {
        assert_eq!(validate_todo_text("  milk ").unwrap(), "milk");
        assert!(validate_todo_text("   ").is_err());
    }

    #[test]
    fn todo_update_needs_a_field() {
        assert!(normalize_todo_update(&UpdateTodoRequest::default()).is_err());

        let update = normalize_todo_update(&UpdateTodoRequest {
            text: Some(" eggs ".into()),
            done: None,
        })
        .unwrap();
        assert_eq!(update.text.as_deref(), Some("eggs"));

        let update = normalize_todo_update(&UpdateTodoRequest {
            text: None,
            done: Some(true),
        })
        .unwrap();
        assert_eq!(update.done, Some(true));

        assert!(
            normalize_todo_update(&UpdateTodoRequest {
                text: Some(" ".into()),
                done: Some(true),
            })
            .is_err()
        );
    }

    #[test]
    fn login_identifier_detects_email() {
        assert_eq!(
            parse_login_identifier(" Bob@Example.com ").unwrap(),
            LoginIdentifier::Email("bob@example.com".into())
        );
        assert_eq!(
            parse_login_identifier("Bob").unwrap(),
            LoginIdentifier::Username("bob".into())
        );
        assert!(parse_login_identifier("  ").is_err());
    }

    #[test]
    fn owner_resolves_without_membership() {
        assert_eq!(
            resolve_list_role("u1", "u1", None).unwrap(),
            ListRole::Owner
        );
        assert_eq!(
            resolve_list_role("u1", "u2", Some(ListRole::Viewer)).unwrap(),
            ListRole::Viewer
        );
        let err = resolve_list_role("u1", "u3", None).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn role_requirements() {
        assert!(require_owner(ListRole::Owner).is_ok());
        assert!(require_owner(ListRole::Editor).is_err());
        assert!(require_editor(ListRole::Editor).is_ok());
        assert_eq!(
            require_editor(ListRole::Viewer).unwrap_err().status_code(),
            403
        );
    }

    #[test]
    fn member_removal_rules() {
        // member leaves
        assert!(check_member_removal("u2", ListRole::Editor, "u2").is_ok());
        // owner removes member
        assert!(check_member_removal("u1", ListRole::Owner, "u2").is_ok());
        // member removes someone else
        assert_eq!(
            check_member_removal("u2", ListRole::Editor, "u3")
                .unwrap_err()
                .status_code(),
            403
        );
        // owner leaves own list
        assert_eq!(
            check_member_removal("u1", ListRole::Owner, "u1")
                .unwrap_err()
                .status_code(),
            400
        );
    }

    #[test]
    fn added_members_default_to_editor() {
        assert_eq!(member_role_for_add(None).unwrap(), ListRole::Editor);
        assert_eq!(
            member_role_for_add(Some(ListRole::Viewer)).unwrap(),
            ListRole::Viewer
        );
        assert!(member_role_for_add(Some(ListRole::Owner)).is_err());
    }

    #[test]
    fn recipients_exclude_actor_and_duplicates() {
        let members = vec!["owner".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(
            notification_recipients("owner", &members, "a"),
            vec!["owner".to_string(), "b".to_string()]
        );
        assert!(notification_recipients("owner", &[], "owner").is_empty());
    }

    #[test]
    fn cooldown_window() {
        let now = parse_sqlite_datetime("2026-01-01 12:00:00").unwrap();
        assert!(cooldown_elapsed(None, now));
        assert!(cooldown_elapsed(Some("garbage"), now));
        assert!(!cooldown_elapsed(Some("2026-01-01 11:58:00"), now));
        assert!(!cooldown_elapsed(Some("2026-01-01 11:55:00"), now));
        assert!(cooldown_elapsed(Some("2026-01-01 11:54:59"), now));
        assert!(cooldown_elapsed(Some("2026-01-01 11:00:00"), now));
    }

    #[test]
    fn token_bundle_requires_secret() {
        assert!(prepare_token_bundle("", "u1", "alice", 1_700_000_000).is_err());

        let bundle = prepare_token_bundle("secret", "u1", "alice", 1_700_000_000).unwrap();
        assert_eq!(bundle.response.user_id, "u1");
        assert_eq!(
            bundle.token_hash,
            crate::crypto::hash_token(&bundle.response.refresh_token)
        );
        assert!(parse_sqlite_datetime(&bundle.expires_at).is_some());
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
