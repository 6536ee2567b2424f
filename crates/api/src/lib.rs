//! Shared API types, crypto, and SQL builders for Clarydo.
//!
//! This crate is the **single source of truth** for all API request/response
//! types. The Axum server and the typed client both depend on it, so a field
//! rename here shows up as a compile error on both sides.
//!
//! Request bodies keep the camelCase field names the web client sends
//! (`listId`, `userId`); rows read back from the database serialize
//! snake_case.

use serde::{Deserialize, Serialize};

#[cfg(feature = "backend")]
pub mod crypto;
#[cfg(feature = "backend")]
pub mod db;
#[cfg(feature = "backend")]
pub mod service;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Permission level of a user on a list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ListRole {
    Owner,
    Editor,
    Viewer,
}

impl ListRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Owners and editors may change todos; viewers are read-only.
    pub fn can_edit(&self) -> bool {
        matches!(self, Self::Owner | Self::Editor)
    }
}

impl std::fmt::Display for ListRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ListRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            other => Err(ServiceError::BadRequest(format!("unknown role: {other}"))),
        }
    }
}

/// Status of a list invite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(ServiceError::Internal(format!(
                "unknown invite status: {other}"
            ))),
        }
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Email + username + password registration.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Login with either an email address or a username.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

/// Returned on successful login / register / refresh.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user_id: String,
    pub username: String,
}

/// Refresh token request.
#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request (invalidate refresh token).
#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Profile of the authenticated user returned by `GET /api/auth/me`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

/// Request body for `POST /api/auth/check-username`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckUsernameRequest {
    #[serde(default)]
    pub username: String,
}

/// Returned by `POST /api/auth/check-username`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckUsernameResponse {
    pub available: bool,
}

/// Generic success response for auth operations that don't return data.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `{"success": true}` acknowledgement used by the list/todo/push endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

// ─── Lists ───────────────────────────────────────────────────────────────────

/// A list as seen by one user, including that user's role on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListSummary {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub role: ListRole,
}

/// Request body for `POST /api/lists`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateListRequest {
    #[serde(default)]
    pub name: String,
}

/// Request body for `PATCH /api/lists/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateListRequest {
    #[serde(default)]
    pub name: String,
}

/// Returned by `POST /api/lists/:id/join`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinListResponse {
    pub success: bool,
    pub list_id: String,
    pub list_name: String,
}

// ─── Todos ───────────────────────────────────────────────────────────────────

/// A single todo item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub done: bool,
    pub created_at: String,
    pub list_id: String,
}

/// Query parameters for `GET /api/todos`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoListQuery {
    pub list_id: Option<String>,
}

/// Request body for `POST /api/todos`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub text: String,
    pub list_id: Option<String>,
}

/// Request body for `PATCH /api/todos/:id`: partial update.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

// ─── Members ─────────────────────────────────────────────────────────────────

/// Request body for `POST /api/list-members`: add a member directly (owner only).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub list_id: Option<String>,
    pub user_id: Option<String>,
    pub role: Option<ListRole>,
}

/// Single list membership row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberResponse {
    pub list_id: String,
    pub user_id: String,
    pub username: String,
    pub role: ListRole,
    pub created_at: String,
}

/// Query parameters for `DELETE /api/list-members/:listId`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberQuery {
    pub user_id: Option<String>,
}

// ─── Invites ─────────────────────────────────────────────────────────────────

/// Request body for `POST /api/list-invites`: invite a user by username.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    pub list_id: Option<String>,
    pub username: Option<String>,
}

/// Invite row as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRecord {
    pub id: String,
    pub list_id: String,
    pub invited_user_id: String,
    pub created_at: String,
}

/// Returned by `POST /api/list-invites`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteResponse {
    pub invite: InviteRecord,
    pub invited_username: String,
}

/// A pending invite addressed to the current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInvite {
    pub id: String,
    pub list_id: String,
    pub list_name: String,
    pub inviter_username: Option<String>,
    pub created_at: String,
}

/// Returned by `GET /api/list-invites/latest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LatestInviteResponse {
    pub invite: Option<PendingInvite>,
}

/// Returned by `POST /api/list-invites/:id/accept`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub success: bool,
    pub list_id: String,
    pub list_name: String,
}

// ─── Push ────────────────────────────────────────────────────────────────────

/// Browser push subscription keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Request body for `POST /api/push-subscription` (the browser's `PushSubscription.toJSON()`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscriptionRequest {
    pub endpoint: String,
    pub keys: PushKeys,
}

/// JSON payload delivered to the service worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Returned by `POST /api/test-push`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TestPushResponse {
    pub success: bool,
    pub message: String,
}

// ─── Presence ────────────────────────────────────────────────────────────────

/// Request body for `PUT /api/presence`: heartbeat for the list being viewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceHeartbeatRequest {
    pub list_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Another user currently viewing a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub user_id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub last_seen: String,
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Returned by `GET /api/health`: server liveness check.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code. The Axum server converts this
/// into its JSON error response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

// ─── Error (JSON shape) ──────────────────────────────────────────────────────

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}
