pub mod auth;
pub mod health;
pub mod list_invites;
pub mod list_members;
pub mod lists;
pub mod presence;
pub mod push_subscription;
pub mod todos;

use crate::error::ApiErr;

/// Fallback for unknown `/api` paths.
pub async fn not_found() -> ApiErr {
    ApiErr::not_found("not found")
}
