use std::time::Duration;

use serde::de::DeserializeOwned;

use clarydo_api::*;

/// Errors returned by [`ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Rejected locally before anything was sent.
    #[error("{0}")]
    Invalid(String),
}

impl ClientError {
    /// HTTP status for [`ClientError::Api`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Typed HTTP client for the Clarydo API.
///
/// Requests carry the stored bearer token when one is set; without a token
/// they go out unauthenticated (servers running with dev auth accept that).
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    /// Create a new client with the given base URL and timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    pub fn set_auth(&mut self, token: String) {
        self.auth_token = Some(token);
    }

    pub fn clear_auth(&mut self) {
        self.auth_token = None;
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, self.url(path));
        match self.auth_token.as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::GET, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::POST, path)
    }

    fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::PATCH, path)
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::PUT, path)
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.request(reqwest::Method::DELETE, path)
    }

    // ── Health ────────────────────────────────────────────────────────────

    pub async fn health(&self) -> Result<HealthResponse> {
        parse_response(self.get("/health").send().await?).await
    }

    // ── Auth ──────────────────────────────────────────────────────────────

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthTokenResponse> {
        parse_response(self.post("/auth/register").json(req).send().await?).await
    }

    pub async fn login(&self, req: &LoginRequest) -> Result<AuthTokenResponse> {
        parse_response(self.post("/auth/login").json(req).send().await?).await
    }

    pub async fn refresh(&self, req: &RefreshRequest) -> Result<AuthTokenResponse> {
        parse_response(self.post("/auth/refresh").json(req).send().await?).await
    }

    pub async fn logout(&self, req: &LogoutRequest) -> Result<OkResponse> {
        parse_response(self.post("/auth/logout").json(req).send().await?).await
    }

    pub async fn me(&self) -> Result<ProfileResponse> {
        parse_response(self.get("/auth/me").send().await?).await
    }

    pub async fn check_username(&self, username: &str) -> Result<CheckUsernameResponse> {
        let req = CheckUsernameRequest {
            username: username.to_string(),
        };
        parse_response(self.post("/auth/check-username").json(&req).send().await?).await
    }

    // ── Lists ─────────────────────────────────────────────────────────────

    pub async fn list_lists(&self) -> Result<Vec<ListSummary>> {
        parse_response(self.get("/lists").send().await?).await
    }

    pub async fn create_list(&self, name: &str) -> Result<ListSummary> {
        let req = CreateListRequest {
            name: name.to_string(),
        };
        parse_response(self.post("/lists").json(&req).send().await?).await
    }

    pub async fn rename_list(&self, list_id: &str, name: &str) -> Result<ListSummary> {
        let req = UpdateListRequest {
            name: name.to_string(),
        };
        let path = format!("/lists/{}", urlencoding::encode(list_id));
        parse_response(self.patch(&path).json(&req).send().await?).await
    }

    pub async fn delete_list(&self, list_id: &str) -> Result<SuccessResponse> {
        let path = format!("/lists/{}", urlencoding::encode(list_id));
        parse_response(self.delete(&path).send().await?).await
    }

    pub async fn join_list(&self, list_id: &str) -> Result<JoinListResponse> {
        let path = format!("/lists/{}/join", urlencoding::encode(list_id));
        parse_response(self.post(&path).send().await?).await
    }

    // ── Todos ─────────────────────────────────────────────────────────────

    pub async fn list_todos(&self, list_id: &str) -> Result<Vec<Todo>> {
        let resp = self
            .get("/todos")
            .query(&[("listId", list_id)])
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn create_todo(&self, list_id: &str, text: &str) -> Result<Todo> {
        let req = CreateTodoRequest {
            text: text.to_string(),
            list_id: Some(list_id.to_string()),
        };
        parse_response(self.post("/todos").json(&req).send().await?).await
    }

    pub async fn update_todo(&self, todo_id: &str, req: &UpdateTodoRequest) -> Result<Todo> {
        let path = format!("/todos/{}", urlencoding::encode(todo_id));
        parse_response(self.patch(&path).json(req).send().await?).await
    }

    pub async fn delete_todo(&self, todo_id: &str) -> Result<SuccessResponse> {
        let path = format!("/todos/{}", urlencoding::encode(todo_id));
        parse_response(self.delete(&path).send().await?).await
    }

    // ── Members ───────────────────────────────────────────────────────────

    pub async fn add_member(&self, req: &AddMemberRequest) -> Result<MemberResponse> {
        parse_response(self.post("/list-members").json(req).send().await?).await
    }

    pub async fn list_members(&self, list_id: &str) -> Result<Vec<MemberResponse>> {
        let path = format!("/list-members/{}", urlencoding::encode(list_id));
        parse_response(self.get(&path).send().await?).await
    }

    /// Remove `user_id` from a list, or leave it when `user_id` is `None`.
    pub async fn remove_member(
        &self,
        list_id: &str,
        user_id: Option<&str>,
    ) -> Result<SuccessResponse> {
        let path = format!("/list-members/{}", urlencoding::encode(list_id));
        let mut req = self.delete(&path);
        if let Some(user_id) = user_id {
            req = req.query(&[("userId", user_id)]);
        }
        parse_response(req.send().await?).await
    }

    // ── Invites ───────────────────────────────────────────────────────────

    pub async fn create_invite(&self, list_id: &str, username: &str) -> Result<CreateInviteResponse> {
        let req = CreateInviteRequest {
            list_id: Some(list_id.to_string()),
            username: Some(username.to_string()),
        };
        parse_response(self.post("/list-invites").json(&req).send().await?).await
    }

    pub async fn latest_invite(&self) -> Result<LatestInviteResponse> {
        parse_response(self.get("/list-invites/latest").send().await?).await
    }

    pub async fn accept_invite(&self, invite_id: &str) -> Result<AcceptInviteResponse> {
        let path = format!("/list-invites/{}/accept", urlencoding::encode(invite_id));
        parse_response(self.post(&path).send().await?).await
    }

    pub async fn decline_invite(&self, invite_id: &str) -> Result<SuccessResponse> {
        let path = format!("/list-invites/{}/decline", urlencoding::encode(invite_id));
        parse_response(self.post(&path).send().await?).await
    }

    // ── Push ──────────────────────────────────────────────────────────────

    pub async fn subscribe_push(&self, req: &PushSubscriptionRequest) -> Result<SuccessResponse> {
        parse_response(self.post("/push-subscription").json(req).send().await?).await
    }

    pub async fn unsubscribe_push(&self) -> Result<SuccessResponse> {
        parse_response(self.delete("/push-subscription").send().await?).await
    }

    pub async fn test_push(&self) -> Result<TestPushResponse> {
        parse_response(self.post("/test-push").send().await?).await
    }

    // ── Presence ──────────────────────────────────────────────────────────

    pub async fn heartbeat(&self, req: &PresenceHeartbeatRequest) -> Result<SuccessResponse> {
        parse_response(self.put("/presence").json(req).send().await?).await
    }

    pub async fn active_users(&self, list_id: &str) -> Result<Vec<PresenceUser>> {
        let path = format!("/presence/{}", urlencoding::encode(list_id));
        parse_response(self.get(&path).send().await?).await
    }
}

/// Turn a response into `T`, or into [`ClientError::Api`] with the server's `{error}` message.
async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        return Err(ClientError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.json().await?)
}
