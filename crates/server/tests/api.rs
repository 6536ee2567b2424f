//! End-to-end tests: the real router on an ephemeral port, driven through
//! the typed client.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tempfile::TempDir;

use clarydo_api::{
    AddMemberRequest, ListRole, LoginRequest, LogoutRequest, NotificationPayload,
    PresenceHeartbeatRequest, PushKeys, PushSubscriptionRequest, RefreshRequest, RegisterRequest,
    UpdateTodoRequest, crypto, db as dbq,
};
use clarydo_api_client::sync::spawn_presence_heartbeat;
use clarydo_api_client::{ApiClient, ClientError, ListSync, TodoChange, TodoSync};
use clarydo_server::push::{PushError, PushSender};
use clarydo_server::storage::{Db, ensure_dev_user, init_db, sq_execute, sq_query_opt};
use clarydo_server::{AppConfig, AppState, build_router};

const SECRET: &str = "integration-secret";

/// Records every delivery instead of talking to a push service.
#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, NotificationPayload)>>,
}

impl RecordingSender {
    fn deliveries(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingSender {
    async fn send(
        &self,
        subscription: &PushSubscriptionRequest,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        self.sent
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}

struct TestServer {
    base_url: String,
    db: Db,
    push: Arc<RecordingSender>,
    _dir: TempDir,
}

impl TestServer {
    async fn start(dev_auth: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = init_db(dir.path()).unwrap();
        if dev_auth {
            ensure_dev_user(&db).unwrap();
        }
        let config = AppConfig {
            data_dir: dir.path().to_path_buf(),
            jwt_secret: SECRET.into(),
            dev_auth,
            ..AppConfig::default()
        };
        let push = Arc::new(RecordingSender::default());
        let sender: Arc<dyn PushSender> = push.clone();
        let app = build_router(
            AppState {
                db: db.clone(),
                config,
                push: sender,
            },
            None,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            db,
            push,
            _dir: dir,
        }
    }

    fn anonymous(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(10)).unwrap()
    }

    /// Insert a user directly and return a client signed in as them.
    fn user(&self, id: &str, username: &str) -> ApiClient {
        {
            let conn = self.db.conn();
            sq_execute(&conn, dbq::users::insert_external(id, username)).unwrap();
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let mut client = self.anonymous();
        client.set_auth(crypto::sign_jwt(id, SECRET, now));
        client
    }

    /// Wait until `user_id` has a notification cooldown row for `list_id`.
    async fn wait_for_cooldown(&self, list_id: &str, user_id: &str) {
        for _ in 0..100 {
            let found = {
                let conn = self.db.conn();
                sq_query_opt(&conn, dbq::push::get_cooldown(list_id, user_id), |row| {
                    row.get::<_, String>(0)
                })
                .unwrap()
                .is_some()
            };
            if found {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no cooldown recorded for {user_id}");
    }

    /// Wait until at least `count` push deliveries were recorded.
    async fn wait_for_deliveries(&self, count: usize) -> Vec<(String, NotificationPayload)> {
        for _ in 0..100 {
            let sent = self.push.deliveries();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.push.deliveries()
    }
}

fn status(err: ClientError) -> u16 {
    err.status().unwrap_or_else(|| panic!("expected an API error, got {err}"))
}

fn subscription(endpoint: &str) -> PushSubscriptionRequest {
    PushSubscriptionRequest {
        endpoint: endpoint.into(),
        keys: PushKeys {
            p256dh: "p256dh-key".into(),
            auth: "auth-secret".into(),
        },
    }
}

async fn add_member(owner: &ApiClient, list_id: &str, user_id: &str, role: ListRole) {
    owner
        .add_member(&AddMemberRequest {
            list_id: Some(list_id.into()),
            user_id: Some(user_id.into()),
            role: Some(role),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn health_reports_ok() {
    let server = TestServer::start(false).await;
    let health = server.anonymous().health().await.unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn register_login_refresh_logout() {
    let server = TestServer::start(false).await;
    let mut client = server.anonymous();

    let tokens = client
        .register(&RegisterRequest {
            email: "Alice@Example.com".into(),
            username: "Alice".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap();
    assert_eq!(tokens.username, "alice");

    let dup = client
        .register(&RegisterRequest {
            email: "other@example.com".into(),
            username: "alice".into(),
            password: "correct horse".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(status(dup), 409);

    let login = |identifier: &str, password: &str| LoginRequest {
        identifier: identifier.into(),
        password: password.into(),
    };
    let by_email = client
        .login(&login("alice@example.com", "correct horse"))
        .await
        .unwrap();
    assert_eq!(by_email.user_id, tokens.user_id);
    assert_eq!(
        status(client.login(&login("alice", "wrong password")).await.unwrap_err()),
        401
    );
    assert_eq!(
        status(client.login(&login("nobody", "correct horse")).await.unwrap_err()),
        404
    );

    client.set_auth(by_email.access_token.clone());
    let me = client.me().await.unwrap();
    assert_eq!(me.username, "alice");
    assert_eq!(me.email.as_deref(), Some("alice@example.com"));

    assert!(!client.check_username("ALICE").await.unwrap().available);
    assert!(client.check_username("bob").await.unwrap().available);

    let rotated = client
        .refresh(&RefreshRequest {
            refresh_token: by_email.refresh_token.clone(),
        })
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, by_email.refresh_token);
    let reused = client
        .refresh(&RefreshRequest {
            refresh_token: by_email.refresh_token,
        })
        .await
        .unwrap_err();
    assert_eq!(status(reused), 401);

    assert!(
        client
            .logout(&LogoutRequest {
                refresh_token: rotated.refresh_token,
            })
            .await
            .unwrap()
            .ok
    );
}

#[tokio::test]
async fn missing_or_bad_tokens_are_rejected() {
    let server = TestServer::start(false).await;
    assert_eq!(status(server.anonymous().list_lists().await.unwrap_err()), 401);

    let mut forged = server.anonymous();
    forged.set_auth(crypto::sign_jwt("u1", "not-the-secret", 1_900_000_000));
    assert_eq!(status(forged.list_lists().await.unwrap_err()), 401);
}

#[tokio::test]
async fn dev_auth_acts_as_the_dev_user() {
    let server = TestServer::start(true).await;
    let client = server.anonymous();
    assert_eq!(client.me().await.unwrap().username, "dev");
    let list = client.create_list("Dev list").await.unwrap();
    assert_eq!(list.role, ListRole::Owner);
}

#[tokio::test]
async fn list_lifecycle_and_ownership() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let stranger = server.user("u-sam", "sam");

    assert_eq!(status(owner.create_list("   ").await.unwrap_err()), 400);

    let first = owner.create_list("Groceries").await.unwrap();
    let second = owner.create_list("Hardware").await.unwrap();
    assert_eq!(first.role, ListRole::Owner);

    let renamed = owner.rename_list(&first.id, "Weekly groceries").await.unwrap();
    assert_eq!(renamed.name, "Weekly groceries");

    let lists = owner.list_lists().await.unwrap();
    let ids: Vec<_> = lists.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, [first.id.as_str(), second.id.as_str()]);
    assert!(stranger.list_lists().await.unwrap().is_empty());

    assert_eq!(
        status(stranger.rename_list(&first.id, "mine").await.unwrap_err()),
        403
    );
    assert_eq!(status(stranger.list_todos(&first.id).await.unwrap_err()), 403);
    assert_eq!(status(owner.list_todos("no-such-list").await.unwrap_err()), 404);

    owner.create_todo(&first.id, "milk").await.unwrap();
    assert!(owner.delete_list(&first.id).await.unwrap().success);
    assert_eq!(status(owner.list_todos(&first.id).await.unwrap_err()), 404);
    assert_eq!(owner.list_lists().await.unwrap().len(), 1);
}

#[tokio::test]
async fn todos_follow_member_roles() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let editor = server.user("u-ed", "ed");
    let viewer = server.user("u-vi", "vic");

    let list = owner.create_list("Groceries").await.unwrap();
    add_member(&owner, &list.id, "u-ed", ListRole::Editor).await;
    add_member(&owner, &list.id, "u-vi", ListRole::Viewer).await;

    let milk = editor.create_todo(&list.id, "  milk ").await.unwrap();
    assert_eq!(milk.text, "milk");
    assert!(!milk.done);
    let eggs = owner.create_todo(&list.id, "eggs").await.unwrap();

    assert_eq!(status(editor.create_todo(&list.id, " ").await.unwrap_err()), 400);
    assert_eq!(status(viewer.create_todo(&list.id, "cake").await.unwrap_err()), 403);

    let todos = viewer.list_todos(&list.id).await.unwrap();
    let ids: Vec<_> = todos.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, [eggs.id.as_str(), milk.id.as_str()]);

    let done = UpdateTodoRequest {
        text: None,
        done: Some(true),
    };
    assert_eq!(status(viewer.update_todo(&milk.id, &done).await.unwrap_err()), 403);
    let updated = editor.update_todo(&milk.id, &done).await.unwrap();
    assert!(updated.done);
    assert_eq!(updated.text, "milk");

    let empty = UpdateTodoRequest::default();
    assert_eq!(status(editor.update_todo(&milk.id, &empty).await.unwrap_err()), 400);
    assert_eq!(status(editor.update_todo("missing", &done).await.unwrap_err()), 404);

    assert_eq!(status(viewer.delete_todo(&eggs.id).await.unwrap_err()), 403);
    editor.delete_todo(&eggs.id).await.unwrap();
    assert_eq!(owner.list_todos(&list.id).await.unwrap().len(), 1);

    let listed = viewer.list_lists().await.unwrap();
    assert_eq!(listed[0].role, ListRole::Viewer);
}

#[tokio::test]
async fn members_can_leave_but_owners_cannot() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let editor = server.user("u-ed", "ed");
    server.user("u-vi", "vic");

    let list = owner.create_list("Trip").await.unwrap();
    add_member(&owner, &list.id, "u-ed", ListRole::Editor).await;
    add_member(&owner, &list.id, "u-vi", ListRole::Viewer).await;

    let dup = owner
        .add_member(&AddMemberRequest {
            list_id: Some(list.id.clone()),
            user_id: Some("u-ed".into()),
            role: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status(dup), 409);
    let unknown = owner
        .add_member(&AddMemberRequest {
            list_id: Some(list.id.clone()),
            user_id: Some("u-ghost".into()),
            role: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status(unknown), 404);

    let members = owner.list_members(&list.id).await.unwrap();
    let usernames: Vec<_> = members.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(usernames, ["olga", "ed", "vic"]);
    assert_eq!(status(editor.list_members(&list.id).await.unwrap_err()), 403);

    assert_eq!(
        status(editor.remove_member(&list.id, Some("u-vi")).await.unwrap_err()),
        403
    );
    assert_eq!(status(owner.remove_member(&list.id, None).await.unwrap_err()), 400);

    editor.remove_member(&list.id, None).await.unwrap();
    assert_eq!(status(editor.list_todos(&list.id).await.unwrap_err()), 403);

    owner.remove_member(&list.id, Some("u-vi")).await.unwrap();
    assert_eq!(owner.list_members(&list.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invites_can_be_accepted_or_declined() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let bob = server.user("u-bob", "bob");
    let carol = server.user("u-carol", "carol");

    let list = owner.create_list("Party").await.unwrap();

    assert_eq!(status(owner.create_invite(&list.id, "olga").await.unwrap_err()), 400);
    assert_eq!(status(owner.create_invite(&list.id, "nobody").await.unwrap_err()), 404);
    assert_eq!(status(bob.create_invite(&list.id, "carol").await.unwrap_err()), 403);

    let created = owner.create_invite(&list.id, "bob").await.unwrap();
    assert_eq!(created.invited_username, "bob");
    assert_eq!(status(owner.create_invite(&list.id, "bob").await.unwrap_err()), 409);

    let latest = bob.latest_invite().await.unwrap().invite.unwrap();
    assert_eq!(latest.id, created.invite.id);
    assert_eq!(latest.list_name, "Party");
    assert_eq!(latest.inviter_username.as_deref(), Some("olga"));
    assert!(carol.latest_invite().await.unwrap().invite.is_none());

    assert_eq!(status(carol.accept_invite(&latest.id).await.unwrap_err()), 403);
    let accepted = bob.accept_invite(&latest.id).await.unwrap();
    assert_eq!(accepted.list_id, list.id);
    assert_eq!(accepted.list_name, "Party");
    assert_eq!(status(bob.accept_invite(&latest.id).await.unwrap_err()), 400);
    assert_eq!(bob.list_lists().await.unwrap()[0].role, ListRole::Editor);
    assert_eq!(status(owner.create_invite(&list.id, "bob").await.unwrap_err()), 400);

    let for_carol = owner.create_invite(&list.id, "carol").await.unwrap();
    assert!(carol.decline_invite(&for_carol.invite.id).await.unwrap().success);
    assert!(carol.latest_invite().await.unwrap().invite.is_none());
    assert_eq!(status(carol.list_todos(&list.id).await.unwrap_err()), 403);
    assert_eq!(status(carol.accept_invite("missing").await.unwrap_err()), 404);
}

#[tokio::test]
async fn join_link_adds_an_editor_once() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let bob = server.user("u-bob", "bob");

    let list = owner.create_list("Shared").await.unwrap();
    let joined = bob.join_list(&list.id).await.unwrap();
    assert_eq!(joined.list_name, "Shared");
    bob.create_todo(&list.id, "bring chairs").await.unwrap();

    let again = bob.join_list(&list.id).await.unwrap_err();
    assert_eq!(status(again), 400);
    assert_eq!(status(owner.join_list(&list.id).await.unwrap_err()), 400);
    assert_eq!(status(bob.join_list("missing").await.unwrap_err()), 404);
}

#[tokio::test]
async fn join_rejection_names_the_list() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let list = owner.create_list("Shared").await.unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/api/lists/{}/join", server.base_url, list.id))
        .bearer_auth(owner.auth_token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["listId"], list.id.as_str());
    assert_eq!(body["listName"], "Shared");
    assert!(body["error"].as_str().unwrap().contains("owner"));
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    server.user("u-bob", "bob");
    let list = owner.create_list("Shared").await.unwrap();
    let milk = owner.create_todo(&list.id, "milk").await.unwrap();
    let http = reqwest::Client::new();
    let token = owner.auth_token().unwrap().to_string();

    let bad_role = http
        .post(format!("{}/api/list-members", server.base_url))
        .bearer_auth(&token)
        .json(&serde_json::json!({"listId": list.id, "userId": "u-bob", "role": "admin"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_role.status().as_u16(), 400);
    let body: serde_json::Value = bad_role.json().await.unwrap();
    assert!(body["error"].is_string(), "{body}");

    let bad_done = http
        .patch(format!("{}/api/todos/{}", server.base_url, milk.id))
        .bearer_auth(&token)
        .json(&serde_json::json!({"done": "yes"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_done.status().as_u16(), 400);
    let body: serde_json::Value = bad_done.json().await.unwrap();
    assert!(body["error"].is_string(), "{body}");

    let no_list = http
        .get(format!("{}/api/todos", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(no_list.status().as_u16(), 400);
    let body: serde_json::Value = no_list.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("listId"), "{body}");

    // Nothing was changed by the rejected requests.
    assert!(owner.list_members(&list.id).await.unwrap().iter().all(|m| m.user_id != "u-bob"));
    assert!(!owner.list_todos(&list.id).await.unwrap()[0].done);
}

#[tokio::test]
async fn todo_listing_is_never_cached() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let list = owner.create_list("Groceries").await.unwrap();

    let resp = reqwest::Client::new()
        .get(format!("{}/api/todos?listId={}", server.base_url, list.id))
        .bearer_auth(owner.auth_token().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let cache = resp
        .headers()
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cache.contains("no-store"), "{cache}");
}

#[tokio::test]
async fn presence_shows_other_active_users() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let bob = server.user("u-bob", "bob");
    let stranger = server.user("u-sam", "sam");

    let list = owner.create_list("Party").await.unwrap();
    add_member(&owner, &list.id, "u-bob", ListRole::Viewer).await;

    let beat = |display_name: Option<&str>| PresenceHeartbeatRequest {
        list_id: list.id.clone(),
        display_name: display_name.map(str::to_string),
        avatar_url: None,
    };
    bob.heartbeat(&beat(None)).await.unwrap();
    owner.heartbeat(&beat(Some("Olga"))).await.unwrap();

    let seen_by_owner = owner.active_users(&list.id).await.unwrap();
    assert_eq!(seen_by_owner.len(), 1);
    assert_eq!(seen_by_owner[0].user_id, "u-bob");
    assert_eq!(seen_by_owner[0].display_name.as_deref(), Some("bob"));

    let seen_by_bob = bob.active_users(&list.id).await.unwrap();
    assert_eq!(seen_by_bob[0].display_name.as_deref(), Some("Olga"));

    assert_eq!(status(stranger.heartbeat(&beat(None)).await.unwrap_err()), 403);
    assert_eq!(status(stranger.active_users(&list.id).await.unwrap_err()), 403);

    // A heartbeat older than the 30 second window no longer counts.
    {
        let conn = server.db.conn();
        conn.execute(
            "UPDATE presence SET last_seen = datetime('now', '-31 seconds') WHERE user_id = ?1",
            ["u-bob"],
        )
        .unwrap();
    }
    assert!(owner.active_users(&list.id).await.unwrap().is_empty());
    assert_eq!(bob.active_users(&list.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn changes_notify_other_members_with_cooldown() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let editor = server.user("u-ed", "ed");

    let list = owner.create_list("Groceries").await.unwrap();
    add_member(&owner, &list.id, "u-ed", ListRole::Editor).await;

    let bad = PushSubscriptionRequest {
        endpoint: String::new(),
        keys: PushKeys {
            p256dh: "k".into(),
            auth: "a".into(),
        },
    };
    assert_eq!(status(owner.subscribe_push(&bad).await.unwrap_err()), 400);
    owner.subscribe_push(&subscription("https://push.test/olga")).await.unwrap();
    editor.subscribe_push(&subscription("https://push.test/ed")).await.unwrap();

    let milk = editor.create_todo(&list.id, "milk").await.unwrap();
    let sent = server.wait_for_deliveries(1).await;
    assert_eq!(sent.len(), 1);
    let (endpoint, payload) = &sent[0];
    assert_eq!(endpoint, "https://push.test/olga");
    assert_eq!(payload.title, "Groceries");
    assert_eq!(payload.body, "The list was updated");
    assert_eq!(payload.tag.as_deref(), Some(format!("list-{}", list.id).as_str()));
    assert_eq!(payload.url.as_deref(), Some(format!("/?list={}", list.id).as_str()));
    server.wait_for_cooldown(&list.id, "u-olga").await;

    // The owner is inside the cooldown now; the editor hears about the owner's change.
    editor
        .update_todo(
            &milk.id,
            &UpdateTodoRequest {
                text: None,
                done: Some(true),
            },
        )
        .await
        .unwrap();
    owner.create_todo(&list.id, "eggs").await.unwrap();
    let sent = server.wait_for_deliveries(2).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    let sent_later = server.push.deliveries();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent_later.len(), 2);
    assert!(sent_later.iter().any(|(e, _)| e == "https://push.test/ed"));

    let test = owner.test_push().await.unwrap();
    assert!(test.success);
    let sent = server.wait_for_deliveries(3).await;
    assert_eq!(sent[2].1.title, "Test Notification");

    owner.unsubscribe_push().await.unwrap();
    owner.test_push().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.push.deliveries().len(), 3);
}

#[tokio::test]
async fn todo_sync_reconciles_with_the_server() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let editor = server.user("u-ed", "ed");
    let list = owner.create_list("Groceries").await.unwrap();
    add_member(&owner, &list.id, "u-ed", ListRole::Editor).await;

    let sync = TodoSync::new(owner.clone(), list.id.clone());
    sync.refresh().await.unwrap();

    let milk = sync.add("milk").await.unwrap();
    let bread = sync.add("bread").await.unwrap();
    let ids: Vec<_> = sync.todos().into_iter().map(|t| t.id).collect();
    assert_eq!(ids, [bread.id.clone(), milk.id.clone()]);

    assert!(sync.toggle(&milk.id).await.unwrap().done);
    sync.edit(&bread.id, "rye bread").await.unwrap();
    assert_eq!(sync.clear_completed().await.unwrap(), 1);
    assert_eq!(sync.todos().len(), 1);
    assert_eq!(owner.list_todos(&list.id).await.unwrap().len(), 1);

    editor.create_todo(&list.id, "butter").await.unwrap();
    let changes = sync.refresh().await.unwrap().unwrap();
    assert_eq!(changes.len(), 1);
    assert!(matches!(&changes[0], TodoChange::Created(t) if t.text == "butter"));

    // A failed mutation rolls back and leaves the server state untouched.
    owner.remove_member(&list.id, Some("u-ed")).await.unwrap();
    let editor_sync = TodoSync::new(editor.clone(), list.id.clone());
    assert_eq!(status(editor_sync.add("cake").await.unwrap_err()), 403);
    assert!(editor_sync.todos().is_empty());
    assert_eq!(owner.list_todos(&list.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn background_polling_and_heartbeat() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let editor = server.user("u-ed", "ed");
    let list = owner.create_list("Groceries").await.unwrap();
    add_member(&owner, &list.id, "u-ed", ListRole::Editor).await;
    owner.create_todo(&list.id, "milk").await.unwrap();

    let heartbeat = spawn_presence_heartbeat(
        editor.clone(),
        PresenceHeartbeatRequest {
            list_id: list.id.clone(),
            display_name: None,
            avatar_url: None,
        },
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sync = Arc::new(TodoSync::new(owner.clone(), list.id.clone()));
    let recorder = Arc::clone(&seen);
    let poller = sync.spawn_polling_every(Duration::from_millis(50), move |changes| {
        recorder.lock().unwrap().extend(changes);
    });

    // Let the initial load land before someone else edits the list.
    for _ in 0..100 {
        if !sync.todos().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    editor.create_todo(&list.id, "eggs").await.unwrap();

    for _ in 0..100 {
        if !seen.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    poller.abort();
    let changes = seen.lock().unwrap().clone();
    assert_eq!(changes.len(), 1, "{changes:?}");
    assert!(matches!(&changes[0], TodoChange::Created(t) if t.text == "eggs"));

    let active = owner.active_users(&list.id).await.unwrap();
    heartbeat.abort();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].user_id, "u-ed");
}

#[tokio::test]
async fn list_sync_keeps_lists_ordered() {
    let server = TestServer::start(false).await;
    let owner = server.user("u-olga", "olga");
    let viewer = server.user("u-vi", "vic");

    let lists = ListSync::new(owner.clone());
    lists.refresh().await.unwrap();
    assert!(lists.lists().is_empty());

    let groceries = lists.create("Groceries").await.unwrap();
    let hardware = lists.create("Hardware").await.unwrap();
    let names: Vec<_> = lists.lists().into_iter().map(|l| l.name).collect();
    assert_eq!(names, ["Hardware", "Groceries"]);

    lists.rename(&groceries.id, "Weekly groceries").await.unwrap();
    assert_eq!(lists.lists()[0].name, "Weekly groceries");

    // Viewers cannot rename; the optimistic name is rolled back.
    add_member(&owner, &hardware.id, "u-vi", ListRole::Viewer).await;
    let viewer_lists = ListSync::new(viewer.clone());
    viewer_lists.refresh().await.unwrap();
    assert_eq!(
        status(viewer_lists.rename(&hardware.id, "Mine").await.unwrap_err()),
        403
    );
    assert_eq!(viewer_lists.lists()[0].name, "Hardware");

    lists.delete(&hardware.id).await.unwrap();
    assert_eq!(lists.lists().len(), 1);
    assert_eq!(owner.list_lists().await.unwrap().len(), 1);
}
