//! End-to-end tests driving the API router in-process.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use berth_server::config::ServerConfig;
use berth_server::routes;
use berth_server::state::AppState;
use berth_storage::MemoryBackend;

struct TestApp {
    router: Router,
}

struct Reply {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        let config = ServerConfig::from_lookup(|_| None);
        let state = Arc::new(AppState::new(Arc::new(MemoryBackend::new()), &config));
        Self {
            router: routes::router(state),
        }
    }

    async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_owned());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Reply {
            status,
            set_cookie,
            body,
        }
    }

    /// Register and log in; returns the `Cookie` header value.
    async fn login_as(&self, username: &str) -> String {
        let registered = self
            .send(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "fullName": "Test User",
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "Passw0rd!",
                })),
            )
            .await;
        assert_eq!(registered.status, StatusCode::CREATED);

        let login = self
            .send(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "username": username, "password": "Passw0rd!" })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK);
        let set_cookie = login.set_cookie.expect("login sets a cookie");
        set_cookie.split(';').next().unwrap().to_owned()
    }

    /// Create project → environment → resource, returning their ids.
    async fn scaffold(&self, cookie: &str) -> (String, String, String) {
        let project = self
            .send(
                Method::POST,
                "/projects",
                Some(cookie),
                Some(json!({ "name": "shop", "description": "storefront" })),
            )
            .await;
        assert_eq!(project.status, StatusCode::CREATED);
        let pid = project.body["id"].as_str().unwrap().to_owned();

        let env = self
            .send(
                Method::POST,
                &format!("/projects/{pid}/environments"),
                Some(cookie),
                Some(json!({ "name": "production" })),
            )
            .await;
        assert_eq!(env.status, StatusCode::CREATED);
        let eid = env.body["id"].as_str().unwrap().to_owned();

        let resource = self
            .send(
                Method::POST,
                &format!("/projects/{pid}/environments/{eid}/resources"),
                Some(cookie),
                Some(json!({})),
            )
            .await;
        assert_eq!(resource.status, StatusCode::CREATED);
        let rid = resource.body["id"].as_str().unwrap().to_owned();

        (pid, eid, rid)
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn domain_routes_require_a_session() {
    let app = TestApp::new();
    for uri in ["/projects", "/auth/me"] {
        let reply = app.send(Method::GET, uri, None, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(reply.body["error"], "unauthorized");
    }

    let forged = app
        .send(Method::GET, "/projects", Some("berth_session=not-a-token"), None)
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_reports_every_violation() {
    let app = TestApp::new();
    let reply = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "fullName": "A",
                "username": "no spaces",
                "email": "not-an-email",
                "password": "short",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "validation_error");

    let fields: Vec<&str> = reply.body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    for field in ["fullName", "username", "email", "password"] {
        assert!(fields.contains(&field), "{field} missing from {fields:?}");
    }
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = TestApp::new();
    app.login_as("ada").await;
    let reply = app
        .send(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "fullName": "Other Ada",
                "username": "ada",
                "email": "other@example.com",
                "password": "Passw0rd!",
            })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_sets_http_only_cookie_and_rejects_bad_password() {
    let app = TestApp::new();
    let cookie = app.login_as("grace").await;
    assert!(cookie.starts_with("berth_session="));

    let login = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "grace", "password": "Passw0rd!" })),
        )
        .await;
    let raw = login.set_cookie.unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    assert!(raw.contains("Path=/"));
    assert!(raw.contains("Max-Age=86400"));

    let bad = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "grace", "password": "wrong" })),
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);

    let me = app.send(Method::GET, "/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "grace");
    assert!(me.body.get("passwordHash").is_none());
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = TestApp::new();
    let cookie = app.login_as("linus").await;

    let out = app.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);

    let after = app.send(Method::GET, "/projects", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_project_name_is_rejected_without_side_effects() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;

    let reply = app
        .send(
            Method::POST,
            "/projects",
            Some(&cookie),
            Some(json!({ "name": "  ", "description": "desc" })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"], "validation_error");

    let list = app.send(Method::GET, "/projects", Some(&cookie), None).await;
    assert_eq!(list.body["projects"], json!([]));
    assert_eq!(list.body["revision"], 0);
}

#[tokio::test]
async fn project_listing_counts_environments_and_resources() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (pid, _, _) = app.scaffold(&cookie).await;

    let list = app.send(Method::GET, "/projects", Some(&cookie), None).await;
    assert_eq!(list.status, StatusCode::OK);
    let summary = &list.body["projects"][0];
    assert_eq!(summary["id"], pid.as_str());
    assert_eq!(summary["environmentCount"], 1);
    assert_eq!(summary["resourceCount"], 1);
    assert_eq!(list.body["revision"], 3);
}

#[tokio::test]
async fn hierarchies_are_private_to_their_owner() {
    let app = TestApp::new();
    let ada = app.login_as("ada").await;
    let grace = app.login_as("grace").await;
    let (pid, _, rid) = app.scaffold(&ada).await;

    let project = app
        .send(Method::GET, &format!("/projects/{pid}"), Some(&grace), None)
        .await;
    assert_eq!(project.status, StatusCode::NOT_FOUND);

    let vars = app
        .send(Method::GET, &format!("/resources/{rid}/variables"), Some(&grace), None)
        .await;
    assert_eq!(vars.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resource_in_unknown_environment_is_not_found() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (pid, _, _) = app.scaffold(&cookie).await;

    let reply = app
        .send(
            Method::POST,
            &format!("/projects/{pid}/environments/{}/resources", uuid::Uuid::new_v4()),
            Some(&cookie),
            Some(json!({})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let list = app.send(Method::GET, "/projects", Some(&cookie), None).await;
    assert_eq!(list.body["projects"][0]["resourceCount"], 1);
}

#[tokio::test]
async fn variable_editor_flow() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;
    let vars_uri = format!("/resources/{rid}/variables");

    let empty = app.send(Method::GET, &vars_uri, Some(&cookie), None).await;
    assert_eq!(empty.body["state"], "draft");
    assert_eq!(empty.body["variables"], json!([]));

    let added = app.send(Method::POST, &vars_uri, Some(&cookie), None).await;
    assert_eq!(added.status, StatusCode::CREATED);
    assert_eq!(added.body["variables"][0]["isSecret"], false);
    assert_eq!(added.body["state"], "draft");

    let keyed = app
        .send(
            Method::PATCH,
            &format!("{vars_uri}/0"),
            Some(&cookie),
            Some(json!({ "field": "key", "value": "DB_PASSWORD" })),
        )
        .await;
    assert_eq!(keyed.status, StatusCode::OK);
    assert_eq!(keyed.body["variables"][0]["key"], "DB_PASSWORD");
    assert_eq!(keyed.body["variables"][0]["isSecret"], true);
    assert_eq!(keyed.body["state"], "configured");

    let valued = app
        .send(
            Method::PATCH,
            &format!("{vars_uri}/0"),
            Some(&cookie),
            Some(json!({ "field": "value", "value": "hunter2" })),
        )
        .await;
    assert_eq!(valued.body["variables"][0]["value"], "hunter2");
    assert_eq!(valued.body["variables"][0]["isSecret"], true);

    let out_of_range = app
        .send(Method::DELETE, &format!("{vars_uri}/7"), Some(&cookie), None)
        .await;
    assert_eq!(out_of_range.status, StatusCode::OK);
    assert_eq!(out_of_range.body["variables"].as_array().unwrap().len(), 1);

    let env = app
        .send(Method::GET, &format!("/resources/{rid}/env"), Some(&cookie), None)
        .await;
    assert_eq!(env.body["variables"], json!({ "DB_PASSWORD": "hunter2" }));
    assert_eq!(env.body["secretKeys"], json!(["DB_PASSWORD"]));

    let removed = app
        .send(Method::DELETE, &format!("{vars_uri}/0"), Some(&cookie), None)
        .await;
    assert_eq!(removed.body["variables"], json!([]));
}

#[tokio::test]
async fn manual_secret_flag_survives_value_edits() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;
    let vars_uri = format!("/resources/{rid}/variables");

    let put = app
        .send(
            Method::PUT,
            &vars_uri,
            Some(&cookie),
            Some(json!({
                "variables": [{ "key": "API_KEY", "value": "abc", "isSecret": false }],
            })),
        )
        .await;
    assert_eq!(put.status, StatusCode::OK);
    assert_eq!(put.body["variables"][0]["isSecret"], false);

    let edited = app
        .send(
            Method::PATCH,
            &format!("{vars_uri}/0"),
            Some(&cookie),
            Some(json!({ "field": "value", "value": "xyz" })),
        )
        .await;
    assert_eq!(edited.body["variables"][0]["isSecret"], false);
    assert_eq!(edited.body["variables"][0]["value"], "xyz");
}

#[tokio::test]
async fn stale_replace_conflicts() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;
    let vars_uri = format!("/resources/{rid}/variables");

    let loaded = app.send(Method::GET, &vars_uri, Some(&cookie), None).await;
    let revision = loaded.body["revision"].as_u64().unwrap();

    let first = app
        .send(
            Method::PUT,
            &vars_uri,
            Some(&cookie),
            Some(json!({ "variables": [{ "key": "PORT", "value": "80" }], "expectedRevision": revision })),
        )
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["revision"], revision + 1);

    let stale = app
        .send(
            Method::PUT,
            &vars_uri,
            Some(&cookie),
            Some(json!({ "variables": [{ "key": "PORT", "value": "81" }], "expectedRevision": revision })),
        )
        .await;
    assert_eq!(stale.status, StatusCode::CONFLICT);

    let current = app.send(Method::GET, &vars_uri, Some(&cookie), None).await;
    assert_eq!(current.body["variables"][0]["value"], "80");
}

#[tokio::test]
async fn replace_keeps_identity_of_records_sent_back() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;
    let vars_uri = format!("/resources/{rid}/variables");

    app.send(Method::POST, &vars_uri, Some(&cookie), None).await;
    let keyed = app
        .send(
            Method::PATCH,
            &format!("{vars_uri}/0"),
            Some(&cookie),
            Some(json!({ "field": "key", "value": "PORT" })),
        )
        .await;
    let before = keyed.body["variables"][0].clone();

    let loaded = app.send(Method::GET, &vars_uri, Some(&cookie), None).await;
    let unchanged = app
        .send(
            Method::PUT,
            &vars_uri,
            Some(&cookie),
            Some(json!({ "variables": loaded.body["variables"] })),
        )
        .await;
    assert_eq!(unchanged.status, StatusCode::OK);
    assert_eq!(unchanged.body["variables"][0], before);

    let mut edited = before.clone();
    edited["value"] = json!("8080");
    let replaced = app
        .send(
            Method::PUT,
            &vars_uri,
            Some(&cookie),
            Some(json!({ "variables": [edited.clone(), edited, { "key": "HOST" }] })),
        )
        .await;
    let vars = replaced.body["variables"].as_array().unwrap();
    assert_eq!(vars[0]["id"], before["id"]);
    assert_eq!(vars[0]["createdAt"], before["createdAt"]);
    assert_eq!(vars[0]["value"], "8080");
    assert_ne!(vars[1]["id"], before["id"]);
    assert_ne!(vars[2]["id"], before["id"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unversioned_replace_never_conflicts_with_other_edits() {
    let app = Arc::new(TestApp::new());
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;
    let vars_uri = format!("/resources/{rid}/variables");
    app.send(Method::POST, &vars_uri, Some(&cookie), None).await;

    let mut tasks = Vec::new();
    for i in 0..16 {
        let (app, cookie, vars_uri) = (Arc::clone(&app), cookie.clone(), vars_uri.clone());
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                app.send(
                    Method::PUT,
                    &vars_uri,
                    Some(&cookie),
                    Some(json!({ "variables": [{ "key": "PORT", "value": i.to_string() }] })),
                )
                .await
                .status
            } else {
                app.send(
                    Method::PATCH,
                    &format!("{vars_uri}/0"),
                    Some(&cookie),
                    Some(json!({ "field": "value", "value": i.to_string() })),
                )
                .await
                .status
            }
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let current = app.send(Method::GET, &vars_uri, Some(&cookie), None).await;
    assert_eq!(current.body["revision"], 4 + 16);
}

#[tokio::test]
async fn malformed_json_gets_an_error_body() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
}

#[tokio::test]
async fn duplicate_keys_block_the_deployment_env() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;

    app.send(
        Method::PUT,
        &format!("/resources/{rid}/variables"),
        Some(&cookie),
        Some(json!({ "variables": [
            { "key": "PORT", "value": "1" },
            { "key": "PORT", "value": "2" },
        ] })),
    )
    .await;

    let env = app
        .send(Method::GET, &format!("/resources/{rid}/env"), Some(&cookie), None)
        .await;
    assert_eq!(env.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(env.body["error"], "duplicate_key");
}

#[tokio::test]
async fn deletes_cascade() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (pid, eid, rid) = app.scaffold(&cookie).await;

    let env_deleted = app
        .send(
            Method::DELETE,
            &format!("/projects/{pid}/environments/{eid}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(env_deleted.status, StatusCode::NO_CONTENT);

    let vars = app
        .send(Method::GET, &format!("/resources/{rid}/variables"), Some(&cookie), None)
        .await;
    assert_eq!(vars.status, StatusCode::NOT_FOUND);

    let project_deleted = app
        .send(Method::DELETE, &format!("/projects/{pid}"), Some(&cookie), None)
        .await;
    assert_eq!(project_deleted.status, StatusCode::NO_CONTENT);

    let list = app.send(Method::GET, "/projects", Some(&cookie), None).await;
    assert_eq!(list.body["projects"], json!([]));
}

#[tokio::test]
async fn resource_deletion_removes_its_config() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (_, _, rid) = app.scaffold(&cookie).await;

    let deleted = app
        .send(Method::DELETE, &format!("/resources/{rid}"), Some(&cookie), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let again = app
        .send(Method::DELETE, &format!("/resources/{rid}"), Some(&cookie), None)
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn new_resource_link_encodes_its_query() {
    let app = TestApp::new();
    let cookie = app.login_as("ada").await;
    let (pid, eid, _) = app.scaffold(&cookie).await;
    let server = uuid::Uuid::new_v4();

    let link = app
        .send(
            Method::GET,
            &format!("/projects/{pid}/environments/{eid}/resources/new-link?serverId={server}"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(link.status, StatusCode::OK);
    assert_eq!(
        link.body["href"],
        format!("/projects/{pid}/environments/{eid}/new?server={server}&returnTo=%2Fprojects%2F{pid}")
    );

    let no_server = app
        .send(
            Method::GET,
            &format!("/projects/{pid}/environments/{eid}/resources/new-link?serverId="),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(
        no_server.body["href"],
        format!("/projects/{pid}/environments/{eid}/new?server=&returnTo=%2Fprojects%2F{pid}")
    );

    let bad = app
        .send(
            Method::GET,
            &format!("/projects/{pid}/environments/{eid}/resources/new-link?serverId=nope"),
            Some(&cookie),
            None,
        )
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}
