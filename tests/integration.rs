use serde_json::{json, Value};
use spin_sdk::http::{Method, Request};

use quill::core::db::MemStore;
use quill::route;

/// Drive a request through the router against an isolated in-memory store.
fn send(
    store: &MemStore,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (u16, Value) {
    let body_vec = body
        .map(|b| serde_json::to_vec(&b).unwrap())
        .unwrap_or_default();
    send_raw(store, method, uri, token, body_vec)
}

fn send_raw(
    store: &MemStore,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Vec<u8>,
) -> (u16, Value) {
    let mut builder = Request::builder();
    builder
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(t) = token {
        builder.header("Authorization", format!("Bearer {}", t).as_str());
    }
    let req = builder.body(body).build();

    let resp = route(&store.context(), &req).expect("router should not fail");
    let status = *resp.status();
    let value = if resp.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(resp.body()).expect("response should be JSON")
    };
    (status, value)
}

fn register(store: &MemStore, username: &str, email: &str, password: &str) -> (String, String) {
    let (status, body) = send(
        store,
        Method::Post,
        "/register",
        None,
        Some(json!({ "username": username, "email": email, "password": password })),
    );
    assert_eq!(status, 201, "register failed: {:?}", body);
    let user_id = body["user"]["id"].as_str().unwrap().to_string();
    let token = body["token"].as_str().unwrap().to_string();
    (user_id, token)
}

fn create_post(store: &MemStore, token: &str, title: &str, content: &str) -> String {
    let (status, body) = send(
        store,
        Method::Post,
        "/blog",
        Some(token),
        Some(json!({ "title": title, "content": content })),
    );
    assert_eq!(status, 201, "create post failed: {:?}", body);
    body["post"]["id"].as_str().unwrap().to_string()
}

#[test]
fn register_login_me_flow() {
    let store = MemStore::new();
    let (user_id, token) = register(&store, "alice", "alice@example.com", "wonderland1");

    let (status, body) = send(&store, Method::Get, "/me", Some(&token), None);
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");

    let (status, body) = send(
        &store,
        Method::Post,
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "wonderland1" })),
    );
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"], user_id.as_str());
    let login_token = body["token"].as_str().unwrap();

    let (status, _) = send(&store, Method::Get, "/me", Some(login_token), None);
    assert_eq!(status, 200);
}

#[test]
fn register_rejects_bad_input() {
    let store = MemStore::new();

    let cases = [
        json!({}),
        json!({ "username": "alice" }),
        json!({ "username": "alice", "email": "alice@example.com" }),
        json!({ "username": "alice", "email": "alice@example.com", "password": "short" }),
        json!({ "username": "alice", "email": "not-an-email", "password": "wonderland1" }),
        json!({ "username": "al", "email": "alice@example.com", "password": "wonderland1" }),
    ];

    for case in cases {
        let (status, body) = send(&store, Method::Post, "/register", None, Some(case.clone()));
        assert_eq!(status, 400, "expected 400 for {:?}, got {:?}", case, body);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }
}

#[test]
fn duplicate_registration_conflicts() {
    let store = MemStore::new();
    register(&store, "alice", "alice@example.com", "wonderland1");

    // Same email, different username
    let (status, body) = send(
        &store,
        Method::Post,
        "/register",
        None,
        Some(json!({ "username": "alice2", "email": "alice@example.com", "password": "wonderland1" })),
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "User already exists");

    // Same username, different email
    let (status, body) = send(
        &store,
        Method::Post,
        "/register",
        None,
        Some(json!({ "username": "alice", "email": "other@example.com", "password": "wonderland1" })),
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "User already exists");
}

#[test]
fn login_failures_are_indistinguishable() {
    let store = MemStore::new();
    register(&store, "alice", "alice@example.com", "wonderland1");

    let (wrong_status, wrong_body) = send(
        &store,
        Method::Post,
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "not-the-password" })),
    );
    let (unknown_status, unknown_body) = send(
        &store,
        Method::Post,
        "/login",
        None,
        Some(json!({ "email": "nobody@example.com", "password": "whatever-at-all" })),
    );

    assert_eq!(wrong_status, 401);
    assert_eq!(unknown_status, 401);
    assert_eq!(
        wrong_body, unknown_body,
        "wrong-password and unknown-email responses must match"
    );
}

#[test]
fn stored_secret_is_hashed_and_never_echoed() {
    use quill::core::db::Records;
    use quill::models::models::User;

    let store = MemStore::new();
    let (status, body) = send(
        &store,
        Method::Post,
        "/register",
        None,
        Some(json!({ "username": "alice", "email": "alice@example.com", "password": "wonderland1" })),
    );
    assert_eq!(status, 201);
    assert!(body["user"].get("password").is_none());
    assert!(!body.to_string().contains("wonderland1"));

    let stored = store
        .users
        .find_one(&|u: &User| u.email == "alice@example.com")
        .unwrap()
        .unwrap();
    assert_ne!(stored.password, "wonderland1");
    assert!(stored.password.starts_with("$argon2"));
}

#[test]
fn me_requires_live_subject() {
    use quill::core::db::Records;

    let store = MemStore::new();
    let (user_id, token) = register(&store, "ghost", "ghost@example.com", "wonderland1");

    // Token still verifies, but the subject is gone.
    assert!(store.users.delete_one(&user_id).unwrap());

    let (status, body) = send(&store, Method::Get, "/me", Some(&token), None);
    assert_eq!(status, 401, "token for a deleted user must not resolve: {:?}", body);
}

#[test]
fn expired_token_is_unauthorized() {
    let store = MemStore::new();
    let (user_id, _) = register(&store, "alice", "alice@example.com", "wonderland1");

    let stale = quill::auth::issue_token(&user_id, chrono::Utc::now() - chrono::Duration::days(8))
        .unwrap();
    let (status, _) = send(&store, Method::Get, "/me", Some(&stale), None);
    assert_eq!(status, 401);
}

#[test]
fn protected_routes_require_token() {
    let store = MemStore::new();
    let body = json!({ "title": "Hi", "content": "Hello world" });

    let (status, resp) = send(&store, Method::Post, "/blog", None, Some(body.clone()));
    assert_eq!(status, 401);
    assert_eq!(resp["message"], "Authentication required");

    let (status, resp) = send(&store, Method::Post, "/blog", Some("garbage"), Some(body));
    assert_eq!(status, 401);
    assert_eq!(resp["message"], "Invalid or expired token");

    let (status, _) = send(&store, Method::Get, "/me", None, None);
    assert_eq!(status, 401);
}

#[test]
fn create_and_read_post() {
    let store = MemStore::new();
    let (alice_id, token) = register(&store, "alice", "alice@example.com", "wonderland1");

    let (status, body) = send(
        &store,
        Method::Post,
        "/blog",
        Some(&token),
        Some(json!({
            "title": "Hi",
            "content": "Hello world",
            "image": "https://img.example.com/cover.png"
        })),
    );
    assert_eq!(status, 201);
    assert_eq!(body["success"], true);
    assert_eq!(body["post"]["title"], "Hi");
    assert_eq!(body["post"]["content"], "Hello world");
    assert_eq!(body["post"]["image"], "https://img.example.com/cover.png");
    assert_eq!(body["post"]["author"]["id"], alice_id.as_str());
    let post_id = body["post"]["id"].as_str().unwrap();

    // Public read, author resolved by lookup
    let (status, first) = send(&store, Method::Get, &format!("/blog/{}", post_id), None, None);
    assert_eq!(status, 200);
    assert_eq!(first["blog"]["author"]["id"], alice_id.as_str());
    assert_eq!(first["blog"]["author"]["username"], "alice");

    // Idempotent read
    let (_, second) = send(&store, Method::Get, &format!("/blog/{}", post_id), None, None);
    assert_eq!(first, second);
}

#[test]
fn create_post_validation() {
    let store = MemStore::new();
    let (_, token) = register(&store, "alice", "alice@example.com", "wonderland1");

    let cases = [
        json!({}),
        json!({ "title": "Hi" }),
        json!({ "title": "", "content": "Hello world" }),
        json!({ "title": "Hi", "content": "" }),
        json!({ "title": "Hi", "content": "Hello", "image": "not-a-url" }),
    ];
    for case in cases {
        let (status, body) = send(&store, Method::Post, "/blog", Some(&token), Some(case.clone()));
        assert_eq!(status, 400, "expected 400 for {:?}, got {:?}", case, body);
    }

    // Malformed JSON body
    let (status, body) = send_raw(
        &store,
        Method::Post,
        "/blog",
        Some(&token),
        b"{not json".to_vec(),
    );
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Invalid JSON body");
}

#[test]
fn ownership_guard_on_update_and_delete() {
    let store = MemStore::new();
    let (alice_id, alice_token) = register(&store, "alice", "alice@example.com", "wonderland1");
    let (_, bob_token) = register(&store, "bob", "bob@example.com", "builderbob1");

    let post_id = create_post(&store, &alice_token, "Hi", "Hello world");

    // Bob cannot touch Alice's post, whatever the patch says
    let (status, body) = send(
        &store,
        Method::Put,
        &format!("/blog/{}", post_id),
        Some(&bob_token),
        Some(json!({ "title": "Taken over" })),
    );
    assert_eq!(status, 403, "non-owner update must be forbidden: {:?}", body);

    let (status, _) = send(
        &store,
        Method::Delete,
        &format!("/blog/{}", post_id),
        Some(&bob_token),
        None,
    );
    assert_eq!(status, 403);

    // Nothing changed
    let (_, body) = send(&store, Method::Get, &format!("/blog/{}", post_id), None, None);
    assert_eq!(body["blog"]["title"], "Hi");

    // Alice patches the title; content and author stay put
    let (status, body) = send(
        &store,
        Method::Put,
        &format!("/blog/{}", post_id),
        Some(&alice_token),
        Some(json!({ "title": "Hi2" })),
    );
    assert_eq!(status, 200);
    assert_eq!(body["post"]["title"], "Hi2");
    assert_eq!(body["post"]["content"], "Hello world");
    assert_eq!(body["post"]["author"]["id"], alice_id.as_str());
    assert!(body["post"]["updated_at"].is_string());
}

#[test]
fn missing_post_is_not_found_before_forbidden() {
    let store = MemStore::new();
    let (_, token) = register(&store, "bob", "bob@example.com", "builderbob1");

    let ghost = uuid::Uuid::new_v4().to_string();
    for method in [Method::Put, Method::Delete] {
        let (status, body) = send(
            &store,
            method,
            &format!("/blog/{}", ghost),
            Some(&token),
            Some(json!({ "title": "x" })),
        );
        assert_eq!(status, 404, "absent post must 404 first: {:?}", body);
    }

    let (status, _) = send(&store, Method::Get, &format!("/blog/{}", ghost), None, None);
    assert_eq!(status, 404);

    // Malformed ids are indistinguishable from absent ones
    let (status, _) = send(&store, Method::Get, "/blog/not-a-uuid", None, None);
    assert_eq!(status, 404);
}

#[test]
fn delete_own_post() {
    let store = MemStore::new();
    let (_, token) = register(&store, "alice", "alice@example.com", "wonderland1");
    let post_id = create_post(&store, &token, "Hi", "Hello world");

    let (status, body) = send(
        &store,
        Method::Delete,
        &format!("/blog/{}", post_id),
        Some(&token),
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let (status, _) = send(&store, Method::Get, &format!("/blog/{}", post_id), None, None);
    assert_eq!(status, 404);

    let (_, body) = send(&store, Method::Get, "/blog", None, None);
    assert_eq!(body["count"], 0);
}

#[test]
fn list_is_public_newest_first_and_filterable() {
    let store = MemStore::new();
    let (_, alice_token) = register(&store, "alice", "alice@example.com", "wonderland1");
    let (_, bob_token) = register(&store, "bob", "bob@example.com", "builderbob1");

    create_post(&store, &alice_token, "First", "a");
    create_post(&store, &alice_token, "Second", "b");
    create_post(&store, &bob_token, "Third", "c");

    let (status, body) = send(&store, Method::Get, "/blog", None, None);
    assert_eq!(status, 200);
    assert_eq!(body["count"], 3);
    let titles: Vec<&str> = body["blogs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);

    let (_, body) = send(&store, Method::Get, "/blog?author=alice", None, None);
    assert_eq!(body["count"], 2);
    for blog in body["blogs"].as_array().unwrap() {
        assert_eq!(blog["author"]["username"], "alice");
    }

    let (_, body) = send(&store, Method::Get, "/blog?author=nobody", None, None);
    assert_eq!(body["count"], 0);

    let (_, body) = send(&store, Method::Get, "/blog?page=2", None, None);
    assert_eq!(body["count"], 0);
}

#[test]
fn list_survives_out_of_range_page() {
    let store = MemStore::new();
    let (_, token) = register(&store, "alice", "alice@example.com", "wonderland1");
    create_post(&store, &token, "Hi", "Hello world");

    // usize::MAX and friends must page past the end, not overflow
    for page in ["18446744073709551615", "18446744073709551614", "999999999"] {
        let (status, body) = send(
            &store,
            Method::Get,
            &format!("/blog?page={}", page),
            None,
            None,
        );
        assert_eq!(status, 200, "page={} must not fail: {:?}", page, body);
        assert_eq!(body["count"], 0);
    }
}

#[test]
fn html_only_fields_are_rejected() {
    let store = MemStore::new();
    let (_, token) = register(&store, "alice", "alice@example.com", "wonderland1");

    // Sanitization collapses these to empty strings; the non-empty
    // invariant applies to what would be stored.
    let cases = [
        json!({ "title": "<b></b>", "content": "Hello world" }),
        json!({ "title": "Hi", "content": "<script>alert(1)</script>" }),
        json!({ "title": "<b></b>", "content": "<script>alert(1)</script>" }),
    ];
    for case in cases {
        let (status, body) = send(&store, Method::Post, "/blog", Some(&token), Some(case.clone()));
        assert_eq!(status, 400, "expected 400 for {:?}, got {:?}", case, body);
    }

    // Same guard on update: the stored post keeps its fields
    let post_id = create_post(&store, &token, "Hi", "Hello world");
    let (status, _) = send(
        &store,
        Method::Put,
        &format!("/blog/{}", post_id),
        Some(&token),
        Some(json!({ "title": "<i></i>" })),
    );
    assert_eq!(status, 400);

    let (status, _) = send(
        &store,
        Method::Put,
        &format!("/blog/{}", post_id),
        Some(&token),
        Some(json!({ "content": "<script></script>" })),
    );
    assert_eq!(status, 400);

    let (_, body) = send(&store, Method::Get, &format!("/blog/{}", post_id), None, None);
    assert_eq!(body["blog"]["title"], "Hi");
    assert_eq!(body["blog"]["content"], "Hello world");
}

#[test]
fn unknown_route_is_not_found() {
    let store = MemStore::new();
    let (status, body) = send(&store, Method::Get, "/nope", None, None);
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
}

#[test]
fn login_requires_fields() {
    let store = MemStore::new();
    let (status, _) = send(&store, Method::Post, "/login", None, Some(json!({})));
    assert_eq!(status, 400);

    let (status, _) = send(
        &store,
        Method::Post,
        "/login",
        None,
        Some(json!({ "email": "alice@example.com" })),
    );
    assert_eq!(status, 400);
}
