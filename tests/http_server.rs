//! HTTP adapter tests: status mapping, session cookies, bearer auth.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use tower::ServiceExt;

use front_controller::session::SessionStore;
use front_controller::HttpServer;

mod common;

const DOCUMENT: &str = r#"
[application]
default_controller = "blog"

[auth]
enabled = true
allowed_routes = ["about"]
login_route = "account/login"

[auth.tokens]
"editor-token" = 2
"#;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// `name=value` part of a `Set-Cookie` header.
fn cookie_pair(response: &reqwest::Response) -> String {
    let header = response.headers()[SET_COOKIE].to_str().unwrap();
    header.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn test_status_mapping_and_login_redirect() {
    let (app, _) = common::blog_app(DOCUMENT, false);
    let (addr, shutdown, _) = common::start_server(app).await;
    let client = client();
    let base = format!("http://{addr}");

    let response = client.get(format!("{base}/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["view"], "blog/index");

    let response = client.get(format!("{base}/blog/edit/5")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[LOCATION], "/account/login");

    let response = client
        .get(format!("{base}/blog/edit/5"))
        .header(AUTHORIZATION, "Bearer editor-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["id"], "5");

    for path in ["news/index", "9lives", "blog/delete"] {
        let response = client.get(format!("{base}/{path}")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
    }

    let response = client.get(format!("{base}/about")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "about us");

    shutdown.trigger();
}

#[tokio::test]
async fn test_session_cookie_keeps_controller_state() {
    let (app, starts) = common::blog_app(DOCUMENT, false);
    let (addr, shutdown, _) = common::start_server(app).await;
    let client = client();
    let url = format!("http://{addr}/blog/show/1");

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let cookie = cookie_pair(&first);
    assert!(cookie.starts_with("session_id="));

    for expected in 2..=3 {
        let response = client.get(&url).header(COOKIE, &cookie).send().await.unwrap();
        assert!(!response.headers().contains_key(SET_COOKIE));
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["data"]["views"], expected);
    }

    // A request without the cookie starts a new session and a new instance.
    let fresh = client.get(&url).send().await.unwrap();
    let body: serde_json::Value = fresh.json().await.unwrap();
    assert_eq!(body["data"]["views"], 1);
    assert_eq!(starts.load(std::sync::atomic::Ordering::SeqCst), 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unauthorized_without_login_route() {
    let (app, _) = common::blog_app("[auth]\nenabled = true", false);
    let router = HttpServer::new(app).router();

    let response = router
        .oneshot(Request::get("/blog/admin").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dispatch_errors_are_server_errors() {
    let (app, _) = common::blog_app("", false);
    let router = HttpServer::new(app).router();

    for path in ["/blog/show", "/blog/broken", "/blog/spin"] {
        let response = router
            .clone()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "{path}");
    }
}

#[tokio::test]
async fn test_sessions_flushed_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let document = format!("[session]\npersistence_path = {:?}", path.display().to_string());

    let (app, _) = common::blog_app(&document, false);
    let (addr, shutdown, server) = common::start_server(app).await;

    let response = client()
        .get(format!("http://{addr}/blog/show/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.text().await.unwrap();

    shutdown.trigger();
    tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let sessions = saved.as_object().unwrap();
    assert_eq!(sessions.len(), 1);
    let session = sessions.values().next().unwrap();
    assert_eq!(session["referrer"], "blog/show/1");
    assert_eq!(session["controllers"]["blog"]["state"]["views"], 1);
}

#[tokio::test]
async fn test_cookieless_misses_store_nothing() {
    let (app, _) = common::blog_app("", false);
    let sessions = app.sessions.clone();
    let router = HttpServer::new(app).router();

    for _ in 0..100 {
        let response = router
            .clone()
            .oneshot(Request::get("/no/such/page").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!response.headers().contains_key(SET_COOKIE));
    }
    assert!(sessions.is_empty());

    let response = router
        .oneshot(Request::get("/blog/show/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(SET_COOKIE));
    assert_eq!(sessions.len(), 1);
}

#[tokio::test]
async fn test_unknown_session_cookie_is_replaced() {
    let (app, _) = common::blog_app("", false);
    let sessions = app.sessions.clone();
    let router = HttpServer::new(app).router();
    let forged = "session_id=8f4e2c1a-0000-4000-8000-000000000000";

    let response = router
        .oneshot(
            Request::get("/blog/show/1")
                .header(COOKIE, forged)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let issued = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(issued.starts_with("session_id="));
    assert!(!issued.starts_with(forged));
    assert_eq!(sessions.len(), 1);
    assert!(sessions
        .load(&front_controller::SessionId::new("8f4e2c1a-0000-4000-8000-000000000000"))
        .unwrap()
        .is_none());
}
