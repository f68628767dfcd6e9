use std::num::{NonZeroU64, NonZeroUsize};

use axum::Router;
use axum::body::Body;
use axum::http::{
    Method, Request, Response, StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, COOKIE, SET_COOKIE},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use tracing::level_filters::LevelFilter;

use flog::application::auth::hash_password;
use flog::config::{
    AuthSettings, LogFormat, LoggingSettings, ServerSettings, Settings, SiteSettings,
    UploadSettings,
};
use flog::infra::http::{AppState, build_router};

fn settings(uploads: &TempDir) -> Settings {
    Settings {
        server: ServerSettings {
            addr: "127.0.0.1:0".parse().expect("addr"),
        },
        logging: LoggingSettings {
            level: LevelFilter::INFO,
            format: LogFormat::Compact,
            directives: Vec::new(),
        },
        uploads: UploadSettings {
            directory: uploads.path().to_path_buf(),
            max_request_bytes: NonZeroU64::new(1024 * 1024).expect("non-zero"),
        },
        auth: AuthSettings {
            username: "admin".to_string(),
            password_sha256: Some(hash_password("secret")),
            session_ttl: time::Duration::hours(1),
        },
        site: SiteSettings {
            title: "Test Flog".to_string(),
            categories: vec!["Essays".to_string()],
            entries_per_page: NonZeroUsize::new(5).expect("non-zero"),
            entries_in_feed: NonZeroUsize::new(5).expect("non-zero"),
            public_url: "http://flog.test/".to_string(),
        },
    }
}

async fn app() -> (Router, TempDir) {
    let uploads = tempfile::tempdir().expect("tempdir");
    let state = AppState::in_memory(&settings(&uploads))
        .await
        .expect("state");
    (build_router(state), uploads)
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build"),
        None => builder.body(Body::empty()).expect("request should build"),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

async fn login(app: &Router) -> String {
    let response = send(
        app,
        request(
            Method::POST,
            "/client/api/v1/auth/",
            None,
            Some(json!({"username": "admin", "password": "secret"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie")
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

async fn post_entry(app: &Router, cookie: &str, entry: Value) -> Response<Body> {
    send(
        app,
        request(Method::POST, "/client/api/v1/entry/", Some(cookie), Some(entry)),
    )
    .await
}

#[tokio::test]
async fn wrong_password_is_rejected_without_detail() {
    let (app, _uploads) = app().await;
    let response = send(
        &app,
        request(
            Method::POST,
            "/client/api/v1/auth/",
            None,
            Some(json!({"username": "admin", "password": "wrong"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(body_json(response).await, json!({"success": false}));
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _uploads) = app().await;
    let response = send(
        &app,
        request(
            Method::POST,
            "/client/api/v1/entry/",
            Some("flog_session=forged"),
            Some(json!({"slug": "hello"})),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn logout_closes_the_session() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;
    let read_sidebar = || request(Method::GET, "/client/api/v1/sidebar/", Some(&cookie), None);
    assert_eq!(send(&app, read_sidebar()).await.status(), StatusCode::OK);

    let response = send(
        &app,
        request(Method::POST, "/client/api/v1/auth/logout/", Some(&cookie), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[SET_COOKIE]
        .to_str()
        .expect("ascii")
        .to_string();
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(response).await, json!({"success": true}));

    assert_eq!(
        send(&app, read_sidebar()).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn entry_upsert_is_idempotent_and_readable() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;
    let entry = json!({
        "slug": "hello",
        "meta": {"title": "Hello", "category": "Essays", "tags": ["Rust"]},
        "lead": "<p>lead</p>",
        "content": "<p>body</p>"
    });

    for _ in 0..2 {
        let response = post_entry(&app, &cookie, entry.clone()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"success": true}));
    }

    let response = send(
        &app,
        request(Method::GET, "/client/api/v1/entry/hello", Some(&cookie), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = body_json(response).await;
    assert_eq!(stored["slug"], "hello");
    assert_eq!(stored["meta"]["title"], "Hello");
    assert_eq!(stored["meta"]["category"], "Essays");
    assert_eq!(stored["meta"]["tags"], json!(["Rust"]));
    assert_eq!(stored["meta"]["public"], json!(false));
    assert_eq!(stored["content"], "<p>body</p>");
}

#[tokio::test]
async fn update_and_delete_report_missing_entries() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    let response = send(
        &app,
        request(
            Method::PUT,
            "/client/api/v1/entry/",
            Some(&cookie),
            Some(json!({"slug": "ghost", "content": "x"})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["success"], json!(false));

    post_entry(&app, &cookie, json!({"slug": "doomed"})).await;
    let delete = || request(Method::DELETE, "/client/api/v1/entry/doomed", Some(&cookie), None);
    assert_eq!(send(&app, delete()).await.status(), StatusCode::OK);
    assert_eq!(send(&app, delete()).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_entries_get_failure_envelopes() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    let response = post_entry(
        &app,
        &cookie,
        json!({"slug": "poem", "meta": {"category": "Poetry"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "category \"Poetry\" does not exist"
    );

    let response = post_entry(
        &app,
        &cookie,
        json!({"slug": "odd", "meta": {"colour": "red"}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().expect("message").contains("colour"));
}

#[tokio::test]
async fn uploads_replace_the_entry_directory_and_are_served() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    let upload = |files: Value| {
        request(
            Method::POST,
            "/client/api/v1/upload/hello",
            Some(&cookie),
            Some(json!({"slug": "hello", "files": files})),
        )
    };

    let first = upload(json!({"old.1a2b3c4d.txt": STANDARD.encode("old")}));
    assert_eq!(send(&app, first).await.status(), StatusCode::OK);
    let second = upload(json!({"cat.5e6f7a8b.png": STANDARD.encode([0x89, b'P', b'N', b'G'])}));
    assert_eq!(send(&app, second).await.status(), StatusCode::OK);

    let response = send(
        &app,
        request(
            Method::GET,
            "/static/uploads/entry/hello/cat.5e6f7a8b.png",
            None,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
    assert!(response.headers().contains_key(CACHE_CONTROL));

    let response = send(
        &app,
        request(
            Method::GET,
            "/static/uploads/entry/hello/old.1a2b3c4d.txt",
            None,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_uploads_are_rejected() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/client/api/v1/upload/hello",
            Some(&cookie),
            Some(json!({"slug": "hello", "files": {"a.txt": "***"}})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().expect("message").contains("a.txt"));

    let response = send(
        &app,
        request(
            Method::POST,
            "/client/api/v1/upload/hello",
            Some(&cookie),
            Some(json!({"slug": "other", "files": {}})),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sidebar_is_replaced_wholesale() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    let replace = |modules: Value| {
        request(
            Method::POST,
            "/client/api/v1/sidebar/",
            Some(&cookie),
            Some(json!({"modules": modules})),
        )
    };
    let first = replace(json!([
        {"title": "Old", "text": "<p>old</p>", "visible": true}
    ]));
    assert_eq!(send(&app, first).await.status(), StatusCode::OK);
    let second = replace(json!([
        {"title": "One", "text": "<p>1</p>", "visible": true},
        {"title": "Two", "text": "<p>2</p>"},
        {"title": "Zero", "text": "<p>0</p>", "visible": true, "index": -5}
    ]));
    assert_eq!(send(&app, second).await.status(), StatusCode::OK);

    let response = send(
        &app,
        request(Method::GET, "/client/api/v1/sidebar/", Some(&cookie), None),
    )
    .await;
    let body = body_json(response).await;
    let titles: Vec<&str> = body["modules"]
        .as_array()
        .expect("modules")
        .iter()
        .filter_map(|module| module["title"].as_str())
        .collect();
    assert_eq!(titles, ["Zero", "One", "Two"]);
    assert_eq!(body["modules"][2]["visible"], json!(false));

    let page = body_text(send(&app, request(Method::GET, "/", None, None)).await).await;
    assert!(page.contains("<p>1</p>"));
    assert!(!page.contains("<p>2</p>"));
    assert!(!page.contains("Old"));
}

#[tokio::test]
async fn public_site_hides_drafts_and_preview_needs_a_session() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    post_entry(
        &app,
        &cookie,
        json!({"slug": "live", "meta": {"title": "Live Post", "public": true}, "content": "<p>live</p>"}),
    )
    .await;
    post_entry(
        &app,
        &cookie,
        json!({"slug": "draft", "meta": {"title": "Draft Post"}, "content": "<p>draft</p>"}),
    )
    .await;

    let response = send(&app, request(Method::GET, "/", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let index = body_text(response).await;
    assert!(index.contains("Live Post"));
    assert!(index.contains(r#"href="/entry/live/""#));
    assert!(!index.contains("Draft Post"));

    let response = send(&app, request(Method::GET, "/entry/draft/", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, request(Method::GET, "/preview/entry/draft/", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request(Method::GET, "/preview/entry/draft/", Some(&cookie), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
    assert!(body_text(response).await.contains("<p>draft</p>"));

    let response = send(&app, request(Method::GET, "/preview/", Some(&cookie), None)).await;
    let preview = body_text(response).await;
    assert!(preview.contains(r#"href="/preview/entry/draft/""#));
    assert!(preview.contains(r#"href="/preview/entry/live/""#));
}

#[tokio::test]
async fn taxonomy_pages_and_feed_follow_visibility() {
    let (app, _uploads) = app().await;
    let cookie = login(&app).await;

    post_entry(
        &app,
        &cookie,
        json!({
            "slug": "live",
            "meta": {"title": "Live Post", "public": true, "category": "Essays", "tags": ["Rust"]},
            "content": "<p>live</p>"
        }),
    )
    .await;
    post_entry(
        &app,
        &cookie,
        json!({
            "slug": "draft",
            "meta": {"title": "Draft Post", "category": "Essays", "tags": ["Rust"]},
            "content": "<p>draft</p>"
        }),
    )
    .await;

    for uri in ["/tag/rust/", "/category/essays/", "/archives/"] {
        let response = send(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let page = body_text(response).await;
        assert!(page.contains(r#"href="/entry/live/""#), "{uri}");
        assert!(!page.contains("Draft Post"), "{uri}");

        let preview_uri = format!("/preview{uri}");
        let response = send(&app, request(Method::GET, &preview_uri, Some(&cookie), None)).await;
        assert_eq!(response.status(), StatusCode::OK, "{preview_uri}");
        assert!(
            body_text(response)
                .await
                .contains(r#"href="/preview/entry/draft/""#),
            "{preview_uri}"
        );
    }

    for uri in ["/tag/go/", "/category/poetry/", "/category/essays/2/", "/category/essays/x/"] {
        let response = send(&app, request(Method::GET, uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }

    let response = send(&app, request(Method::GET, "/preview/archives/", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, request(Method::GET, "/atom-feed-entries", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[CONTENT_TYPE]
            .to_str()
            .expect("ascii")
            .starts_with("application/atom+xml")
    );
    let feed = body_text(response).await;
    assert!(feed.contains("<title>Test Flog Entries</title>"));
    assert!(feed.contains("http://flog.test/entry/live/"));
    assert!(!feed.contains("/entry/draft/"));
}

#[tokio::test]
async fn unknown_pages_render_not_found() {
    let (app, _uploads) = app().await;
    let response = send(&app, request(Method::GET, "/nowhere", None, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Page Not Found"));
}
