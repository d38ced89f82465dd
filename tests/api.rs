//! End-to-end tests against the full router: in-memory SQLite, a temp-dir
//! object store and real signed cookies.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use clinic_gallery::{
    db,
    services::{
        asset_service::AssetService,
        image_repository::SqliteImageRepository,
        object_store::{LocalDiskStore, ObjectStore},
        session_service::{SessionAuthenticator, SessionConfig},
    },
    state::AppState,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const PASSWORD: &str = "s3cret-clinic";
const BOUNDARY: &str = "XGALLERYBOUNDARY";
const UPLOAD_LIMIT: usize = 64 * 1024;

struct TestApp {
    router: Router,
    storage: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_password(Some(PASSWORD)).await
    }

    async fn with_password(password: Option<&str>) -> Self {
        let pool = Arc::new(db::connect_in_memory().await.expect("in-memory db"));
        let storage = TempDir::new().expect("tempdir");
        let store = Arc::new(LocalDiskStore::new(storage.path(), "http://clinic.test"));
        let objects: Arc<dyn ObjectStore> = store.clone();
        let assets = AssetService::new(objects, Arc::new(SqliteImageRepository::new(pool)));
        let sessions = SessionAuthenticator::new(SessionConfig {
            admin_password: password.map(|p| SecretString::new(p.to_string())),
            session_secret: None,
            cookie_secure: true,
        });
        let state = AppState::new(assets, sessions, Some(store));
        Self {
            router: clinic_gallery::app(state, UPLOAD_LIMIT),
            storage,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Log in and return the `name=value` pair to replay in a `Cookie` header.
    async fn login(&self) -> String {
        let response = self.send(login_request(PASSWORD)).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_pair(&response)
    }

    async fn upload(&self, cookie: Option<&str>, title: &str, image: &[u8]) -> Response<Body> {
        let body = multipart_body(&[
            Part::Text("title", title),
            Part::Text("description", "Before and after"),
            Part::File("image", "smile.jpg", image),
        ]);
        self.send(multipart_request(cookie, body)).await
    }

    async fn stored_files(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() { count(&path) } else { 1 }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self.storage.path())
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::post("/api/admin/image").header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

fn login_request(password: &str) -> Request<Body> {
    json_request("POST", "/api/admin/login", None, json!({ "password": password }))
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn set_cookie(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .to_string()
}

fn session_pair(response: &Response<Body>) -> String {
    set_cookie(response)
        .split(';')
        .next()
        .unwrap()
        .trim()
        .to_string()
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("json body")
}

fn jpeg(len: usize) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    data.resize(len.max(data.len()), 0x42);
    data
}

fn path_of(url: &str) -> &str {
    url.strip_prefix("http://clinic.test").expect("image url on public origin")
}

#[tokio::test]
async fn wrong_password_is_rejected_without_cookie() {
    let app = TestApp::new().await;

    let response = app.send(login_request("guess")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = json_body(response).await;
    assert_eq!(body, json!({ "success": false, "message": "Incorrect password" }));
}

#[tokio::test]
async fn login_sets_hardened_session_cookie() {
    let app = TestApp::new().await;

    let response = app.send(login_request(PASSWORD)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = set_cookie(&response);
    assert!(cookie.starts_with("admin="));
    for attribute in ["HttpOnly", "Secure", "SameSite=Lax", "Path=/", "Max-Age=86400"] {
        assert!(cookie.contains(attribute), "{} missing from {}", attribute, cookie);
    }
    let pair = session_pair(&response);
    assert_eq!(json_body(response).await["success"], json!(true));

    let status = json_body(app.send(get("/api/admin/session", Some(&pair))).await).await;
    assert_eq!(status["authenticated"], json!(true));
    let anonymous = json_body(app.send(get("/api/admin/session", None)).await).await;
    assert_eq!(anonymous["authenticated"], json!(false));
}

#[tokio::test]
async fn login_without_configured_password_is_unavailable() {
    let app = TestApp::with_password(None).await;

    let response = app.send(login_request("")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn malformed_login_body_uses_error_envelope() {
    let app = TestApp::new().await;

    let request = Request::post("/api/admin/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], json!(false));
}

#[tokio::test]
async fn mistyped_login_bodies_are_bad_requests() {
    let app = TestApp::new().await;

    let response = app
        .send(json_request("POST", "/api/admin/login", None, json!({ "password": 123 })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(json_body(response).await["success"], json!(false));

    let untyped = Request::post("/api/admin/login")
        .body(Body::from(json!({ "password": PASSWORD }).to_string()))
        .unwrap();
    let response = app.send(untyped).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn malformed_delete_bodies_are_bad_requests() {
    let app = TestApp::new().await;
    let cookie = app.login().await;
    let kept = json_body(app.upload(Some(&cookie), "Kept", &jpeg(128)).await).await;

    for body in [json!({ "ids": "abc" }), json!({ "ids": [1, 2] }), json!(["abc"])] {
        let response = app
            .send(json_request("DELETE", "/api/admin/image", Some(&cookie), body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let reply = json_body(response).await;
        assert_eq!(reply["success"], json!(false));
        assert_eq!(reply["message"], json!("No image IDs provided"));
    }

    let empty = Request::delete("/api/admin/image")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.send(empty).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], json!("No image IDs provided"));

    let listing = json_body(app.send(get("/api/gallery", None)).await).await;
    assert_eq!(listing["images"], json!([kept["image"]]));
}

#[tokio::test]
async fn forged_cookie_is_not_a_session() {
    let app = TestApp::new().await;

    let forged = "admin=granted";
    let response = app.upload(Some(forged), "Forged", &jpeg(256)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Unauthorized" })
    );
    assert_eq!(app.stored_files().await, 0);
}

#[tokio::test]
async fn upload_list_serve_round_trip() {
    let app = TestApp::new().await;
    let cookie = app.login().await;
    let payload = jpeg(2048);

    let response = app.upload(Some(&cookie), "  Whitening  ", &payload).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Image uploaded successfully"));
    let image = &body["image"];
    assert_eq!(image["title"], json!("Whitening"));
    assert_eq!(image["description"], json!("Before and after"));
    assert!(image["id"].is_string());
    assert!(image["createdAt"].is_string());
    let image_url = image["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("http://clinic.test/media/"));
    assert!(image_url.ends_with(".jpg"));

    let second = app.upload(Some(&cookie), "Implants", &jpeg(512)).await;
    assert_eq!(second.status(), StatusCode::CREATED);

    // The listing is public and newest first.
    let listing = json_body(app.send(get("/api/gallery", None)).await).await;
    let titles: Vec<&str> = listing["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|image| image["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Implants", "Whitening"]);
    let admin_listing = json_body(app.send(get("/api/admin/image", None)).await).await;
    assert_eq!(admin_listing, listing);

    let media = app.send(get(path_of(&image_url), None)).await;
    assert_eq!(media.status(), StatusCode::OK);
    assert_eq!(media.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(
        media.headers()[header::CONTENT_LENGTH],
        payload.len().to_string().as_str()
    );
    let bytes = to_bytes(media.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn upload_requires_every_field() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let body = multipart_body(&[
        Part::Text("title", "No description"),
        Part::File("image", "a.jpg", &jpeg(128)),
    ]);
    let response = app.send(multipart_request(Some(&cookie), body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "message": "Image, title, description required" })
    );

    let blank = multipart_body(&[
        Part::Text("title", "   "),
        Part::Text("description", "x"),
        Part::File("image", "a.jpg", &jpeg(128)),
    ]);
    let response = app.send(multipart_request(Some(&cookie), blank)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.stored_files().await, 0);
    let listing = json_body(app.send(get("/api/gallery", None)).await).await;
    assert_eq!(listing["images"], json!([]));
}

#[tokio::test]
async fn non_image_upload_is_rejected() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let response = app
        .upload(Some(&cookie), "Notes", b"just some plain text, not pixels")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["success"], json!(false));
    assert_eq!(app.stored_files().await, 0);
}

#[tokio::test]
async fn oversized_upload_is_payload_too_large() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let response = app
        .upload(Some(&cookie), "Huge", &jpeg(UPLOAD_LIMIT * 2))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.stored_files().await, 0);
}

#[tokio::test]
async fn bulk_delete_flow() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let mut ids = Vec::new();
    let mut urls = Vec::new();
    for title in ["One", "Two", "Three"] {
        let body = json_body(app.upload(Some(&cookie), title, &jpeg(300)).await).await;
        ids.push(body["image"]["id"].as_str().unwrap().to_string());
        urls.push(body["image"]["imageUrl"].as_str().unwrap().to_string());
    }
    assert_eq!(app.stored_files().await, 3);

    // Anonymous callers cannot delete.
    let response = app
        .send(json_request("DELETE", "/api/admin/image", None, json!({ "ids": [ids[0]] })))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(json_request("DELETE", "/api/admin/image", Some(&cookie), json!({ "ids": [] })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["message"], json!("No image IDs provided"));

    let response = app
        .send(json_request(
            "DELETE",
            "/api/admin/image",
            Some(&cookie),
            json!({ "ids": ["not-a-uuid", "8c7a3b0e-5b8f-4a57-9d2e-1f2e3d4c5b6a"] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["message"], json!("No images found"));

    let response = app
        .send(json_request(
            "DELETE",
            "/api/admin/image",
            Some(&cookie),
            json!({ "ids": [ids[0], ids[1], ids[1], "not-a-uuid"] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["requested"], json!(3));
    assert_eq!(body["deleted"], json!(2));
    assert_eq!(body["message"], json!("2 image(s) deleted successfully"));
    assert_eq!(body["storageFailures"], json!([]));

    assert_eq!(app.stored_files().await, 1);
    let listing = json_body(app.send(get("/api/gallery", None)).await).await;
    let remaining: Vec<&str> = listing["images"]
        .as_array()
        .unwrap()
        .iter()
        .map(|image| image["id"].as_str().unwrap())
        .collect();
    assert_eq!(remaining, vec![ids[2].as_str()]);

    let gone = app.send(get(path_of(&urls[0]), None)).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    // Repeating the delete finds nothing left.
    let response = app
        .send(json_request(
            "DELETE",
            "/api/admin/image",
            Some(&cookie),
            json!({ "ids": [ids[0], ids[1]] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_clears_and_revokes_session() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    // Anonymous logout leaves the live session alone.
    let response = app
        .send(Request::post("/api/admin/logout").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(app.send(get("/api/admin/session", Some(&cookie))).await).await;
    assert_eq!(status["authenticated"], json!(true));

    let response = app
        .send(
            Request::post("/api/admin/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie(&response);
    assert!(cleared.starts_with("admin=;"), "unexpected cookie {}", cleared);
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(
        json_body(response).await,
        json!({ "success": true, "message": "Logged out successfully" })
    );

    // A replayed copy of the old cookie no longer works.
    let response = app.upload(Some(&cookie), "After logout", &jpeg(64)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Logging in again issues a fresh, working session.
    let fresh = app.login().await;
    let response = app.upload(Some(&fresh), "Fresh", &jpeg(64)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn media_rejects_unknown_and_escaping_paths() {
    let app = TestApp::new().await;

    let missing = app.send(get("/media/ab/cd/missing.jpg", None)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let escaping = app.send(get("/media/..%2F..%2Fetc%2Fpasswd", None)).await;
    assert_eq!(escaping.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoints_report_ok() {
    let app = TestApp::new().await;

    let health = app.send(get("/healthz", None)).await;
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(json_body(health).await, json!({ "status": "ok" }));

    let ready = app.send(get("/readyz", None)).await;
    assert_eq!(ready.status(), StatusCode::OK);
    let body = json_body(ready).await;
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["checks"]["sqlite"]["ok"], json!(true));
    assert_eq!(body["checks"]["local"]["ok"], json!(true));
}

#[tokio::test]
async fn lobby_scenario() {
    let app = TestApp::new().await;
    let cookie = app.login().await;

    let empty = app.send(get("/api/admin/image", None)).await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(json_body(empty).await, json!({ "success": true, "images": [] }));

    let body = multipart_body(&[
        Part::Text("title", "Lobby"),
        Part::Text("description", "Front desk"),
        Part::File("image", "lobby.jpg", &jpeg(5 * 1024)),
    ]);
    let response = app.send(multipart_request(Some(&cookie), body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await["image"].clone();
    assert_eq!(created["title"], json!("Lobby"));
    assert!(!created["imageUrl"].as_str().unwrap().is_empty());

    let listing = json_body(app.send(get("/api/admin/image", None)).await).await;
    assert_eq!(listing["images"].as_array().unwrap().len(), 1);
    assert_eq!(listing["images"][0], created);

    let response = app
        .send(json_request(
            "DELETE",
            "/api/admin/image",
            Some(&cookie),
            json!({ "ids": [created["id"]] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = json_body(app.send(get("/api/admin/image", None)).await).await;
    assert_eq!(listing["images"], json!([]));

    let response = app
        .send(json_request(
            "DELETE",
            "/api/admin/image",
            Some(&cookie),
            json!({ "ids": ["nonexistent-id"] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["success"], json!(false));
}
