#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

use vitshare::registry::PathRegistry;
use vitshare::server::auth::TOKEN_HEADER;
use vitshare::server::{routes, AppState};
use vitshare::store::TransferStore;

pub const PASSWORD: &str = "testpw42";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub share_dir: TempDir,
    pub receive_dir: TempDir,
}

/// Shared fixture: a share directory containing `a.txt` (12 bytes) and
/// `sub/b.txt` (5 bytes), served with a known password.
pub fn test_app() -> TestApp {
    let share_dir = TempDir::new().expect("share dir");
    std::fs::write(share_dir.path().join("a.txt"), b"hello world!").unwrap();
    std::fs::create_dir(share_dir.path().join("sub")).unwrap();
    std::fs::write(share_dir.path().join("sub/b.txt"), b"bytes").unwrap();

    let receive_dir = TempDir::new().expect("receive dir");

    let registry = PathRegistry::new();
    registry.add(share_dir.path());

    let state = AppState::new(
        registry,
        TransferStore::new(),
        PASSWORD.to_string(),
        receive_dir.path().to_path_buf(),
    );
    let app = routes::create_router(state.clone());

    TestApp {
        app,
        state,
        share_dir,
        receive_dir,
    }
}

pub fn auth_request(password: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "password": password }).to_string(),
        ))
        .expect("build auth request")
}

/// Run the password handshake and return the issued token.
pub async fn authenticate(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(auth_request(PASSWORD))
        .await
        .expect("auth response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    body["token"].as_str().expect("token field").to_string()
}

pub fn get_with_token(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(TOKEN_HEADER, token)
        .body(Body::empty())
        .expect("build request")
}

pub async fn read_body(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes()
        .to_vec()
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&read_body(response).await).expect("json body")
}

const BOUNDARY: &str = "----VitShareTestBoundary";

/// Build a multipart upload request carrying one file part.
pub fn upload_request(token: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(TOKEN_HEADER, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build upload request")
}

/// Multipart body with a plain text field and no file part.
pub fn upload_request_without_file(token: &str) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"note\"\r\n\r\n");
    body.extend_from_slice(b"no file here");
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(TOKEN_HEADER, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build upload request")
}

pub fn sha256(bytes: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().to_vec()
}

/// Every file under `dir`, recursively, as paths relative to it.
pub fn files_under(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).into_iter().flatten().flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                found.push(path.strip_prefix(dir).unwrap().to_path_buf());
            }
        }
    }
    found
}
