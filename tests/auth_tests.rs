mod common;

use axum::http::StatusCode;
use common::{auth_request, authenticate, get_with_token, read_json, test_app};
use tower::ServiceExt;

#[tokio::test]
async fn wrong_password_gets_401_and_no_token() {
    let fixture = test_app();

    let response = fixture
        .app
        .clone()
        .oneshot(auth_request("not-the-password"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = read_json(response).await;
    assert!(body.get("token").is_none());
    assert!(fixture.state.tokens.is_empty(), "no token must be issued");
}

#[tokio::test]
async fn correct_password_issues_a_working_token() {
    let fixture = test_app();
    let token = authenticate(&fixture.app).await;

    let response = fixture
        .app
        .clone()
        .oneshot(get_with_token("/list?path=", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn listing_without_a_token_is_401() {
    let fixture = test_app();

    let request = axum::http::Request::builder()
        .uri("/list?path=")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_from_another_server_instance_is_rejected() {
    let first = test_app();
    let second = test_app();

    let foreign_token = authenticate(&first.app).await;

    let response = second
        .app
        .clone()
        .oneshot(get_with_token("/list?path=", &foreign_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn download_and_upload_require_a_token_too() {
    let fixture = test_app();

    for uri in ["/download?path=a.txt"] {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap();
        let response = fixture.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = fixture
        .app
        .clone()
        .oneshot(common::upload_request("bogus-token-value", "x.txt", b"x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let fixture = test_app();
    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
