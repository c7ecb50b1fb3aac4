mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{ADMIN_EMAIL, TestApp};

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new().await;
    let ana = app.register("Ana@Example.com", "Ana", Some("mentor")).await;

    let (status, me) = app.get("/api/auth/me", &ana.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ana@example.com");
    assert_eq!(me["roles"], json!(["mentor"]));
    assert_eq!(me["completion"], 15);

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], ana.id.as_str());
    assert_eq!(body["name"], "Ana");

    let emails = app.emails_to("ana@example.com", 1).await;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Welcome to Conecta");
}

#[tokio::test]
async fn default_role_is_emprendedor() {
    let app = TestApp::new().await;
    let ben = app.register("ben@example.com", "Ben", None).await;
    let (_, me) = app.get("/api/auth/me", &ben.token).await;
    assert_eq!(me["roles"], json!(["emprendedor"]));
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestApp::new().await;
    app.register("ana@example.com", "Ana", None).await;

    let (status, body) = app
        .call(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({"email": "ANA@example.com", "password": "password123", "name": "Other"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn register_validation() {
    let app = TestApp::new().await;
    let cases = [
        json!({"email": "nope", "password": "password123", "name": "Ana"}),
        json!({"email": "ana@example.com", "password": "short", "name": "Ana"}),
        json!({"email": "ana@example.com", "password": "password123", "name": "  "}),
        json!({"email": "ana@example.com", "password": "password123", "name": "Ana", "role": "admin"}),
        json!({"email": "ana@example.com", "password": "password123", "name": "Ana", "role": "wizard"}),
    ];
    for body in cases {
        let (status, _) = app
            .call("POST", "/api/auth/register", None, Some(body.clone()))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "accepted {}", body);
    }
}

#[tokio::test]
async fn bad_credentials_share_one_message() {
    let app = TestApp::new().await;
    app.register("ana@example.com", "Ana", None).await;

    let (wrong_pw, wrong_body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "wrong-password"})),
        )
        .await;
    let (unknown, unknown_body) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ghost@example.com", "password": "password123"})),
        )
        .await;

    assert_eq!(wrong_pw, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.call("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = app.get("/api/auth/me", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("GET", "/api/roles", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bootstrap_admin_email_gets_admin_role() {
    let app = TestApp::new().await;
    let root = app.admin().await;

    let (_, me) = app.get("/api/auth/me", &root.token).await;
    assert_eq!(me["email"], ADMIN_EMAIL);
    assert_eq!(me["roles"], json!(["admin", "mentor"]));

    let (status, page) = app
        .get(
            &format!("/api/admin/audit-logs?user_id={}&role_id=1", root.id),
            &root.token,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["entries"][0]["reason"], "bootstrap admin email");
    assert_eq!(page["entries"][0]["performed_by"], root.id.as_str());
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::new().await;
    app.register("ana@example.com", "Ana", None).await;

    // Unknown emails look exactly the same from outside
    let (status, _) = app
        .call(
            "POST",
            "/api/auth/password-reset",
            None,
            Some(json!({"email": "ghost@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/password-reset",
            None,
            Some(json!({"email": "ana@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let emails = app.emails_to("ana@example.com", 2).await;
    let reset = emails
        .iter()
        .find(|e| e.subject.contains("Reset"))
        .expect("reset email");
    let start = reset.html.find("token=").unwrap() + "token=".len();
    let token: String = reset.html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    assert!(reset.html.contains("http://app.test/reset-password?token="));

    let confirm = json!({"token": token, "new_password": "brand-new-pass"});
    let (status, _) = app
        .call("POST", "/api/auth/password-reset/confirm", None, Some(confirm.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Tokens are single use
    let (status, _) = app
        .call("POST", "/api/auth/password-reset/confirm", None, Some(confirm))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (old, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "password123"})),
        )
        .await;
    assert_eq!(old, StatusCode::UNAUTHORIZED);

    let (new, _) = app
        .call(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({"email": "ana@example.com", "password": "brand-new-pass"})),
        )
        .await;
    assert_eq!(new, StatusCode::OK);
}

#[tokio::test]
async fn unknown_reset_token_is_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            "POST",
            "/api/auth/password-reset/confirm",
            None,
            Some(json!({"token": "made-up", "new_password": "password123"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired reset token");
}
