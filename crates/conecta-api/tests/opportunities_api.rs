mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};

use common::{FailingMailer, TestApp, TestUser};

async fn create(app: &TestApp, creator: &TestUser, title: &str) -> Value {
    let (status, body) = app
        .post(
            "/api/opportunities",
            &creator.token,
            json!({
                "title": title,
                "description": "Looking for collaborators",
                "skills": ["Design", "design", " Video "],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn create_normalizes_and_lists() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com", "Ana", Some("mentor")).await;

    let opp = create(&app, &ana, "Mural").await;
    assert_eq!(opp["status"], "open");
    assert_eq!(opp["skills"], json!(["Design", "Video"]));
    assert_eq!(opp["creator_id"], ana.id.as_str());

    let (status, list) = app.get("/api/opportunities?skill=video", &ana.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, _) = app
        .post("/api/opportunities", &ana.token, json!({"title": "   "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_creator_updates_and_deletes() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com", "Ana", None).await;
    let ben = app.register("ben@example.com", "Ben", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let uri = format!("/api/opportunities/{}", opp["id"].as_str().unwrap());

    let (status, _) = app
        .call("PUT", &uri, Some(&ben.token), Some(json!({"title": "Mine now"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &uri, Some(&ben.token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            "PUT",
            &uri,
            Some(&ana.token),
            Some(json!({"title": "Big mural", "status": "closed"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Big mural");
    assert_eq!(body["status"], "closed");
    assert_eq!(body["description"], "Looking for collaborators");

    let (_, open) = app.get("/api/opportunities?status=open", &ben.token).await;
    assert!(open.as_array().unwrap().is_empty());

    let (status, _) = app.call("DELETE", &uri, Some(&ana.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, &ana.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_can_manage_any_opportunity() {
    let app = TestApp::new().await;
    let root = app.admin().await;
    let ana = app.register("ana@example.com", "Ana", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let uri = format!("/api/opportunities/{}", opp["id"].as_str().unwrap());

    let (status, _) = app
        .call("PUT", &uri, Some(&root.token), Some(json!({"status": "closed"})))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn interest_rules() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com", "Ana", None).await;
    let ben = app.register("ben@example.com", "Ben", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let id = opp["id"].as_str().unwrap();
    let interests = format!("/api/opportunities/{}/interests", id);

    let (status, body) = app.post(&interests, &ana.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot express interest in your own opportunity");

    let (status, _) = app
        .post(&interests, &ben.token, json!({"message": "I paint"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&interests, &ben.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.call(
        "PUT",
        &format!("/api/opportunities/{}", id),
        Some(&ana.token),
        Some(json!({"status": "closed"})),
    )
    .await;
    let cat = app.register("cat@example.com", "Cat", None).await;
    let (status, body) = app.post(&interests, &cat.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "This opportunity is closed");

    let (status, _) = app
        .post(
            &format!("/api/opportunities/{}/interests", uuid::Uuid::new_v4()),
            &cat.token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_flow_notifies_both_sides() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com", "Ana", None).await;
    let ben = app.register("ben@example.com", "Ben", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let interests = format!("/api/opportunities/{}/interests", opp["id"].as_str().unwrap());

    let (_, interest) = app
        .post(&interests, &ben.token, json!({"message": "I paint walls"}))
        .await;
    assert_eq!(interest["status"], "pending");
    let interest_id = interest["id"].as_str().unwrap();

    let to_ana = app.emails_to("ana@example.com", 2).await;
    let received = to_ana
        .iter()
        .find(|e| e.subject == "New interest in \"Mural\"")
        .expect("creator notified");
    assert!(received.html.contains("Ben"));
    assert!(received.html.contains("I paint walls"));

    // Only the creator sees the list
    let (status, _) = app.get(&interests, &ben.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, list) = app.get(&interests, &ana.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let accept = format!("/api/interests/{}/accept", interest_id);
    let (status, _) = app.post(&accept, &ben.token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&accept, &ana.token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");

    let (status, _) = app
        .post(&format!("/api/interests/{}/reject", interest_id), &ana.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let to_ben = app.emails_to("ben@example.com", 2).await;
    assert!(
        to_ben
            .iter()
            .any(|e| e.subject == "Your interest in \"Mural\" was accepted")
    );

    let (_, mine) = app.get("/api/interests/mine", &ben.token).await;
    assert_eq!(mine[0]["status"], "accepted");
}

#[tokio::test]
async fn withdraw_then_express_again() {
    let app = TestApp::new().await;
    let ana = app.register("ana@example.com", "Ana", None).await;
    let ben = app.register("ben@example.com", "Ben", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let interests = format!("/api/opportunities/{}/interests", opp["id"].as_str().unwrap());
    let (_, interest) = app.post(&interests, &ben.token, json!({})).await;
    let withdraw = format!("/api/interests/{}/withdraw", interest["id"].as_str().unwrap());

    let (status, _) = app.post(&withdraw, &ana.token, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&withdraw, &ben.token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "withdrawn");

    let (status, _) = app.post(&withdraw, &ben.token, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, again) = app
        .post(&interests, &ben.token, json!({"message": "Back in"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(again["id"], interest["id"]);
    assert_eq!(again["status"], "pending");
    assert_eq!(again["message"], "Back in");
}

#[tokio::test]
async fn interest_survives_a_failed_email() {
    let app = TestApp::with_mailer(Arc::new(FailingMailer)).await;
    let ana = app.register("ana@example.com", "Ana", None).await;
    let ben = app.register("ben@example.com", "Ben", None).await;

    let opp = create(&app, &ana, "Mural").await;
    let interests = format!("/api/opportunities/{}/interests", opp["id"].as_str().unwrap());

    let (status, interest) = app
        .post(&interests, &ben.token, json!({"message": "I paint"}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", interest);

    // Let the background send fail before looking again
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let (status, list) = app.get(&interests, &ana.token).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], interest["id"]);
    assert_eq!(list[0]["status"], "pending");
}
