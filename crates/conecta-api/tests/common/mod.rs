#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use conecta_api::mailer::{Email, Mailer, MemoryMailer};
use conecta_api::storage::Storage;
use conecta_api::{AppConfig, AppStateInner, build_router};
use conecta_db::Database;

pub const ADMIN_EMAIL: &str = "root@example.com";
pub const PUBLIC_URL: &str = "http://conecta.test";

/// Transport that is always down.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: &Email) -> anyhow::Result<()> {
        anyhow::bail!("email API unreachable")
    }
}

pub struct TestApp {
    pub router: Router,
    /// Records sent email unless the app was built `with_mailer`.
    pub mailer: MemoryMailer,
    pub storage_dir: PathBuf,
}

pub struct TestUser {
    pub id: String,
    pub token: String,
    pub email: String,
}

impl TestApp {
    pub async fn new() -> Self {
        let mailer = MemoryMailer::new();
        Self::build(mailer.clone(), Arc::new(mailer)).await
    }

    pub async fn with_mailer(transport: Arc<dyn Mailer>) -> Self {
        Self::build(MemoryMailer::new(), transport).await
    }

    async fn build(mailer: MemoryMailer, transport: Arc<dyn Mailer>) -> Self {
        let storage_dir =
            std::env::temp_dir().join(format!("conecta-test-{}", uuid::Uuid::new_v4()));

        let vars: HashMap<&str, String> = HashMap::from([
            ("CONECTA_JWT_SECRET", "integration-secret".to_string()),
            ("CONECTA_ADMIN_EMAILS", ADMIN_EMAIL.to_string()),
            ("CONECTA_PUBLIC_URL", PUBLIC_URL.to_string()),
            ("CONECTA_FRONTEND_URL", "http://app.test".to_string()),
            (
                "CONECTA_STORAGE_DIR",
                storage_dir.to_string_lossy().into_owned(),
            ),
        ]);
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let db = Database::open_in_memory().unwrap();
        let storage = Storage::new(storage_dir.clone()).await.unwrap();

        let state = AppStateInner::new(db, config, transport, storage);
        Self {
            router: build_router(state),
            mailer,
            storage_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, Some(token), Some(body)).await
    }

    pub async fn register(&self, email: &str, name: &str, role: Option<&str>) -> TestUser {
        let mut body = serde_json::json!({
            "email": email,
            "password": "password123",
            "name": name,
        });
        if let Some(role) = role {
            body["role"] = Value::String(role.to_string());
        }

        let (status, body) = self
            .call("POST", "/api/auth/register", None, Some(body))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        TestUser {
            id: body["user_id"].as_str().unwrap().to_string(),
            token: body["token"].as_str().unwrap().to_string(),
            email: email.to_string(),
        }
    }

    pub async fn admin(&self) -> TestUser {
        self.register(ADMIN_EMAIL, "Root", Some("mentor")).await
    }

    /// Notifications are delivered on background tasks.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<Email> {
        for _ in 0..200 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.mailer.sent()
    }

    pub async fn emails_to(&self, to: &str, count: usize) -> Vec<Email> {
        for _ in 0..200 {
            let sent: Vec<Email> = self.mailer.sent().into_iter().filter(|e| e.to == to).collect();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.mailer.sent().into_iter().filter(|e| e.to == to).collect()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_dir);
    }
}
