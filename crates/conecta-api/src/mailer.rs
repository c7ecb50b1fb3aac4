//! Transactional email delivery.
//!
//! Handlers never wait on mail: `notify` renders the event and hands the
//! send to a background task. A failed send is logged and otherwise ignored,
//! so it can never undo the write that triggered it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use conecta_types::events::NotificationEvent;

use crate::templates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Posts to an HTTP transactional-mail API (Resend-compatible payload).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let body = SendRequest {
            from: &self.from,
            to: [&email.to],
            subject: &email.subject,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Email API returned {}: {}", status, text);
        }
        Ok(())
    }
}

/// Used when no API key is configured: the email only reaches the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email not sent (no email API key configured)");
        Ok(())
    }
}

/// Keeps every email in memory. For tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("Mailer lock poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }
}

/// Fire-and-forget delivery of `event` to `to`.
pub fn notify(mailer: Arc<dyn Mailer>, to: String, event: NotificationEvent) {
    let kind = event.kind();
    let email = templates::render(to, &event);

    tokio::spawn(async move {
        match mailer.send(&email).await {
            Ok(()) => debug!("Sent {} email to {}", kind, email.to),
            Err(e) => warn!("Failed to send {} email to {}: {:#}", kind, email.to, e),
        }
    });
}
