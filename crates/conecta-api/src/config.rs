use std::path::PathBuf;

use anyhow::{Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// Lower-cased. Accounts registering with one of these become admins.
    pub admin_emails: Vec<String>,
    pub email_api_key: Option<String>,
    pub email_api_url: String,
    pub email_from: String,
    /// Base for public object URLs, e.g. `https://api.example.org`.
    pub public_url: String,
    /// Base for links in emails, e.g. the password reset page.
    pub frontend_url: String,
    pub storage_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process
    /// environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = lookup("CONECTA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CONECTA_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = var("CONECTA_PORT", "3000").parse()?;

        Ok(Self {
            host: var("CONECTA_HOST", "0.0.0.0"),
            port,
            db_path: var("CONECTA_DB_PATH", "conecta.db").into(),
            jwt_secret,
            admin_emails: parse_email_list(&var("CONECTA_ADMIN_EMAILS", "")),
            email_api_key: lookup("CONECTA_EMAIL_API_KEY").filter(|k| !k.trim().is_empty()),
            email_api_url: var("CONECTA_EMAIL_API_URL", DEFAULT_EMAIL_API_URL),
            email_from: var("CONECTA_EMAIL_FROM", "Conecta <no-reply@conecta.local>"),
            public_url: var("CONECTA_PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            frontend_url: var("CONECTA_FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            storage_dir: var("CONECTA_STORAGE_DIR", "./storage").into(),
        })
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|e| e == email)
    }
}

fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn placeholder_secret_is_rejected() {
        assert!(config(&[]).is_err());
        assert!(config(&[("CONECTA_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn defaults_and_admin_list() {
        let cfg = config(&[
            ("CONECTA_JWT_SECRET", "s3cret"),
            ("CONECTA_ADMIN_EMAILS", " Root@Example.com, ,ops@example.com"),
            ("CONECTA_PUBLIC_URL", "https://api.example.org/"),
        ])
        .unwrap();

        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.admin_emails, vec!["root@example.com", "ops@example.com"]);
        assert!(cfg.is_admin_email("root@example.com"));
        assert_eq!(cfg.public_url, "https://api.example.org");
        assert!(cfg.email_api_key.is_none());
        assert_eq!(cfg.email_api_url, DEFAULT_EMAIL_API_URL);
    }
}
