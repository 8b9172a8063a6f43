//! Outbound transactional email.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServerError>;
}

/// Client for Resend-style `POST /emails` APIs.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServerError::Internal(format!("Failed to build email client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), ServerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| ServerError::Upstream(format!("email request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ServerError::Upstream(format!(
                "email API returned {status}: {body}"
            )));
        }

        info!(to = ?email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}
