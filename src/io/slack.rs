//! Team-channel notifier (Slack incoming webhook)
//!
//! Fire-and-forget status lines for the team channel. The payload rides the
//! legacy incoming-webhook format: a form-encoded `payload` field holding
//! `{"text": ..., "link_names": 1}`.

use crate::infra::config::Config;
use crate::infra::error::NotifyError;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound team-channel interface
#[async_trait]
pub trait TeamNotifier: Send + Sync {
    async fn post(&self, text: &str) -> Result<(), NotifyError>;
}

pub struct SlackNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(config: &Config) -> Self {
        let url = format!("{}{}", config.slack_base_url(), config.slack_webhook_path());

        // Create HTTP client once for reuse (connection pooling)
        let http_client = reqwest::Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { url, http_client }
    }

    /// link_names makes @mentions in the text resolve to real members
    fn payload(text: &str) -> String {
        json!({ "text": text, "link_names": 1 }).to_string()
    }
}

#[async_trait]
impl TeamNotifier for SlackNotifier {
    async fn post(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.url)
            .form(&[("payload", Self::payload(text))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }

        debug!(status = %status.as_u16(), chars = %text.chars().count(), "notification_posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = SlackNotifier::payload("おはよう！今日も１日頑張ろう！");
        let parsed: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["text"], "おはよう！今日も１日頑張ろう！");
        assert_eq!(parsed["link_names"], 1);
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let config =
            Config::default().with_credentials("s", "t", "/services/T000/B000/XXXX");
        let notifier = SlackNotifier::new(&config);
        assert_eq!(notifier.url, "https://hooks.slack.com/services/T000/B000/XXXX");
    }
}
