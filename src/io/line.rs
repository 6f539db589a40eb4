//! Messaging platform client (LINE Messaging API)
//!
//! Owns the two platform-facing concerns the handlers delegate:
//! - inbound: `X-Line-Signature` verification (base64 HMAC-SHA256 over the
//!   raw request body, keyed by the channel secret) and event batch parsing
//! - outbound: correlated replies through the reply API, one per reply token

use crate::domain::types::{Event, ReplyToken, WebhookBatch};
use crate::infra::config::Config;
use crate::infra::error::{ParseError, ReplyError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound reply interface, one send per single-use token
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, reply_token: &ReplyToken, text: &str) -> Result<(), ReplyError>;
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    #[serde(rename = "replyToken")]
    reply_token: &'a str,
    messages: [ReplyMessage<'a>; 1],
}

#[derive(Serialize)]
struct ReplyMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

pub struct LineClient {
    channel_secret: String,
    access_token: String,
    api_base: String,
    http_client: reqwest::Client,
}

impl LineClient {
    pub fn new(config: &Config) -> Self {
        // Create HTTP client once for reuse (connection pooling)
        let http_client = reqwest::Client::builder()
            .timeout(REPLY_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            channel_secret: config.channel_secret().to_string(),
            access_token: config.access_token().to_string(),
            api_base: config.line_api_base().to_string(),
            http_client,
        }
    }

    /// Verify the signature header against the raw request body.
    ///
    /// The platform signs the body with HMAC-SHA256 keyed by the channel
    /// secret and sends the digest base64-encoded. Comparison is
    /// constant-time via `Mac::verify_slice`.
    pub fn verify_signature(&self, signature: &str, body: &[u8]) -> Result<(), ParseError> {
        let claimed = STANDARD.decode(signature).map_err(|_| ParseError::MalformedSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.channel_secret.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(body);
        mac.verify_slice(&claimed).map_err(|_| ParseError::SignatureMismatch)
    }

    /// Verify and deserialize an inbound event batch.
    ///
    /// Wire events the bot does not handle are dropped here, so callers only
    /// see beacon and text-message events.
    pub fn parse_batch(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<Vec<Event>, ParseError> {
        let signature = signature.ok_or(ParseError::MissingSignature)?;
        self.verify_signature(signature, body)?;

        let batch: WebhookBatch = serde_json::from_slice(body)?;
        let total = batch.events.len();

        let events: Vec<Event> = batch
            .events
            .into_iter()
            .filter_map(|wire| {
                let event_type = wire.event_type.clone();
                let event = wire.into_event();
                if event.is_none() {
                    debug!(event_type = %event_type, "unsupported_event_skipped");
                }
                event
            })
            .collect();

        debug!(total = %total, supported = %events.len(), "batch_parsed");
        Ok(events)
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn send_reply(&self, reply_token: &ReplyToken, text: &str) -> Result<(), ReplyError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let request = ReplyRequest {
            reply_token: reply_token.as_str(),
            messages: [ReplyMessage { kind: "text", text }],
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReplyError::Status(status));
        }

        debug!(status = %status.as_u16(), "reply_sent");
        Ok(())
    }
}
