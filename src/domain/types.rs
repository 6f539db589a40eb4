//! Shared types for the attendance webhook

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Kind of attendance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Arrival,
    Departure,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Arrival => "arrival",
            RecordKind::Departure => "departure",
        }
    }
}

/// A single attendance entry. Append-only: records are never updated or
/// deleted, only counted over time ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub kind: RecordKind,
    /// Local business time (fixed offset)
    pub at: DateTime<FixedOffset>,
}

impl AttendanceRecord {
    pub fn new(kind: RecordKind, at: DateTime<FixedOffset>) -> Self {
        Self { kind, at }
    }
}

/// Newtype wrapper for single-use reply tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyToken(pub String);

impl ReplyToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReplyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Beacon proximity event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconKind {
    Enter,
    Leave,
    /// Banner/stay and any future beacon types the platform adds
    Other,
}

impl std::str::FromStr for BeaconKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "enter" => BeaconKind::Enter,
            "leave" => BeaconKind::Leave,
            _ => BeaconKind::Other,
        })
    }
}

impl BeaconKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeaconKind::Enter => "enter",
            BeaconKind::Leave => "leave",
            BeaconKind::Other => "other",
        }
    }
}

/// Inbound event after wire parsing, dispatched with exhaustive matching
#[derive(Debug, Clone)]
pub enum Event {
    Beacon { reply_token: ReplyToken, kind: BeaconKind },
    Text { reply_token: ReplyToken, text: String },
}

impl Event {
    pub fn reply_token(&self) -> &ReplyToken {
        match self {
            Event::Beacon { reply_token, .. } => reply_token,
            Event::Text { reply_token, .. } => reply_token,
        }
    }
}

/// Top-level webhook request body from the messaging platform
#[derive(Debug, Deserialize)]
pub struct WebhookBatch {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

/// One event as it appears on the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub beacon: Option<WireBeacon>,
    #[serde(default)]
    pub message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WireBeacon {
    #[serde(rename = "type")]
    pub beacon_type: String,
    #[serde(default)]
    pub hwid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl WireEvent {
    /// Convert a wire event into a domain event.
    ///
    /// Returns `None` for event types the bot does not handle (follow,
    /// postback, non-text messages, ...), which are skipped by the caller.
    pub fn into_event(self) -> Option<Event> {
        let reply_token = ReplyToken(self.reply_token?);

        match self.event_type.as_str() {
            "beacon" => {
                let beacon = self.beacon?;
                let kind = beacon.beacon_type.parse().unwrap_or(BeaconKind::Other);
                Some(Event::Beacon { reply_token, kind })
            }
            "message" => {
                let message = self.message?;
                if message.message_type != "text" {
                    return None;
                }
                Some(Event::Text { reply_token, text: message.text? })
            }
            _ => None,
        }
    }
}
