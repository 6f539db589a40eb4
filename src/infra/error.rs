//! Error taxonomy for webhook processing
//!
//! Fatal per-request: `ParseError` (unsigned/malformed batch) and
//! `StoreError` (persistence), both surfaced as 500. `NotifyError` and
//! `ReplyError` are logged and swallowed so later events in a batch still
//! get processed. `ConfigError` is fatal at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("invalid utc offset: {0}h")]
    InvalidOffset(i32),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("missing signature header")]
    MissingSignature,
    #[error("malformed signature encoding")]
    MalformedSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("malformed event batch: {0}")]
    Body(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("attendance log io: {0}")]
    Io(#[from] std::io::Error),
    #[error("attendance log encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("team channel post failed: {0}")]
    Send(#[from] reqwest::Error),
    #[error("team channel returned {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply send failed: {0}")]
    Send(#[from] reqwest::Error),
    #[error("reply endpoint returned {0}")]
    Status(reqwest::StatusCode),
}
