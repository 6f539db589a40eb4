//! Domain models - events, records, and reply tokens
//!
//! This module contains the canonical data types used throughout the system:
//! - `AttendanceRecord` - the persisted arrival/departure entry
//! - `Event` - inbound platform event (beacon or text message)
//! - `BeaconKind` - enter/leave classification of beacon signals
//! - Wire structs for the platform's webhook payload

pub mod types;

// Re-export commonly used types at module level
pub use types::{AttendanceRecord, BeaconKind, Event, RecordKind, ReplyToken};
