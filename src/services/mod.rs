//! Services - business logic
//!
//! This module contains the core business logic:
//! - `attendance` - Attendance decision engine (persist, count, notify)

pub mod attendance;

// Re-export commonly used types
pub use attendance::AttendanceService;
