//! Nagwatch - Core engine for a webcam-driven productivity nag widget
//!
//! Nagwatch turns face and hand landmark streams plus user activity into discrete
//! widget events: landmark geometry → signal debouncing → punishment state → work timer
//! and KPI milestones.
//!
//! ## Modules
//!
//! - **Detectors**: eye/mouth aspect ratios and the wave classifier over landmark frames
//! - **Session**: punishment reasons, idle clock, work timer and milestone unlocks
//! - **Persistence**: lenient progress snapshots the host stores between page loads

pub mod activity;
pub mod capture;
pub mod config;
pub mod debounce;
pub mod error;
pub mod geometry;
pub mod input;
pub mod milestone;
pub mod progress;
pub mod punishment;
pub mod session;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::NagConfig;
pub use error::NagError;
pub use session::NagSession;

// Input schema exports
pub use input::{InputReader, SessionInput, INPUT_SCHEMA_VERSION};

// Event exports
pub use types::{CameraStatus, EventRecord, NagEvent, PunishmentReason, WorkStatus};

/// Nagwatch version reported by the CLI and the C ABI
pub const NAGWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name stamped on replay output
pub const PRODUCER_NAME: &str = "nagwatch";
