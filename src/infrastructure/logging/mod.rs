//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output on stderr
//! - Rolling JSON log files
//! - Secret redaction for tool output
//! - JSON-lines approval audit trail

pub mod audit;
pub mod config;
pub mod logger;
pub mod secret_scrubbing;

pub use audit::JsonlAuditSink;
pub use config::{LogConfig, LogFormat, RotationPolicy};
pub use logger::LoggerImpl;
pub use secret_scrubbing::SecretScrubber;
