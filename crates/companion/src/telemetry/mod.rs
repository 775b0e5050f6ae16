//! Tracing setup: structured JSON logs, plus OTLP span export when configured.
//!
//! # Telemetry invariants
//!
//! - **No PII, codes, tokens or key material** in any span attribute or log
//!   field. Phone numbers, profile values and `Authorization` headers stay out
//!   of events.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`), overridden by
//!   `RUST_LOG`.

pub mod init;

pub use init::init_telemetry;
