//! Edge daemon: polls a single inverter over Modbus/TCP, normalizes
//! readings into [`telemetry_common::Sample`]s, durably spools them, and
//! batch-forwards them to the telemetry server over authenticated HTTPS.
//!
//! ## Architecture
//!
//! - `config`: environment-driven configuration, fails fast.
//! - `registers`: the declarative Modbus register map.
//! - `modbus_client`: connects, reads groups, reconnects with backoff.
//! - `normalizer`: pure raw-words-to-`Sample` transform.
//! - `spool`: durable FIFO over an embedded SQLite database.
//! - `uploader`: drains the spool in batches, posts to the server.
//! - `supervisor`: the two concurrent loops, graceful shutdown, heartbeat.

pub mod config;
pub mod error;
pub mod modbus_client;
pub mod normalizer;
pub mod registers;
pub mod spool;
pub mod supervisor;
pub mod uploader;

pub use config::EdgeConfig;
pub use error::{EdgeError, Result};
