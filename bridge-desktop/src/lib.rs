//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux) and headless runs.
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `PlatformSessionHost` as an in-memory headless host
//! - `MethodTransport` as an in-process loopback
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HeadlessSessionHost, LoopbackTransport, SqliteSettingsStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = Arc::new(SqliteSettingsStore::in_memory().await.unwrap());
//!     let host = Arc::new(HeadlessSessionHost::new());
//!     let background = Arc::new(LoopbackTransport::new("background"));
//!
//!     // Hand to SessionBridge::builder()
//! }
//! ```

mod host;
mod settings;
mod transport;

pub use host::{HeadlessSessionHost, HostCounters};
pub use settings::SqliteSettingsStore;
pub use transport::LoopbackTransport;
