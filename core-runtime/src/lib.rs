//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the session bridge:
//! - Logging and tracing infrastructure
//! - Session configuration and its persistence
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the session core depends on.
//! It establishes the logging conventions, the configuration contract shared
//! by the UI and background contexts, and the broadcast mechanism the bridge
//! uses to relay platform state to observers.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use events::{EventBus, EventStream, LifecycleEvent, SessionEvent};
