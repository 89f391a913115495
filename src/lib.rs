//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-session`, `core-runtime`). Host applications can
//! depend on `session-bridge-workspace` and enable `desktop-shims` to get a
//! bridge that runs without a platform media session.

#[cfg(feature = "desktop-shims")]
pub use core_session;
