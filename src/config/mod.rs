//! Configuration management for portscout.
//!
//! Provides XDG-compliant storage for application settings.

mod settings;

pub use settings::{AppSettings, Paths};
