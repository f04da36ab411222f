//! WebPilot library
//!
//! Configuration, engine wiring and the command-line front end of the
//! plan / execute / verify loop.

pub mod app_context;
pub mod cli;
pub mod config;
pub mod metrics;

pub use app_context::{AppContext, AppOptions};
pub use config::{Config, ConfigError};
