//! Process wiring for the order fulfillment backend.

pub mod config;
pub mod db;
pub mod seed;
pub mod telemetry;

pub use config::{Config, ConfigError, LogFormat};
