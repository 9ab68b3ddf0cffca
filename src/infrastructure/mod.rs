//! Infrastructure layer providing external service integrations.
//!
//! Backends that speak to the outside world (or pretend to), configuration
//! loading, log file setup and clipboard access.

pub mod clipboard;
pub mod config;
pub mod http;
pub mod logging;
pub mod simulated;

pub use config::{Config, ConfigError};
pub use http::HttpBackend;
pub use logging::init_tracing;
pub use simulated::SimulatedBackend;
