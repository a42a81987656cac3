//! Lineup Client - HTTP API and Screen Data Hooks
//!
//! Binds the resource cache to the team API: a reqwest-backed
//! [`RemoteApi`], TOML configuration, tracing setup and [`TeamClient`], which
//! gives every screen its cached reads and invalidating writes.

pub mod api;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod team;

pub use api::{HttpApi, HttpMethod, RemoteApi};
pub use config::{ClientConfig, ConfigError, LogConfig, RetryConfig, CONFIG_ENV_VAR};
pub use error::{ClientError, ClientResult};
pub use telemetry::init_tracing;
pub use team::TeamClient;
