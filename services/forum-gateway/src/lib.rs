pub mod config;
pub mod errors;
pub mod models;
pub mod handlers;
pub mod services;
pub mod database;
pub mod nats;
pub mod metrics;
pub mod security_middleware;

pub use config::Config;
pub use errors::{GatewayError, Result};
