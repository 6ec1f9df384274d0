use config::{ConfigError, Environment, File};
use economy_core::EconomyConfig;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub nats: NatsConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub enable_cors: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub topic_prefix: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = config::Config::builder()
            // Start with default configuration
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", 4)?
            .set_default("server.enable_cors", true)?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("database.run_migrations", true)?
            .set_default("nats.url", "nats://127.0.0.1:4222")?
            .set_default("nats.topic_prefix", "taru")?
            .set_default("nats.enabled", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?;

        // Add environment-specific config file if it exists
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(File::with_name(&config_file).required(false));
        } else {
            builder = builder.add_source(
                File::with_name(&format!("config/{}", environment)).required(false),
            );
        }

        // Override with environment variables
        builder = builder.add_source(
            Environment::with_prefix("FORUM_GATEWAY")
                .separator("__")
                .try_parsing(true),
        );

        // Special handling for common env vars
        if let Ok(db_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", db_url)?;
        }

        if let Ok(nats_url) = env::var("NATS_URL") {
            builder = builder
                .set_override("nats.url", nats_url)?
                .set_override("nats.enabled", true)?;
        }

        if let Ok(port) = env::var("SERVER_PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port cannot be 0".to_string());
        }

        if self.server.workers == 0 {
            return Err("At least one worker is required".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL is required".to_string());
        }

        if self.database.max_connections < self.database.min_connections {
            return Err("database.max_connections is below database.min_connections".to_string());
        }

        if self.nats.enabled && self.nats.url.is_empty() {
            return Err("NATS URL is required when NATS is enabled".to_string());
        }

        self.economy.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 8080,
                workers: 2,
                enable_cors: false,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/taru".into(),
                max_connections: 10,
                min_connections: 2,
                acquire_timeout_secs: 5,
                run_migrations: false,
            },
            nats: NatsConfig {
                url: String::new(),
                topic_prefix: "taru".into(),
                enabled: false,
            },
            logging: LoggingConfig {
                level: "info".into(),
                json: false,
            },
            economy: EconomyConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_missing_database_url() {
        let mut config = sample();
        config.database.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nats_url_required_when_enabled() {
        let mut config = sample();
        config.nats.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_economy_settings_validated() {
        let mut config = sample();
        config.economy.tip_max = 0;
        assert!(config.validate().unwrap_err().contains("tip_max"));
    }
}
