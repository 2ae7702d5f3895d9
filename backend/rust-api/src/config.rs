use serde::Deserialize;
use std::env;

/// Where quiz data lives. `Memory` keeps everything in-process (local development, tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Redis,
    Memory,
}

impl StorageMode {
    fn parse(value: &str) -> Result<Self, config::ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "redis" => Ok(StorageMode::Redis),
            "memory" => Ok(StorageMode::Memory),
            other => Err(config::ConfigError::Message(format!(
                "Unknown storage mode '{}', expected 'redis' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage_mode: StorageMode,
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    /// `username:password` protecting the metrics endpoint.
    pub metrics_auth: String,
    /// Freezes completed quizzes: no restart, no new answers, no second completion.
    pub strict_lifecycle: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let storage_mode = settings
            .get_string("storage.mode")
            .or_else(|_| env::var("STORAGE_MODE"))
            .map(|value| StorageMode::parse(&value))
            .unwrap_or(Ok(StorageMode::Redis))?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| {
                let host = env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string());
                match env::var("REDIS_PASSWORD") {
                    Ok(password) => format!("redis://:{}@{}:{}/0", password, host, port),
                    Err(_) => format!("redis://{}:{}/0", host, port),
                }
            });

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizdeck".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            Err(_) => {
                tracing::warn!("Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8081".to_string());

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        let strict_lifecycle = settings
            .get_bool("quiz.strict_lifecycle")
            .or_else(|_| {
                env::var("QUIZ_STRICT_LIFECYCLE")
                    .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            })
            .unwrap_or(false);

        Ok(Config {
            storage_mode,
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            bind_addr,
            metrics_auth,
            strict_lifecycle,
        })
    }

    /// Configuration for a process that keeps all data in memory.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Config {
            storage_mode: StorageMode::Memory,
            mongo_uri: String::new(),
            redis_uri: String::new(),
            mongo_database: "quizdeck".to_string(),
            jwt_secret: jwt_secret.into(),
            bind_addr: "127.0.0.1:0".to_string(),
            metrics_auth: "admin:changeme".to_string(),
            strict_lifecycle: false,
        }
    }
}
