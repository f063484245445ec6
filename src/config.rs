use dotenv::dotenv;
use rabbitmq::AckMode;
use std::env;
use thiserror::Error;
use tracing::info;

const RABBIT_URL: &str = "RABBIT_URL";
const APP_ID: &str = "APP_ID";
const JWT_SECRET: &str = "JWT_SECRET";
const DATABASE_URL: &str = "DATABASE_URL";
const DB_USER: &str = "DB_USER";
const DB_PASS: &str = "DB_PASS";
const DB_HOST: &str = "DB_HOST";
const DB_PORT: &str = "DB_PORT";
const DB_NAME: &str = "DB_NAME";
const USER_SERVICE_PORT: &str = "USER_SERVICE_PORT";
const VEHICLE_SERVICE_PORT: &str = "VEHICLE_SERVICE_PORT";
const FRONTEND_URL: &str = "FRONTEND_URL";
const USER_EVENTS_EXCHANGE: &str = "USER_EVENTS_EXCHANGE";
const VEHICLE_EVENTS_EXCHANGE: &str = "VEHICLE_EVENTS_EXCHANGE";
const CONSUMER_ACK_MODE: &str = "CONSUMER_ACK_MODE";
const CONSUMER_QUEUE: &str = "CONSUMER_QUEUE";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to load environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct Config {
    pub rabbit_url: String,
    pub app_id: String,
    pub jwt_secret: String,
    /// `None` when neither `DATABASE_URL` nor the `DB_*` parts are set
    pub database_url: Option<String>,
    pub user_service_port: u16,
    pub vehicle_service_port: u16,
    pub frontend_url: String,
    pub user_events_exchange: String,
    pub vehicle_events_exchange: String,
    pub consumer_ack_mode: AckMode,
    /// Durable queue to consume from instead of a private exclusive one
    pub consumer_queue: Option<String>,
}

// Secrets stay out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("app_id", &self.app_id)
            .field("database", &self.database_url.is_some())
            .field("user_service_port", &self.user_service_port)
            .field("vehicle_service_port", &self.vehicle_service_port)
            .field("frontend_url", &self.frontend_url)
            .field("user_events_exchange", &self.user_events_exchange)
            .field("vehicle_events_exchange", &self.vehicle_events_exchange)
            .field("consumer_ack_mode", &self.consumer_ack_mode)
            .field("consumer_queue", &self.consumer_queue)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn try_from_env() -> Result<Config, ConfigError> {
        // Load .env file
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let rabbit_url = required(RABBIT_URL)?;
        let jwt_secret = required(JWT_SECRET)?;

        let database_url = match var(DATABASE_URL) {
            Some(url) => Some(url),
            None => database_url_from_parts(&var)?,
        };

        let consumer_ack_mode = match var(CONSUMER_ACK_MODE) {
            Some(value) => value.parse::<AckMode>().map_err(|reason| ConfigError::Invalid {
                key: CONSUMER_ACK_MODE,
                value,
                reason,
            })?,
            None => AckMode::Manual,
        };

        let config = Config {
            rabbit_url,
            app_id: var(APP_ID).unwrap_or_else(|| "fleet-platform".to_string()),
            jwt_secret,
            database_url,
            user_service_port: port(&var, USER_SERVICE_PORT, 4000)?,
            vehicle_service_port: port(&var, VEHICLE_SERVICE_PORT, 5000)?,
            frontend_url: var(FRONTEND_URL)
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            user_events_exchange: var(USER_EVENTS_EXCHANGE)
                .unwrap_or_else(|| "user_events".to_string()),
            vehicle_events_exchange: var(VEHICLE_EVENTS_EXCHANGE)
                .unwrap_or_else(|| "vehicle_events".to_string()),
            consumer_ack_mode,
            consumer_queue: var(CONSUMER_QUEUE),
        };

        info!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Dead-letter exchange used by manual-ack consumers of `user_events`
    pub fn user_events_dead_letter(&self) -> String {
        format!("{}.dlx", self.user_events_exchange)
    }
}

fn port<F>(var: &F, key: &'static str, default: u16) -> Result<u16, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value.parse::<u16>().map_err(|err| ConfigError::Invalid {
            key,
            value,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn database_url_from_parts<F>(var: &F) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (Some(user), Some(host), Some(name)) = (var(DB_USER), var(DB_HOST), var(DB_NAME)) else {
        return Ok(None);
    };
    let db_port = port(var, DB_PORT, 5432)?;
    let credentials = match var(DB_PASS) {
        Some(pass) => format!("{user}:{pass}"),
        None => user,
    };
    Ok(Some(format!(
        "postgres://{credentials}@{host}:{db_port}/{name}"
    )))
}
