use crate::auth::nonce::MAX_NONCE_TTL;
use crate::wallet::AppIdentity;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Where nonce records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("unknown backend: {}", s)),
        }
    }
}

/// Static fields of every sign-in message, plus the flow's time bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInConfig {
    pub domain: String,
    pub statement: String,
    pub uri: String,
    pub chain_id: String,
    pub app_identity: AppIdentity,
    pub nonce_ttl: Duration,
    pub wallet_timeout: Duration,
}

#[derive(Clone)]
pub struct Config {
    // Server
    pub bind_addr: SocketAddr,
    pub allowed_origins: Vec<String>,

    // Storage
    pub store_backend: StoreBackend,
    pub redis_url: Option<String>,

    // Sign-in
    pub sign_in: SignInConfig,

    // Maintenance
    pub sweep_interval: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("allowed_origins", &self.allowed_origins)
            .field("store_backend", &self.store_backend)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("sign_in", &self.sign_in)
            .field("sweep_interval", &self.sweep_interval)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Storage
        let store_backend: StoreBackend = parse_env_or_default("STORE_BACKEND", StoreBackend::Redis)?;
        let redis_url = match store_backend {
            // Required to prevent silently falling back to a non-persistent store
            StoreBackend::Redis => Some(
                env::var("REDIS_URL")
                    .map_err(|_| ConfigError::MissingVar("REDIS_URL".to_string()))?,
            ),
            StoreBackend::Memory => None,
        };

        // Sign-in message fields
        let domain = message_field("SIGNIN_DOMAIN", "bits.app")?;
        let statement = message_field("SIGNIN_STATEMENT", "Sign in to Bits")?;
        let uri = message_field("SIGNIN_URI", "https://bits.app")?;
        if !uri.contains("://") {
            return Err(ConfigError::InvalidValue(
                "SIGNIN_URI".to_string(),
                "must be an absolute URI".to_string(),
            ));
        }
        let chain_id = message_field("CHAIN_ID", "solana:devnet")?;

        // Wallet app identity
        let app_identity = AppIdentity {
            name: message_field("APP_NAME", "Bits")?,
            uri: uri.clone(),
            icon: message_field("APP_ICON", "favicon.ico")?,
        };

        // TTLs and timeouts (in seconds)
        let nonce_ttl_secs: u64 = parse_env_or_default("NONCE_TTL_SECS", 300)?;
        if nonce_ttl_secs == 0 || nonce_ttl_secs > MAX_NONCE_TTL.as_secs() {
            return Err(ConfigError::InvalidValue(
                "NONCE_TTL_SECS".to_string(),
                format!("must be between 1 and {}", MAX_NONCE_TTL.as_secs()),
            ));
        }
        let wallet_timeout_secs: u64 = parse_env_or_default("WALLET_TIMEOUT_SECS", 120)?;
        let sweep_interval_secs: u64 = parse_env_or_default("SWEEP_INTERVAL_SECS", 60)?;
        if sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "SWEEP_INTERVAL_SECS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Config {
            bind_addr,
            allowed_origins,
            store_backend,
            redis_url,
            sign_in: SignInConfig {
                domain,
                statement,
                uri,
                chain_id,
                app_identity,
                nonce_ttl: Duration::from_secs(nonce_ttl_secs),
                wallet_timeout: Duration::from_secs(wallet_timeout_secs),
            },
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

/// Read a single-line text setting that ends up in the signed message.
fn message_field(key: &str, default: &str) -> Result<String, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "cannot be empty".to_string(),
        ));
    }
    if value.contains(['\n', '\r']) {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a single line".to_string(),
        ));
    }
    Ok(value)
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}
