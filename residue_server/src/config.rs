use std::{env, net::IpAddr};

use gateway_tools::GatewayConfig;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use residue_common::{helpers::parse_boolean_flag, Secret};
use residue_engine::{db_url, engine_api::order_ledger_api::DEFAULT_CURRENCY};

use crate::errors::ServerError;

const DEFAULT_RSD_HOST: &str = "127.0.0.1";
const DEFAULT_RSD_PORT: u16 = 8460;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub auth: AuthConfig,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the `for=` field of the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    /// If supplied, requests against the payment webhook will be checked against this list of gateway IP addresses.
    pub webhook_whitelist: Option<Vec<IpAddr>>,
    /// ISO code for the currency all orders are priced in.
    pub currency: String,
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RSD_HOST.to_string(),
            port: DEFAULT_RSD_PORT,
            database_url: String::default(),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            auth: AuthConfig::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            webhook_whitelist: None,
            currency: DEFAULT_CURRENCY.to_string(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RSD_HOST").ok().unwrap_or_else(|| DEFAULT_RSD_HOST.into());
        let port = env::var("RSD_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for RSD_PORT. {e} Using the default, {DEFAULT_RSD_PORT}, instead."
                    );
                    DEFAULT_RSD_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_RSD_PORT);
        let database_url = db_url();
        let db_max_connections = env::var("RSD_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid value for RSD_DB_MAX_CONNECTIONS ({s}). {e}"))
                    .ok()
            })
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("RSD_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("RSD_USE_FORWARDED").ok(), false);
        let webhook_whitelist = configure_whitelist(env::var("RSD_WEBHOOK_IP_WHITELIST").ok());
        let currency = env::var("RSD_CURRENCY").ok().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            info!("🪛️ RSD_CURRENCY is not set. Using {DEFAULT_CURRENCY}.");
            DEFAULT_CURRENCY.to_string()
        });
        let gateway = GatewayConfig::new_from_env_or_default();
        Self {
            host,
            port,
            database_url,
            db_max_connections,
            auth,
            use_x_forwarded_for,
            use_forwarded,
            webhook_whitelist,
            currency,
            gateway,
        }
    }
}

fn configure_whitelist(value: Option<String>) -> Option<Vec<IpAddr>> {
    let whitelist = value.and_then(|s| {
        if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
            info!(
                "🪛️ Webhook IP whitelist is disabled. If this is not what you want, set RSD_WEBHOOK_IP_WHITELIST to a \
                 comma-separated list of IP addresses to enable it."
            );
            return None;
        }
        let ip_addrs = s
            .split(',')
            .filter_map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in RSD_WEBHOOK_IP_WHITELIST: {e}"))
                    .ok()
            })
            .collect::<Vec<IpAddr>>();
        Some(ip_addrs)
    });
    match &whitelist {
        Some(whitelist) if whitelist.is_empty() => {
            warn!(
                "🚨️ The webhook IP whitelist was configured, but is empty. The server will run, but won't accept any \
                 gateway callbacks."
            );
        },
        None => {
            info!("🪛️ No webhook IP whitelist is set. Only signature validation will be used.");
        },
        Some(v) => {
            let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
            info!("🪛️ Webhook IP whitelist: {addrs}");
        },
    }
    whitelist
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret that access tokens are verified against. Token issuance happens elsewhere, with the same
    /// secret.
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. No externally issued \
             token will be accepted. DO NOT operate on production like this. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("RSD_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [RSD_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "RSD_JWT_SECRET must be at least 32 characters long".to_string(),
            ));
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that request handlers may need. Generally we try to keep this as small as
/// possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub webhook_whitelist: Option<Vec<IpAddr>>,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            webhook_whitelist: config.webhook_whitelist.clone(),
        }
    }
}
