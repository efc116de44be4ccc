use std::time::Duration;

use log::*;
use residue_common::Secret;

const DEFAULT_GATEWAY_URL: &str = "https://api.razorpay.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API, without a trailing slash.
    pub base_url: String,
    pub key_id: String,
    /// Used for basic auth on outbound calls, and as the HMAC key for client-return signatures.
    pub key_secret: Secret<String>,
    /// HMAC key for webhook callbacks. Configured separately on the gateway dashboard.
    pub webhook_secret: Secret<String>,
    /// Upper bound on any single outbound call.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            key_id: String::default(),
            key_secret: Secret::default(),
            webhook_secret: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("RSD_GATEWAY_URL").unwrap_or_else(|_| {
            info!("🪛️ RSD_GATEWAY_URL not set, using {DEFAULT_GATEWAY_URL}");
            DEFAULT_GATEWAY_URL.to_string()
        });
        let base_url = base_url.trim_end_matches('/').to_string();
        let key_id = std::env::var("RSD_GATEWAY_KEY_ID").unwrap_or_else(|_| {
            warn!("🪛️ RSD_GATEWAY_KEY_ID not set. Payment intents cannot be created.");
            String::default()
        });
        let key_secret = Secret::new(std::env::var("RSD_GATEWAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ RSD_GATEWAY_KEY_SECRET not set. Client payment signatures will never verify.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("RSD_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ RSD_GATEWAY_WEBHOOK_SECRET not set. Webhook signatures will never verify.");
            String::default()
        }));
        let timeout = std::env::var("RSD_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ Invalid value for RSD_GATEWAY_TIMEOUT_SECS ({s}). {e}"))
                    .ok()
            })
            .filter(|&secs| secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self { base_url, key_id, key_secret, webhook_secret, timeout: Duration::from_secs(timeout) }
    }
}
