//! HMAC-SHA256 signatures used by the payment gateway.
//!
//! Two canonical strings are signed, both hex-encoded:
//! * Client return payload: `"{gateway_order_id}|{gateway_payment_id}"`, keyed with the API key secret.
//! * Webhook callbacks: the raw, unparsed request body, keyed with the webhook secret. Re-serialising a parsed body
//!   changes whitespace and key order, which invalidates the signature, so always verify the bytes as received.
use hmac::{Hmac, Mac};
use log::trace;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Calculates the hex-encoded HMAC-SHA256 of `data` under `secret`. Returns `None` when there is no secret to sign
/// with.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> Option<String> {
    if secret.is_empty() {
        trace!("🔐️ No signing secret configured. Nothing signed.");
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(data);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a hex-encoded signature in constant time.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        trace!("🔐️ No signing secret configured. Rejecting signature.");
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        trace!("🔐️ Signature is not valid hex");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(data);
    mac.verify_slice(&expected).is_ok()
}

pub fn client_payload(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

pub fn sign_client_payment(key_secret: &str, gateway_order_id: &str, gateway_payment_id: &str) -> Option<String> {
    calculate_hmac(key_secret, client_payload(gateway_order_id, gateway_payment_id).as_bytes())
}

pub fn verify_client_payment(key_secret: &str, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
    verify_hmac(key_secret, client_payload(gateway_order_id, gateway_payment_id).as_bytes(), signature)
}

pub fn sign_webhook(webhook_secret: &str, raw_body: &[u8]) -> Option<String> {
    calculate_hmac(webhook_secret, raw_body)
}

pub fn verify_webhook(webhook_secret: &str, raw_body: &[u8], signature: &str) -> bool {
    verify_hmac(webhook_secret, raw_body, signature)
}
