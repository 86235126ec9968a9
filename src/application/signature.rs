//! Webhook authenticity: HMAC-SHA256 over a manifest of the notification.
//!
//! The gateway sends `x-signature: ts=<ts>,v1=<hex digest>` and
//! `x-request-id`. The signed manifest is
//! `id:<data id>;request-id:<request id>;ts:<ts>;`, with a part left out when
//! its value is missing.

use crate::domain::payment::InboundNotification;
use crate::error::{Result, StudioError};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    ts: &'a str,
    v1: &'a str,
}

fn parse_header(header: &str) -> Option<SignatureHeader<'_>> {
    let mut ts = None;
    let mut v1 = None;
    for part in header.split(',') {
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "ts" => ts = Some(value.trim()),
            "v1" => v1 = Some(value.trim()),
            _ => {}
        }
    }
    Some(SignatureHeader { ts: ts?, v1: v1? })
}

/// Builds the string the gateway signs.
pub fn manifest(data_id: Option<&str>, request_id: Option<&str>, ts: &str) -> String {
    let mut manifest = String::new();
    if let Some(id) = data_id {
        // Alphanumeric ids are signed in lowercase.
        manifest.push_str(&format!("id:{};", id.to_ascii_lowercase()));
    }
    if let Some(request_id) = request_id {
        manifest.push_str(&format!("request-id:{};", request_id));
    }
    manifest.push_str(&format!("ts:{};", ts));
    manifest
}

fn keyed_mac(secret: &str, manifest: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StudioError::Misconfiguration(format!("webhook secret: {}", e)))?;
    mac.update(manifest.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `manifest` under `secret`.
pub fn sign(secret: &str, manifest: &str) -> Result<String> {
    Ok(hex::encode(keyed_mac(secret, manifest)?.finalize().into_bytes()))
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// The id the gateway signed: query `data.id`, then body `data.id`,
    /// then the tail of `resource`.
    fn signed_id(notification: &InboundNotification) -> Option<String> {
        notification.query_data_id.clone().or_else(|| {
            let body = notification.body.as_ref()?;
            body.data_id().or_else(|| body.resource_id().map(str::to_string))
        })
    }

    pub fn verify(&self, notification: &InboundNotification) -> Result<()> {
        let header = notification
            .signature
            .as_deref()
            .ok_or_else(|| StudioError::Forbidden("missing signature".to_string()))?;
        let parsed = parse_header(header)
            .ok_or_else(|| StudioError::Forbidden("malformed signature".to_string()))?;
        let expected = hex::decode(parsed.v1)
            .map_err(|_| StudioError::Forbidden("malformed signature".to_string()))?;

        let data_id = Self::signed_id(notification);
        let manifest = manifest(
            data_id.as_deref(),
            notification.request_id.as_deref(),
            parsed.ts,
        );

        keyed_mac(&self.secret, &manifest)?
            .verify_slice(&expected)
            .map_err(|_| StudioError::Forbidden("invalid signature".to_string()))
    }
}
