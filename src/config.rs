//! Process configuration, read once at startup and passed explicitly.

use crate::error::{Result, StudioError};
use crate::infrastructure::smtp::SmtpSettings;
use clap::Parser;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seed shared by every provider call unless overridden.
pub const DEFAULT_SEED: u64 = 429_431_294;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP API listens on.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "STABILITY_API_URL", default_value = "https://api.stability.ai")]
    pub provider_url: String,

    #[arg(long, env = "STABILITY_API_KEY", hide_env_values = true)]
    pub provider_api_key: String,

    #[arg(long, env = "MERCADOPAGO_API_URL", default_value = "https://api.mercadopago.com")]
    pub gateway_url: String,

    #[arg(long, env = "MERCADOPAGO_API_KEY", hide_env_values = true)]
    pub gateway_access_token: String,

    /// Shared secret used to verify webhook signatures.
    #[arg(long, env = "MERCADOPAGO_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Default notification URL handed to the gateway for new sessions.
    #[arg(long, env = "NOTIFICATION_URL")]
    pub notification_url: Option<String>,

    #[arg(long, env = "PAYMENT_CURRENCY", default_value = "BRL")]
    pub currency: String,

    /// Minutes before an unpaid checkout session expires.
    #[arg(long, env = "SESSION_EXPIRY_MINUTES", default_value_t = 30)]
    pub session_expiry_minutes: i64,

    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: String,

    #[arg(long, env = "SMTP_PORT", default_value_t = 465)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender mailbox for fulfillment mail, e.g. `Shop <shop@example.com>`.
    #[arg(long, env = "SMTP_SENDER")]
    pub smtp_sender: String,

    /// Talk plain SMTP without TLS (local relays only).
    #[arg(long, env = "SMTP_INSECURE", default_value_t = false)]
    pub smtp_insecure: bool,

    /// Garment mockup used as the inpaint base.
    #[arg(long, env = "GARMENT_IMAGE_PATH")]
    pub garment_image: PathBuf,

    /// Mask selecting the print area of the garment.
    #[arg(long, env = "GARMENT_MASK_PATH")]
    pub garment_mask: PathBuf,

    /// Mask selecting everything except the print area.
    #[arg(long, env = "GARMENT_INVERTED_MASK_PATH")]
    pub inverted_mask: PathBuf,

    #[arg(long, env = "GENERATION_SEED", default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Timeout for every outbound provider or gateway call.
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 60)]
    pub http_timeout_secs: u64,
}

impl Config {
    /// Rejects settings that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("STABILITY_API_KEY", &self.provider_api_key),
            ("MERCADOPAGO_API_KEY", &self.gateway_access_token),
            ("MERCADOPAGO_WEBHOOK_SECRET", &self.webhook_secret),
            ("SMTP_HOST", &self.smtp_host),
            ("SMTP_SENDER", &self.smtp_sender),
            ("PAYMENT_CURRENCY", &self.currency),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(StudioError::Misconfiguration(format!("{} is empty", name)));
            }
        }
        if self.session_expiry_minutes <= 0 {
            return Err(StudioError::Misconfiguration(
                "SESSION_EXPIRY_MINUTES must be positive".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(StudioError::Misconfiguration(
                "HTTP_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn smtp(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username: self.smtp_username.clone(),
            password: self.smtp_password.clone(),
            sender: self.smtp_sender.clone(),
            insecure: self.smtp_insecure,
        }
    }
}

/// Fixed image inputs of the pipelines, loaded once.
#[derive(Debug, Clone, PartialEq)]
pub struct Assets {
    pub garment_image: Vec<u8>,
    pub garment_mask: Vec<u8>,
    pub inverted_mask: Vec<u8>,
}

impl Assets {
    pub fn load(config: &Config) -> Result<Self> {
        Ok(Self {
            garment_image: read_asset("garment image", &config.garment_image)?,
            garment_mask: read_asset("garment mask", &config.garment_mask)?,
            inverted_mask: read_asset("inverted mask", &config.inverted_mask)?,
        })
    }
}

fn read_asset(label: &str, path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).map_err(|e| {
        StudioError::Misconfiguration(format!("cannot read {} at {}: {}", label, path.display(), e))
    })?;
    if bytes.is_empty() {
        return Err(StudioError::Misconfiguration(format!(
            "{} at {} is empty",
            label,
            path.display()
        )));
    }
    Ok(bytes)
}
