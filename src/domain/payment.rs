use super::artifact::PaymentStatus;
use crate::error::{Result, StudioError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What a caller sends to open a checkout for an artifact.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub item_title: String,
    pub item_price: Decimal,
    pub back_url_success: String,
    #[serde(default)]
    pub notification_url: Option<String>,
    #[serde(default)]
    pub payer_email: Option<String>,
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.item_title.trim().is_empty() {
            return Err(StudioError::ValidationError(
                "itemTitle is required".to_string(),
            ));
        }
        if self.item_price <= Decimal::ZERO {
            return Err(StudioError::ValidationError(
                "itemPrice must be positive".to_string(),
            ));
        }
        if self.back_url_success.trim().is_empty() {
            return Err(StudioError::ValidationError(
                "backUrlSuccess is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A checkout session as the gateway client needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub item_id: String,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub currency: String,
    pub back_url: String,
    pub expires_at: OffsetDateTime,
    pub external_reference: String,
    pub notification_url: Option<String>,
    pub payer_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub checkout_url: Option<String>,
}

/// Status strings reported by the gateway for a single payment.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Pending,
    Approved,
    Authorized,
    InProcess,
    InMediation,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

impl GatewayStatus {
    /// The artifact status this gateway status settles to, if any.
    pub fn resolution(self) -> Option<PaymentStatus> {
        match self {
            Self::Approved => Some(PaymentStatus::Approved),
            Self::Rejected | Self::Cancelled => Some(PaymentStatus::Rejected),
            _ => None,
        }
    }
}

/// Payment details obtained from the authenticated gateway API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub id: String,
    pub status: GatewayStatus,
    pub payer_email: Option<String>,
    pub external_reference: Option<String>,
}

/// Payment-related view of an artifact.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub artifact_id: String,
    pub payment_id: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_email: Option<String>,
    pub external_reference: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct NotificationData {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
}

/// Body of a gateway webhook call. Every field is untrusted.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Notification {
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Option<NotificationData>,
}

impl Notification {
    /// Trailing segment of `resource`, which is either a bare id or a URL.
    pub fn resource_id(&self) -> Option<&str> {
        self.resource
            .as_deref()
            .and_then(|r| r.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
    }

    pub fn data_id(&self) -> Option<String> {
        match self.data.as_ref()?.id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A webhook call as received: the parsed body plus the authenticity inputs.
#[derive(Debug, Clone, Default)]
pub struct InboundNotification {
    /// `None` when the body was not valid JSON.
    pub body: Option<Notification>,
    pub signature: Option<String>,
    pub request_id: Option<String>,
    pub query_data_id: Option<String>,
}

/// How a webhook call was resolved. Every variant is a success for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Approved { artifact_id: String },
    Rejected { artifact_id: String },
    Duplicate { artifact_id: String, status: PaymentStatus },
    Acknowledged { reason: String },
}

impl NotificationOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Approved { .. } => "Payment processed".to_string(),
            Self::Rejected { .. } => "Payment rejected".to_string(),
            Self::Duplicate { status, .. } => format!("Payment already {}", status),
            Self::Acknowledged { reason } => reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> PaymentRequest {
        PaymentRequest {
            item_title: "shirt".to_string(),
            item_price: dec!(10),
            back_url_success: "https://shop.example/ok".to_string(),
            notification_url: None,
            payer_email: None,
        }
    }

    #[test]
    fn test_payment_request_validation() {
        assert!(request().validate().is_ok());

        let mut free = request();
        free.item_price = dec!(0);
        assert!(matches!(free.validate(), Err(StudioError::ValidationError(_))));

        let mut untitled = request();
        untitled.item_title = "  ".to_string();
        assert!(matches!(untitled.validate(), Err(StudioError::ValidationError(_))));
    }

    #[test]
    fn test_payment_request_accepts_numeric_price() {
        let json = r#"{"itemTitle":"shirt","itemPrice":10.5,"backUrlSuccess":"https://x"}"#;
        let parsed: PaymentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.item_price, dec!(10.5));
        assert!(parsed.notification_url.is_none());
    }

    #[test]
    fn test_gateway_status_resolution() {
        let parse = |s: &str| serde_json::from_value::<GatewayStatus>(serde_json::json!(s)).unwrap();
        assert_eq!(parse("approved").resolution(), Some(PaymentStatus::Approved));
        assert_eq!(parse("rejected").resolution(), Some(PaymentStatus::Rejected));
        assert_eq!(parse("cancelled").resolution(), Some(PaymentStatus::Rejected));
        assert_eq!(parse("in_process").resolution(), None);
        assert_eq!(parse("pending").resolution(), None);
        assert_eq!(parse("something_new"), GatewayStatus::Unknown);
    }

    #[test]
    fn test_notification_ids() {
        let body: Notification = serde_json::from_value(serde_json::json!({
            "topic": "payment",
            "resource": "https://api.mercadolibre.com/collections/notifications/123456",
            "data": { "id": 123456 }
        }))
        .unwrap();
        assert_eq!(body.resource_id(), Some("123456"));
        assert_eq!(body.data_id().as_deref(), Some("123456"));

        let bare: Notification =
            serde_json::from_value(serde_json::json!({ "topic": "payment", "resource": "987" }))
                .unwrap();
        assert_eq!(bare.resource_id(), Some("987"));
        assert!(bare.data_id().is_none());

        assert!(Notification::default().resource_id().is_none());
    }
}
