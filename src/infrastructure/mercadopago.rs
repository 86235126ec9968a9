use crate::domain::payment::{CheckoutSession, GatewayStatus, PaymentDetails, SessionRequest};
use crate::domain::ports::PaymentGateway;
use crate::error::{Result, StudioError};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    #[serde(default)]
    init_point: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Payer {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: serde_json::Value,
    status: GatewayStatus,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default)]
    payer: Option<Payer>,
}

impl From<PaymentResponse> for PaymentDetails {
    fn from(response: PaymentResponse) -> Self {
        let id = match response.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Self {
            id,
            status: response.status,
            payer_email: response.payer.and_then(|p| p.email).filter(|e| !e.is_empty()),
            external_reference: response.external_reference.filter(|r| !r.is_empty()),
        }
    }
}

/// Builds the checkout preference body sent to the gateway.
fn preference_body(request: &SessionRequest) -> Result<serde_json::Value> {
    let unit_price = request.unit_price.to_f64().ok_or_else(|| {
        StudioError::ValidationError(format!("price {} is not representable", request.unit_price))
    })?;
    let expires_at = request
        .expires_at
        .format(&Rfc3339)
        .map_err(|e| StudioError::internal(format!("expiry formatting failed: {}", e)))?;

    let mut body = serde_json::json!({
        "items": [{
            "id": request.item_id,
            "title": request.title,
            "quantity": request.quantity,
            "currency_id": request.currency,
            "unit_price": unit_price,
        }],
        "back_urls": {
            "success": request.back_url,
            "failure": request.back_url,
            "pending": request.back_url,
        },
        "auto_return": "approved",
        "expires": true,
        "expiration_date_to": expires_at,
        "external_reference": request.external_reference,
    });
    if let Some(url) = &request.notification_url {
        body["notification_url"] = serde_json::json!(url);
    }
    if let Some(email) = &request.payer_email {
        body["payer"] = serde_json::json!({ "email": email });
    }
    Ok(body)
}

type GatewayResponse = ureq::http::Response<ureq::Body>;

fn unavailable(err: ureq::Error) -> StudioError {
    StudioError::Unavailable {
        service: "payment gateway",
        message: err.to_string(),
    }
}

/// Client for the Mercado Pago REST API.
#[derive(Clone)]
pub struct MercadoPagoClient {
    agent: ureq::Agent,
    base_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Runs a request on the blocking pool and decodes a 2xx JSON response.
    async fn call<T, F>(&self, send: F) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(&ureq::Agent, &str) -> std::result::Result<GatewayResponse, ureq::Error>
            + Send
            + 'static,
    {
        let agent = self.agent.clone();
        let authorization = format!("Bearer {}", self.access_token);

        tokio::task::spawn_blocking(move || {
            let mut response = send(&agent, &authorization).map_err(unavailable)?;
            let status = response.status().as_u16();
            if !(200..300).contains(&status) {
                let text = response.body_mut().read_to_string().unwrap_or_default();
                return Err(StudioError::GatewayError(format!("{}: {}", status, text)));
            }
            response.body_mut().read_json::<T>().map_err(|e| {
                StudioError::GatewayError(format!("unreadable gateway response: {}", e))
            })
        })
        .await?
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_session(&self, request: SessionRequest) -> Result<CheckoutSession> {
        let body = preference_body(&request)?;
        let url = self.url("checkout/preferences");

        let preference: PreferenceResponse = self
            .call(move |agent, authorization| {
                agent
                    .post(&url)
                    .header("Authorization", authorization)
                    .send_json(&body)
            })
            .await
            .inspect_err(|e| {
                warn!(
                    external_reference = %request.external_reference,
                    error = %e,
                    "checkout session failed"
                )
            })?;

        debug!(
            session_id = %preference.id,
            external_reference = %request.external_reference,
            "checkout session created"
        );
        Ok(CheckoutSession {
            id: preference.id,
            checkout_url: preference.init_point,
        })
    }

    async fn payment_details(&self, payment_id: &str) -> Result<PaymentDetails> {
        let url = self.url(&format!("v1/payments/{}", payment_id));
        let payment: PaymentResponse = self
            .call(move |agent, authorization| {
                agent.get(&url).header("Authorization", authorization).call()
            })
            .await?;
        Ok(payment.into())
    }
}
