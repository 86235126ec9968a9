use super::fulfillment::FulfillmentDispatcher;
use super::signature::WebhookVerifier;
use crate::domain::artifact::{Artifact, PaymentStatus, Transition};
use crate::domain::payment::{
    InboundNotification, NotificationOutcome, PaymentInfo, PaymentRequest, SessionRequest,
};
use crate::domain::ports::{SharedArtifactStore, SharedPaymentGateway};
use crate::error::{Result, StudioError};
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

const PAYMENT_TOPIC: &str = "payment";
const MERCHANT_ORDER_TOPIC: &str = "merchant_order";

/// Gateway payment ids are alphanumeric; anything else would reshape the
/// detail-fetch URL.
fn is_payment_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Checkout settings applied to every session this process opens.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub session_ttl: Duration,
    pub notification_url: Option<String>,
}

/// Links artifacts to checkout sessions and settles them from gateway webhooks.
///
/// Every status change goes through the store's conditional transition, so a
/// webhook delivered twice (or two deliveries racing) settles the artifact and
/// runs fulfillment once.
#[derive(Clone)]
pub struct PaymentStateMachine {
    store: SharedArtifactStore,
    gateway: SharedPaymentGateway,
    verifier: WebhookVerifier,
    dispatcher: FulfillmentDispatcher,
    settings: CheckoutSettings,
}

impl PaymentStateMachine {
    pub fn new(
        store: SharedArtifactStore,
        gateway: SharedPaymentGateway,
        verifier: WebhookVerifier,
        dispatcher: FulfillmentDispatcher,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            verifier,
            dispatcher,
            settings,
        }
    }

    async fn load(&self, id: &str) -> Result<Artifact> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StudioError::not_found(id))
    }

    fn session_for(&self, id: &str, request: &PaymentRequest) -> SessionRequest {
        SessionRequest {
            item_id: Uuid::new_v4().simple().to_string(),
            title: request.item_title.trim().to_string(),
            unit_price: request.item_price,
            quantity: 1,
            currency: self.settings.currency.clone(),
            back_url: request.back_url_success.clone(),
            expires_at: OffsetDateTime::now_utc() + self.settings.session_ttl,
            external_reference: id.to_string(),
            notification_url: request
                .notification_url
                .clone()
                .or_else(|| self.settings.notification_url.clone()),
            payer_email: request.payer_email.clone(),
        }
    }

    /// Opens a checkout session for an artifact and marks it `PENDING`.
    ///
    /// The artifact is checked before the gateway is called, so an unknown or
    /// unfulfillable id never opens a session; a gateway failure leaves the
    /// artifact untouched.
    pub async fn attach_payment(&self, id: &str, request: PaymentRequest) -> Result<Artifact> {
        request.validate()?;

        let artifact = self.load(id).await?;
        // Delivery mails the stamp, so there must be one to sell.
        if artifact.stamp_img.is_none() {
            return Err(StudioError::Conflict(format!(
                "artifact {} has no stamp image to sell",
                id
            )));
        }
        if let Some(status) = artifact.payment_status
            && status.is_terminal()
        {
            return Err(StudioError::Conflict(format!(
                "payment for artifact {} is already {}",
                id, status
            )));
        }

        let session = self
            .gateway
            .create_session(self.session_for(id, &request))
            .await?;

        let payment_id = session.id.clone();
        let artifact = self
            .store
            .modify(id, Box::new(move |artifact| artifact.attach_payment(payment_id)))
            .await?;

        info!(
            artifact_id = %id,
            payment_id = %session.id,
            checkout_url = session.checkout_url.as_deref().unwrap_or(""),
            "payment attached"
        );
        Ok(artifact)
    }

    pub async fn payment_info(&self, id: &str) -> Result<PaymentInfo> {
        let artifact = self.load(id).await?;
        Ok(PaymentInfo {
            artifact_id: artifact.id,
            payment_id: artifact.payment_id,
            payment_status: artifact.payment_status,
            payment_email: artifact.payment_email,
            external_reference: artifact.external_reference,
        })
    }

    /// Manual status correction. Never triggers fulfillment.
    pub async fn update_payment_status(&self, id: &str, status: PaymentStatus) -> Result<Artifact> {
        let (artifact, transition) = self.store.transition_payment(id, status, None).await?;
        match transition {
            Transition::Applied => {
                warn!(artifact_id = %id, status = %status, "payment status set manually");
                Ok(artifact)
            }
            Transition::Unchanged(current) if current == status => Ok(artifact),
            Transition::Unchanged(current) => Err(StudioError::Conflict(format!(
                "payment for artifact {} is already {}",
                id, current
            ))),
            Transition::Unattached => Err(StudioError::Conflict(format!(
                "artifact {} has no payment attached",
                id
            ))),
        }
    }

    /// Re-sends the stamp of an approved artifact.
    pub async fn redeliver(&self, id: &str) -> Result<()> {
        let artifact = self.load(id).await?;
        if artifact.payment_status != Some(PaymentStatus::Approved) {
            return Err(StudioError::Conflict(format!(
                "artifact {} has no approved payment",
                id
            )));
        }
        self.dispatcher.deliver(id).await
    }

    /// Processes a gateway webhook.
    ///
    /// Gates run in order and each one stops processing: authenticity, topic,
    /// detail fetch, status interpretation, then the conditional transition
    /// and fulfillment.
    pub async fn handle_notification(
        &self,
        notification: InboundNotification,
    ) -> Result<NotificationOutcome> {
        if let Err(e) = self.verifier.verify(&notification) {
            warn!(error = %e, "webhook rejected");
            return Err(e);
        }

        let body = notification
            .body
            .ok_or_else(|| StudioError::BadRequest("notification body is not JSON".to_string()))?;

        let payment_id = match (body.topic.as_deref(), body.resource_id()) {
            (Some(PAYMENT_TOPIC), Some(id)) if is_payment_id(id) => id.to_string(),
            (Some(PAYMENT_TOPIC), Some(id)) => {
                warn!(payment_id = id, "malformed payment id in notification");
                return Err(StudioError::BadRequest(
                    "Invalid payment id in notification".to_string(),
                ));
            }
            (Some(MERCHANT_ORDER_TOPIC), Some(order_id)) => {
                info!(order_id, "merchant order notification acknowledged");
                return Ok(NotificationOutcome::Acknowledged {
                    reason: "Merchant order processed".to_string(),
                });
            }
            (topic, _) => {
                warn!(
                    topic = topic.unwrap_or(""),
                    action = body.action.as_deref().unwrap_or(""),
                    "invalid notification payload"
                );
                return Err(StudioError::BadRequest(
                    "Invalid notification payload".to_string(),
                ));
            }
        };

        let details = self.gateway.payment_details(&payment_id).await?;
        info!(payment_id = %details.id, status = ?details.status, "payment details fetched");

        let Some(target) = details.status.resolution() else {
            return Ok(NotificationOutcome::Acknowledged {
                reason: format!("Payment not approved: {:?}", details.status),
            });
        };

        // Correlate only through the authenticated detail fetch.
        let artifact_id = details.external_reference.ok_or_else(|| {
            StudioError::GatewayError(format!("payment {} has no external reference", details.id))
        })?;

        let email = match target {
            PaymentStatus::Approved => details.payer_email,
            _ => None,
        };
        let (_, transition) = self
            .store
            .transition_payment(&artifact_id, target, email)
            .await?;

        match transition {
            Transition::Applied => {}
            Transition::Unchanged(status) => {
                info!(artifact_id = %artifact_id, status = %status, "duplicate notification ignored");
                return Ok(NotificationOutcome::Duplicate {
                    artifact_id,
                    status,
                });
            }
            Transition::Unattached => {
                warn!(
                    artifact_id = %artifact_id,
                    payment_id = %details.id,
                    "notification for an artifact with no payment attached"
                );
                return Ok(NotificationOutcome::Acknowledged {
                    reason: format!("Artifact {} has no payment attached", artifact_id),
                });
            }
        }

        match target {
            PaymentStatus::Approved => {
                info!(artifact_id = %artifact_id, "payment approved");
                self.dispatcher.deliver(&artifact_id).await?;
                Ok(NotificationOutcome::Approved { artifact_id })
            }
            _ => {
                info!(artifact_id = %artifact_id, "payment rejected");
                Ok(NotificationOutcome::Rejected { artifact_id })
            }
        }
    }
}
