use crate::domain::artifact::decode_image;
use crate::domain::ports::{MailAttachment, OutboundMail, SharedArtifactStore, SharedMailer};
use crate::error::{Result, StudioError};
use tracing::{error, info};

pub const STAMP_FILENAME: &str = "stamp.webp";
pub const STAMP_CONTENT_TYPE: &str = "image/webp";

/// Mails the paid stamp to the payer.
///
/// Keeps no delivery receipt: at-most-once delivery per approval is the
/// payment state machine's job.
#[derive(Clone)]
pub struct FulfillmentDispatcher {
    store: SharedArtifactStore,
    mailer: SharedMailer,
}

impl FulfillmentDispatcher {
    pub fn new(store: SharedArtifactStore, mailer: SharedMailer) -> Self {
        Self { store, mailer }
    }

    pub async fn deliver(&self, id: &str) -> Result<()> {
        let artifact = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| StudioError::not_found(id))?;

        let email = artifact.payment_email.ok_or_else(|| {
            StudioError::DeliveryError(format!("artifact {} has no payment email", id))
        })?;
        let stamp = artifact.stamp_img.ok_or_else(|| {
            StudioError::DeliveryError(format!("artifact {} has no stamp image", id))
        })?;
        let bytes = decode_image(&stamp).map_err(|e| {
            StudioError::DeliveryError(format!("stamp of artifact {} is unreadable: {}", id, e))
        })?;

        let mail = OutboundMail {
            to: email.clone(),
            subject: "Your stamp is ready".to_string(),
            body: format!(
                "Thank you for your purchase. Your design is attached.\n\nReference: {}\n",
                id
            ),
            attachment: MailAttachment {
                filename: STAMP_FILENAME.to_string(),
                content_type: STAMP_CONTENT_TYPE.to_string(),
                bytes,
            },
        };

        match self.mailer.send(mail).await {
            Ok(()) => {
                info!(artifact_id = %id, to = %email, "stamp delivered");
                Ok(())
            }
            Err(e) => {
                error!(artifact_id = %id, to = %email, error = %e, "stamp delivery failed");
                Err(match e {
                    StudioError::DeliveryError(_) => e,
                    other => StudioError::DeliveryError(other.to_string()),
                })
            }
        }
    }
}
