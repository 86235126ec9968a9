use crate::error::{Result, StudioError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encodes raw image bytes into the text-safe form stored on an [`Artifact`].
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes a stored image field back into raw bytes.
pub fn decode_image(encoded: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(encoded)?)
}

/// Payment state of an artifact once a checkout session has been attached.
///
/// `Approved` and `Rejected` are absorbing: nothing moves an artifact out of
/// them except an explicit re-attach being refused.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

impl FromStr for PaymentStatus {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(StudioError::ValidationError(format!(
                "Unknown payment status '{}'",
                other
            ))),
        }
    }
}

/// Result of asking an artifact to move to a payment status.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    /// The status changed.
    Applied,
    /// Nothing changed; carries the status the artifact already had.
    Unchanged(PaymentStatus),
    /// Nothing changed; no checkout session was ever attached.
    Unattached,
}

/// Fields of an artifact before the store assigns it an id.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct NewArtifact {
    pub prompt: Option<String>,
    pub stamp_img: Option<String>,
    pub preview_img: Option<String>,
    pub removed_background_img: Option<String>,
}

/// The persisted record tying a design, its garment preview and its payment together.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_background_img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
}

impl Artifact {
    pub fn from_new(id: String, new: NewArtifact) -> Self {
        Self {
            id,
            prompt: new.prompt,
            stamp_img: new.stamp_img,
            preview_img: new.preview_img,
            removed_background_img: new.removed_background_img,
            ..Self::default()
        }
    }

    /// Links a freshly created checkout session to this artifact.
    ///
    /// A pending artifact may be re-attached (the new session replaces the old
    /// one); a settled one may not.
    pub fn attach_payment(&mut self, payment_id: String) -> Result<()> {
        if let Some(status) = self.payment_status
            && status.is_terminal()
        {
            return Err(StudioError::Conflict(format!(
                "payment for artifact {} is already {}",
                self.id, status
            )));
        }
        self.payment_id = Some(payment_id);
        self.payment_status = Some(PaymentStatus::Pending);
        self.external_reference = Some(self.id.clone());
        Ok(())
    }

    /// Moves the payment to `to`, recording the payer email on approval.
    ///
    /// Settled and unattached artifacts report a no-op instead of failing so
    /// that re-delivered or stray gateway notifications stay harmless.
    pub fn transition(&mut self, to: PaymentStatus, email: Option<String>) -> Transition {
        let Some(current) = self.payment_status else {
            return Transition::Unattached;
        };

        if current.is_terminal() || current == to {
            return Transition::Unchanged(current);
        }

        self.payment_status = Some(to);
        if to == PaymentStatus::Approved {
            self.payment_email = email;
        }
        Transition::Applied
    }
}
