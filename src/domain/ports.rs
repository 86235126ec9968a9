use super::artifact::{Artifact, NewArtifact, PaymentStatus, Transition};
use super::generation::{Erase, Inpaint, SketchToImage, TextToImage};
use super::payment::{CheckoutSession, PaymentDetails, SessionRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// In-place edit of a stored artifact.
pub type ArtifactChange = Box<dyn FnOnce(&mut Artifact) -> Result<()> + Send>;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists a new artifact and returns it with its assigned id.
    async fn create(&self, new: NewArtifact) -> Result<Artifact>;
    async fn get(&self, id: &str) -> Result<Option<Artifact>>;
    async fn get_all(&self) -> Result<Vec<Artifact>>;
    /// Applies `change` to the stored artifact and persists the result,
    /// atomically with respect to other writes on the same id. Fails with
    /// `NotFound` if it is gone; nothing is written if `change` fails.
    async fn modify(&self, id: &str, change: ArtifactChange) -> Result<Artifact>;
    async fn delete(&self, id: &str) -> Result<bool>;
    async fn delete_all(&self) -> Result<usize>;
    /// Applies [`Artifact::transition`] atomically with respect to other
    /// transitions on the same id.
    async fn transition_payment(
        &self,
        id: &str,
        to: PaymentStatus,
        email: Option<String>,
    ) -> Result<(Artifact, Transition)>;
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    async fn text_to_image(&self, request: TextToImage) -> Result<Vec<u8>>;
    async fn sketch_to_image(&self, request: SketchToImage) -> Result<Vec<u8>>;
    async fn inpaint(&self, request: Inpaint) -> Result<Vec<u8>>;
    async fn erase(&self, request: Erase) -> Result<Vec<u8>>;
    async fn remove_background(&self, image: Vec<u8>) -> Result<Vec<u8>>;
    async fn upscale(&self, image: Vec<u8>) -> Result<Vec<u8>>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: SessionRequest) -> Result<CheckoutSession>;
    async fn payment_details(&self, payment_id: &str) -> Result<PaymentDetails>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: MailAttachment,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutboundMail) -> Result<()>;
}

pub type SharedArtifactStore = Arc<dyn ArtifactStore>;
pub type SharedImageProvider = Arc<dyn ImageProvider>;
pub type SharedPaymentGateway = Arc<dyn PaymentGateway>;
pub type SharedMailer = Arc<dyn Mailer>;
