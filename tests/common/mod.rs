#![allow(dead_code)]

use async_trait::async_trait;
use stampforge::application::catalog::ArtifactCatalog;
use stampforge::application::fulfillment::FulfillmentDispatcher;
use stampforge::application::payments::{CheckoutSettings, PaymentStateMachine};
use stampforge::application::pipeline::PipelineOrchestrator;
use stampforge::application::signature::{WebhookVerifier, manifest, sign};
use stampforge::config::Assets;
use stampforge::domain::generation::{Erase, Inpaint, SketchToImage, TextToImage};
use stampforge::domain::payment::{
    CheckoutSession, GatewayStatus, InboundNotification, Notification, PaymentDetails,
    PaymentRequest, SessionRequest,
};
use stampforge::domain::ports::{ImageProvider, Mailer, OutboundMail, PaymentGateway};
use stampforge::error::{Result, StudioError};
use stampforge::infrastructure::in_memory::InMemoryArtifactStore;
use stampforge::interfaces::http::AppState;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "test-webhook-secret";
pub const SEED: u64 = 7;

/// How the fake provider answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    Ok,
    Rejects,
    Down,
}

/// Deterministic provider: every output names the call and its inputs.
pub struct FakeProvider {
    pub calls: Mutex<Vec<String>>,
    pub inpaints: Mutex<Vec<Inpaint>>,
    mode: Mutex<ProviderMode>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            inpaints: Mutex::new(Vec::new()),
            mode: Mutex::new(ProviderMode::Ok),
        }
    }

    pub fn set_mode(&self, mode: ProviderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn answer(&self, call: &str, output: Vec<u8>) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(call.to_string());
        match *self.mode.lock().unwrap() {
            ProviderMode::Ok => Ok(output),
            ProviderMode::Rejects => Err(StudioError::ProviderError {
                status: 400,
                name: "content_moderation".to_string(),
                details: vec!["prompt flagged".to_string()],
            }),
            ProviderMode::Down => Err(StudioError::Unavailable {
                service: "image provider",
                message: "timed out".to_string(),
            }),
        }
    }
}

fn tagged(tag: &str, parts: &[&[u8]]) -> Vec<u8> {
    let mut out = format!("{}:", tag).into_bytes();
    for part in parts {
        out.extend_from_slice(part);
        out.push(b'|');
    }
    out
}

#[async_trait]
impl ImageProvider for FakeProvider {
    async fn text_to_image(&self, request: TextToImage) -> Result<Vec<u8>> {
        let seed = request.seed.to_string();
        self.answer(
            "text_to_image",
            tagged("stamp", &[request.prompt.as_bytes(), seed.as_bytes()]),
        )
    }

    async fn sketch_to_image(&self, request: SketchToImage) -> Result<Vec<u8>> {
        self.answer(
            "sketch_to_image",
            tagged("sketch-stamp", &[request.prompt.as_bytes(), &request.sketch]),
        )
    }

    async fn inpaint(&self, request: Inpaint) -> Result<Vec<u8>> {
        let output = tagged(
            "preview",
            &[
                &request.image,
                request.style_image.as_deref().unwrap_or(b"none"),
                request.prompt.as_bytes(),
            ],
        );
        self.inpaints.lock().unwrap().push(request);
        self.answer("inpaint", output)
    }

    async fn erase(&self, request: Erase) -> Result<Vec<u8>> {
        self.answer("erase", tagged("erased", &[&request.image, &request.mask]))
    }

    async fn remove_background(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        self.answer("remove_background", tagged("nobg", &[&image]))
    }

    async fn upscale(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        self.answer("upscale", tagged("upscaled", &[&image]))
    }
}

/// In-memory gateway holding the payments it will report.
pub struct FakeGateway {
    pub sessions: Mutex<Vec<SessionRequest>>,
    pub payments: Mutex<HashMap<String, PaymentDetails>>,
    pub fail_sessions: Mutex<bool>,
    pub detail_fetches: Mutex<usize>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            payments: Mutex::new(HashMap::new()),
            fail_sessions: Mutex::new(false),
            detail_fetches: Mutex::new(0),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn report(&self, payment_id: &str, status: GatewayStatus, artifact_id: &str) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            PaymentDetails {
                id: payment_id.to_string(),
                status,
                payer_email: Some("buyer@example.com".to_string()),
                external_reference: Some(artifact_id.to_string()),
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<CheckoutSession> {
        if *self.fail_sessions.lock().unwrap() {
            return Err(StudioError::GatewayError("401: invalid token".to_string()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push(request);
        let id = format!("pref-{}", sessions.len());
        Ok(CheckoutSession {
            checkout_url: Some(format!("https://checkout.example.com/{}", id)),
            id,
        })
    }

    async fn payment_details(&self, payment_id: &str) -> Result<PaymentDetails> {
        *self.detail_fetches.lock().unwrap() += 1;
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| StudioError::GatewayError(format!("404: payment {}", payment_id)))
    }
}

pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutboundMail>>,
    pub fail: Mutex<bool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
        }
    }

    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutboundMail) -> Result<()> {
        if *self.fail.lock().unwrap() {
            return Err(StudioError::DeliveryError("relay refused".to_string()));
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn assets() -> Assets {
    Assets {
        garment_image: b"garment".to_vec(),
        garment_mask: b"mask".to_vec(),
        inverted_mask: b"inverted".to_vec(),
    }
}

/// Every service wired against fakes.
pub struct Harness {
    pub store: Arc<InMemoryArtifactStore>,
    pub provider: Arc<FakeProvider>,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub pipeline: PipelineOrchestrator,
    pub catalog: ArtifactCatalog,
    pub payments: PaymentStateMachine,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryArtifactStore::new());
        let provider = Arc::new(FakeProvider::new());
        let gateway = Arc::new(FakeGateway::new());
        let mailer = Arc::new(RecordingMailer::new());

        let dispatcher = FulfillmentDispatcher::new(store.clone(), mailer.clone());
        let pipeline =
            PipelineOrchestrator::new(store.clone(), provider.clone(), Arc::new(assets()), SEED);
        let catalog = ArtifactCatalog::new(store.clone());
        let payments = PaymentStateMachine::new(
            store.clone(),
            gateway.clone(),
            WebhookVerifier::new(SECRET),
            dispatcher,
            CheckoutSettings {
                currency: "BRL".to_string(),
                session_ttl: time::Duration::minutes(30),
                notification_url: Some("https://shop.example.com/payments/notification".into()),
            },
        );

        Self {
            store,
            provider,
            gateway,
            mailer,
            pipeline,
            catalog,
            payments,
        }
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            pipeline: self.pipeline.clone(),
            catalog: self.catalog.clone(),
            payments: self.payments.clone(),
        })
    }
}

pub fn payment_request() -> PaymentRequest {
    serde_json::from_value(serde_json::json!({
        "itemTitle": "Custom t-shirt",
        "itemPrice": "79.90",
        "backUrlSuccess": "https://shop.example.com/thanks",
    }))
    .unwrap()
}

pub fn notification_body(topic: &str, resource_id: &str) -> serde_json::Value {
    serde_json::json!({
        "topic": topic,
        "resource": format!("https://api.mercadolibre.com/collections/notifications/{}", resource_id),
        "action": "payment.updated",
        "data": { "id": resource_id },
    })
}

/// `x-signature` value the gateway would send for this data id.
pub fn signature_for(secret: &str, data_id: &str, request_id: &str, ts: &str) -> String {
    let digest = sign(secret, &manifest(Some(data_id), Some(request_id), ts)).unwrap();
    format!("ts={},v1={}", ts, digest)
}

pub fn signed(topic: &str, resource_id: &str) -> InboundNotification {
    InboundNotification {
        body: Some(
            serde_json::from_value::<Notification>(notification_body(topic, resource_id)).unwrap(),
        ),
        signature: Some(signature_for(SECRET, resource_id, "req-1", "1700000000")),
        request_id: Some("req-1".to_string()),
        query_data_id: None,
    }
}

pub fn write_assets(dir: &Path) {
    std::fs::write(dir.join("garment.webp"), b"garment").unwrap();
    std::fs::write(dir.join("mask.webp"), b"mask").unwrap();
    std::fs::write(dir.join("inverted.webp"), b"inverted").unwrap();
}
