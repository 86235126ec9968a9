use clap::Parser;
use miette::{IntoDiagnostic, Result};
use stampforge::application::catalog::ArtifactCatalog;
use stampforge::application::fulfillment::FulfillmentDispatcher;
use stampforge::application::payments::{CheckoutSettings, PaymentStateMachine};
use stampforge::application::pipeline::PipelineOrchestrator;
use stampforge::application::signature::WebhookVerifier;
use stampforge::config::{Assets, Config};
use stampforge::domain::ports::{
    SharedArtifactStore, SharedImageProvider, SharedMailer, SharedPaymentGateway,
};
use stampforge::infrastructure::in_memory::InMemoryArtifactStore;
use stampforge::infrastructure::mercadopago::MercadoPagoClient;
use stampforge::infrastructure::smtp::SmtpMailer;
use stampforge::infrastructure::stability::StabilityClient;
use stampforge::interfaces::http::{self, AppState};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<&Path>) -> Result<SharedArtifactStore> {
    use stampforge::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?))
        }
        None => Ok(Arc::new(InMemoryArtifactStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<&Path>) -> Result<SharedArtifactStore> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryArtifactStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment alone may be enough.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate().into_diagnostic()?;
    let assets = Arc::new(Assets::load(&config).into_diagnostic()?);
    info!(seed = config.seed, currency = %config.currency, "configuration loaded");

    let store = open_store(config.db_path.as_deref())?;
    let provider: SharedImageProvider = Arc::new(StabilityClient::new(
        config.provider_url.clone(),
        config.provider_api_key.clone(),
        config.http_timeout(),
    ));
    let gateway: SharedPaymentGateway = Arc::new(MercadoPagoClient::new(
        config.gateway_url.clone(),
        config.gateway_access_token.clone(),
        config.http_timeout(),
    ));
    let mailer: SharedMailer = Arc::new(SmtpMailer::new(&config.smtp()).into_diagnostic()?);

    let dispatcher = FulfillmentDispatcher::new(store.clone(), mailer);
    let state = Arc::new(AppState {
        pipeline: PipelineOrchestrator::new(store.clone(), provider, assets, config.seed),
        catalog: ArtifactCatalog::new(store.clone()),
        payments: PaymentStateMachine::new(
            store,
            gateway,
            WebhookVerifier::new(config.webhook_secret.clone()),
            dispatcher,
            CheckoutSettings {
                currency: config.currency.clone(),
                session_ttl: time::Duration::minutes(config.session_expiry_minutes),
                notification_url: config.notification_url.clone(),
            },
        ),
    });

    http::serve(config.bind, state).await.into_diagnostic()?;
    Ok(())
}
