use std::sync::Arc;

use le_core::{
    config::CoreConfig,
    credentials::ProcessEnv,
    domain::{Platform, PlatformCredential},
    engine::{Core, PassthroughTranslator, Translator},
    launch::{AdapterFactory, LaunchOrchestrator, LaunchRequest, PlatformAdapter},
    secrets::SecretIdentifiers,
};
use le_discord::DiscordAdapter;
use le_gcp::{AccessTokenSource, GoogleTranslator, SecretManagerClient};
use le_telegram::TelegramAdapter;

/// Builds the real chat-network adapters.
struct Adapters;

impl AdapterFactory for Adapters {
    fn build(
        &self,
        credential: PlatformCredential,
        engine: Arc<Core>,
    ) -> le_core::Result<Box<dyn PlatformAdapter>> {
        let adapter: Box<dyn PlatformAdapter> = match credential.platform {
            Platform::Telegram => Box::new(TelegramAdapter::new(&credential, engine)),
            Platform::Discord => Box::new(DiscordAdapter::new(&credential, engine)?),
        };
        Ok(adapter)
    }
}

#[tokio::main]
async fn main() -> Result<(), le_core::Error> {
    le_core::logging::init("lang-enforcer")?;

    let cfg = Arc::new(CoreConfig::load()?);

    let request = LaunchRequest::from_args(std::env::args().skip(1));

    let translator: Arc<dyn Translator> = match &cfg.translate_api_key {
        Some(key) => Arc::new(GoogleTranslator::new(key.clone())?),
        None => {
            tracing::warn!("GOOGLE_TRANSLATE_API_KEY not set; translation disabled");
            Arc::new(PassthroughTranslator)
        }
    };
    let engine = Arc::new(Core::new(cfg.clone(), translator));

    let store = SecretManagerClient::new(
        AccessTokenSource::from_config(cfg.gcp_access_token.as_deref()),
        cfg.secret_timeout,
    )?;
    let ids = SecretIdentifiers::for_project(&cfg.secret_project);

    let report = LaunchOrchestrator::new(&store, &ProcessEnv, &ids, &Adapters, engine)
        .run(&request)
        .await?;

    if report.started.is_empty() {
        return Ok(());
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
