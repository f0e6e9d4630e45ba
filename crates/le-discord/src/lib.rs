//! Discord adapter.
//!
//! Inbound events come from the Discord gateway (websocket); replies go out
//! through the REST API. Implements the `le-core` MessagingPort and
//! PlatformAdapter.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::sleep;

pub mod gateway;

use le_core::{
    domain::{ChatId, Platform, PlatformCredential},
    engine::Core,
    errors::Error,
    launch::PlatformAdapter,
    messaging::MessagingPort,
    Result,
};

pub const API_BASE: &str = "https://discord.com/api/v10";

/// Discord rejects message content longer than this.
pub const MESSAGE_LIMIT: usize = 2000;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| Error::External(format!("http client build failed: {e}")))
}

#[derive(Deserialize)]
struct GatewayBot {
    url: String,
}

#[derive(Deserialize)]
struct RateLimited {
    retry_after: f64,
}

#[derive(Clone)]
pub struct DiscordMessenger {
    token: String,
    api_base: String,
    http: reqwest::Client,
}

impl DiscordMessenger {
    pub fn new(token: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            token: token.into(),
            api_base: API_BASE.to_string(),
            http,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[async_trait]
impl MessagingPort for DiscordMessenger {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        const MAX_RETRIES: usize = 1;
        let url = format!("{}/channels/{}/messages", self.api_base, chat_id.0);
        let body = serde_json::json!({ "content": truncate(text, MESSAGE_LIMIT) });

        let mut attempts = 0usize;
        loop {
            let resp = self
                .http
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, self.auth())
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::External(format!("discord request error: {e}")))?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }

            let text = resp.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS && attempts < MAX_RETRIES {
                attempts += 1;
                sleep(retry_after(&text)).await;
                continue;
            }
            return Err(Error::External(format!(
                "discord send failed: {status} {}",
                text.chars().take(200).collect::<String>()
            )));
        }
    }
}

fn retry_after(body: &str) -> Duration {
    serde_json::from_str::<RateLimited>(body)
        .ok()
        .filter(|r| r.retry_after.is_finite() && r.retry_after >= 0.0)
        .map(|r| Duration::from_secs_f64(r.retry_after.min(60.0)))
        .unwrap_or(Duration::from_secs(1))
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Discord bot bound to the shared engine.
pub struct DiscordAdapter {
    token: String,
    engine: Arc<Core>,
    http: reqwest::Client,
}

impl DiscordAdapter {
    pub fn new(credential: &PlatformCredential, engine: Arc<Core>) -> Result<Self> {
        Ok(Self {
            token: credential.token.clone(),
            engine,
            http: http_client()?,
        })
    }

    async fn gateway_url(&self) -> Result<String> {
        let start_err = |reason: String| Error::AdapterStart {
            platform: Platform::Discord,
            reason,
        };

        let resp = self
            .http
            .get(format!("{API_BASE}/gateway/bot"))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| start_err(format!("gateway lookup error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(start_err(format!("gateway lookup failed: {status}")));
        }

        let gw: GatewayBot = resp
            .json()
            .await
            .map_err(|e| start_err(format!("gateway lookup json error: {e}")))?;
        Ok(gw.url)
    }
}

#[async_trait]
impl PlatformAdapter for DiscordAdapter {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    async fn start(self: Box<Self>) -> Result<()> {
        let url = self.gateway_url().await?;
        tracing::info!("discord gateway: {url}");

        let DiscordAdapter {
            token,
            engine,
            http,
        } = *self;
        let messenger: Arc<dyn MessagingPort> =
            Arc::new(DiscordMessenger::new(token.clone(), http));
        let gateway = gateway::Gateway::new(url, token, engine, messenger);
        tokio::spawn(async move { gateway.run().await });
        Ok(())
    }
}
