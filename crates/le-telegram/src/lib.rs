//! Telegram adapter (teloxide).
//!
//! Implements the `le-core` MessagingPort and PlatformAdapter over the
//! Telegram Bot API.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use tokio::time::sleep;

pub mod router;

use le_core::{
    domain::{ChatId, Platform, PlatformCredential},
    engine::Core,
    errors::Error,
    launch::PlatformAdapter,
    messaging::MessagingPort,
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: &ChatId) -> Result<teloxide::types::ChatId> {
        chat_id
            .0
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|_| Error::External(format!("invalid telegram chat id: {}", chat_id.0)))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_text(&self, chat_id: &ChatId, text: &str) -> Result<()> {
        let chat = Self::tg_chat(chat_id)?;
        self.with_retry(|| self.bot.send_message(chat, text.to_string()))
            .await?;
        Ok(())
    }
}

/// Telegram bot bound to the shared engine.
pub struct TelegramAdapter {
    bot: Bot,
    engine: Arc<Core>,
}

impl TelegramAdapter {
    pub fn new(credential: &PlatformCredential, engine: Arc<Core>) -> Self {
        Self {
            bot: Bot::new(credential.token.clone()),
            engine,
        }
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn start(self: Box<Self>) -> Result<()> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| Error::AdapterStart {
                platform: Platform::Telegram,
                reason: e.to_string(),
            })?;
        tracing::info!("telegram bot connected: @{}", me.username());

        let TelegramAdapter { bot, engine } = *self;
        tokio::spawn(async move {
            if let Err(e) = router::run_polling(bot, engine).await {
                tracing::error!("telegram polling stopped: {e}");
            }
        });
        Ok(())
    }
}
