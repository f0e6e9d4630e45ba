//! Shared domain engine handed to every platform adapter.
//!
//! The engine is built once in `main` and shared as `Arc<Core>`. Adapters never
//! call it directly; they go through `messaging::relay`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{config::CoreConfig, messaging::IncomingText, Result};

/// Translation capability used by the engine.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Returns the input unchanged. Used when no translation backend is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _target_language: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

pub struct Core {
    config: Arc<CoreConfig>,
    translator: Arc<dyn Translator>,
}

impl Core {
    pub fn new(config: Arc<CoreConfig>, translator: Arc<dyn Translator>) -> Self {
        Self { config, translator }
    }

    /// Reply with the enforced-language rendering of `msg`, if it differs.
    pub async fn handle(&self, msg: &IncomingText) -> Result<Option<String>> {
        let text = msg.text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let rendered = self
            .translator
            .translate(text, &self.config.enforced_language)
            .await?;

        if normalize(&rendered) == normalize(text) || rendered.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(rendered))
        }
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
