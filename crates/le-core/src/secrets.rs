//! Remote secret store port and the static secret-name table.

use async_trait::async_trait;

use crate::domain::{Mode, Platform};

/// Outcome of a single secret-store lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretLookup {
    Found(String),
    /// The secret or version does not exist, or its payload is empty.
    NotFound,
    /// The store could not be reached or answered with an unexpected error.
    TransientFailure(String),
}

impl SecretLookup {
    /// `Found` with an empty payload is normalized to `NotFound`.
    pub fn found(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            SecretLookup::NotFound
        } else {
            SecretLookup::Found(value)
        }
    }
}

/// A remote secret store.
///
/// One attempt per call: no retries and no caching.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, name: &str) -> SecretLookup;
}

/// Maps `(platform, mode)` to a secret resource name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecretIdentifiers {
    telegram: String,
    telegram_dev: String,
    discord: String,
}

impl SecretIdentifiers {
    pub fn new(
        telegram: impl Into<String>,
        telegram_dev: impl Into<String>,
        discord: impl Into<String>,
    ) -> Self {
        Self {
            telegram: telegram.into(),
            telegram_dev: telegram_dev.into(),
            discord: discord.into(),
        }
    }

    pub fn for_project(project: &str) -> Self {
        let name = |secret: &str| format!("projects/{project}/secrets/{secret}/versions/latest");
        Self::new(
            name("TELEGRAM_TOKEN"),
            name("TELEGRAM_TOKEN_DEV"),
            name("DISCORD_TOKEN"),
        )
    }

    /// Every reachable pair has exactly one name; Discord ignores `mode`.
    pub fn resolve(&self, platform: Platform, mode: Mode) -> &str {
        match (platform, platform.effective_mode(mode)) {
            (Platform::Telegram, Mode::Standard) => &self.telegram,
            (Platform::Telegram, Mode::Alternate) => &self.telegram_dev,
            (Platform::Discord, _) => &self.discord,
        }
    }
}
