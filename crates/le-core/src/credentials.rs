//! Per-platform credential acquisition: secret store first, then environment.

use crate::{
    domain::{CredentialSource, Mode, Platform, PlatformCredential},
    secrets::{SecretIdentifiers, SecretLookup, SecretStore},
};

/// Read access to environment variables.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

pub struct CredentialAcquirer<'a> {
    store: &'a dyn SecretStore,
    env: &'a dyn EnvSource,
    ids: &'a SecretIdentifiers,
}

impl<'a> CredentialAcquirer<'a> {
    pub fn new(
        store: &'a dyn SecretStore,
        env: &'a dyn EnvSource,
        ids: &'a SecretIdentifiers,
    ) -> Self {
        Self { store, env, ids }
    }

    /// Returns `None` when neither source has a non-empty value.
    ///
    /// Never fails: store problems are downgraded to the environment fallback.
    pub async fn acquire(&self, platform: Platform, mode: Mode) -> Option<PlatformCredential> {
        let name = self.ids.resolve(platform, mode);

        let reason = match self.store.fetch(name).await {
            SecretLookup::Found(token) if !token.is_empty() => {
                tracing::debug!(%platform, "credential loaded from secret store");
                return Some(PlatformCredential {
                    platform,
                    token,
                    source: CredentialSource::SecretStore,
                });
            }
            SecretLookup::Found(_) | SecretLookup::NotFound => "secret not found".to_string(),
            SecretLookup::TransientFailure(e) => e,
        };

        if platform.announces_fallback() {
            tracing::info!(
                %platform,
                "Getting {} from the secret store failed ({reason}), falling back to env var.",
                platform.env_var()
            );
        } else {
            tracing::debug!(%platform, "secret store lookup failed: {reason}");
        }

        let token = self.env.var(platform.env_var())?;
        if token.trim().is_empty() {
            return None;
        }
        Some(PlatformCredential {
            platform,
            token,
            source: CredentialSource::Environment,
        })
    }
}
