//! Google Cloud adapters: Secret Manager (`SecretStore`) and Cloud Translation
//! (`Translator`), both over plain REST.

pub mod auth;
pub mod secret_manager;
pub mod translate;

pub use auth::AccessTokenSource;
pub use secret_manager::SecretManagerClient;
pub use translate::GoogleTranslator;

use le_core::{errors::Error, Result};

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::External(format!("http client build failed: {e}")))
}
