use crate::domain::Platform;

/// Core error type for the launcher and its adapters.
///
/// Adapter crates map their library errors into this type so `main` sees one
/// failure shape. Secret-store misses are not errors; see `secrets::SecretLookup`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{platform} adapter failed to start: {reason}")]
    AdapterStart { platform: Platform, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
