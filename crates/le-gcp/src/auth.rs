use serde::Deserialize;

use le_core::{errors::Error, Result};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Where OAuth access tokens for Google APIs come from.
#[derive(Clone)]
pub enum AccessTokenSource {
    /// A pre-minted token (`GCP_ACCESS_TOKEN`), e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The GCE / Cloud Run metadata server.
    Metadata,
}

impl std::fmt::Debug for AccessTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessTokenSource::Static(_) => f.write_str("Static(<redacted>)"),
            AccessTokenSource::Metadata => f.write_str("Metadata"),
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl AccessTokenSource {
    pub fn from_config(static_token: Option<&str>) -> Self {
        match static_token {
            Some(t) => AccessTokenSource::Static(t.to_string()),
            None => AccessTokenSource::Metadata,
        }
    }

    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        match self {
            AccessTokenSource::Static(t) => Ok(t.clone()),
            AccessTokenSource::Metadata => {
                let resp = http
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| Error::External(format!("metadata token request error: {e}")))?;

                if !resp.status().is_success() {
                    return Err(Error::External(format!(
                        "metadata token request failed: {}",
                        resp.status()
                    )));
                }

                let body = resp
                    .text()
                    .await
                    .map_err(|e| Error::External(format!("metadata token read error: {e}")))?;
                parse_metadata_token(&body)
            }
        }
    }
}

fn parse_metadata_token(body: &str) -> Result<String> {
    let tok: MetadataToken = serde_json::from_str(body)?;
    if tok.access_token.is_empty() {
        return Err(Error::External(
            "metadata server returned an empty token".to_string(),
        ));
    }
    Ok(tok.access_token)
}
