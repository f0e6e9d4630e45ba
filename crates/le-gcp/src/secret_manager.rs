//! Secret Manager adapter.
//!
//! `GET /v1/{name}:access` with a bearer token; the payload comes back base64
//! encoded. One attempt per lookup, nothing cached.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use le_core::{
    secrets::{SecretLookup, SecretStore},
    Result,
};

use crate::auth::AccessTokenSource;

const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";

#[derive(Deserialize)]
struct AccessResponse {
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    data: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SecretManagerClient {
    base_url: String,
    token: AccessTokenSource,
    http: reqwest::Client,
}

impl SecretManagerClient {
    /// `timeout` bounds each request (token and secret access).
    pub fn new(token: AccessTokenSource, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: SECRET_MANAGER_URL.to_string(),
            token,
            http: crate::http_client(timeout)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn access_url(&self, name: &str) -> String {
        format!(
            "{}/v1/{}:access",
            self.base_url.trim_end_matches('/'),
            name.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl SecretStore for SecretManagerClient {
    async fn fetch(&self, name: &str) -> SecretLookup {
        tracing::debug!(secret = name, "secret manager access");
        let token = match self.token.token(&self.http).await {
            Ok(t) => t,
            Err(e) => return SecretLookup::TransientFailure(e.to_string()),
        };

        let resp = match self
            .http
            .get(self.access_url(name))
            .bearer_auth(token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return SecretLookup::TransientFailure(format!("secret manager request error: {e}"))
            }
        };

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return SecretLookup::NotFound;
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return SecretLookup::TransientFailure(format!(
                "secret manager access failed: {status} {}",
                body.chars().take(200).collect::<String>()
            ));
        }

        match resp.text().await {
            Ok(body) => decode_access_response(&body),
            Err(e) => SecretLookup::TransientFailure(format!("secret manager read error: {e}")),
        }
    }
}

fn decode_access_response(body: &str) -> SecretLookup {
    let parsed: AccessResponse = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return SecretLookup::TransientFailure(format!("secret manager json error: {e}")),
    };

    let Some(data) = parsed.payload.and_then(|p| p.data) else {
        return SecretLookup::NotFound;
    };

    let bytes = match STANDARD.decode(data.as_bytes()) {
        Ok(b) => b,
        Err(e) => {
            return SecretLookup::TransientFailure(format!("secret payload is not base64: {e}"))
        }
    };

    match String::from_utf8(bytes) {
        Ok(s) => SecretLookup::found(s),
        Err(_) => SecretLookup::TransientFailure("secret payload is not utf-8".to_string()),
    }
}
