use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Default project holding the bot token secrets.
pub const DEFAULT_SECRET_PROJECT: &str = "telegram-lang-enforcer";

/// Typed configuration, built once in `main` and shared by reference.
///
/// Bot tokens are not part of this struct: they only flow through
/// `credentials::CredentialAcquirer`.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    // Secret store
    pub secret_project: String,
    pub secret_timeout: Duration,
    pub gcp_access_token: Option<String>,

    // Engine
    pub enforced_language: String,
    pub translate_api_key: Option<String>,
}

impl CoreConfig {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let secret_project =
            get("SECRET_PROJECT").unwrap_or_else(|| DEFAULT_SECRET_PROJECT.to_string());
        if secret_project.contains('/') {
            return Err(Error::Config(format!(
                "SECRET_PROJECT must be a bare project id, got {secret_project:?}"
            )));
        }

        let secret_timeout = Duration::from_millis(
            get("SECRET_TIMEOUT_MS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(10_000),
        );
        let gcp_access_token = get("GCP_ACCESS_TOKEN");

        let enforced_language = get("ENFORCED_LANGUAGE")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| "en".to_string());
        let translate_api_key = get("GOOGLE_TRANSLATE_API_KEY");

        Ok(Self {
            secret_project,
            secret_timeout,
            gcp_access_token,
            enforced_language,
            translate_api_key,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
