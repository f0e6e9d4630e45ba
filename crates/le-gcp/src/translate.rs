//! Cloud Translation (v2, API key) adapter.

use async_trait::async_trait;
use serde::Deserialize;

use le_core::{engine::Translator, errors::Error, Result};

const TRANSLATE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

#[derive(Clone, Debug)]
pub struct GoogleTranslator {
    api_key: String,
    http: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_key: api_key.into(),
            http: crate::http_client(std::time::Duration::from_secs(10))?,
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let resp = self
            .http
            .post(TRANSLATE_URL)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "q": text,
                "target": target_language,
                "format": "text",
            }))
            .send()
            .await
            .map_err(|e| Error::External(format!("translate request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "translate failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::External(format!("translate read error: {e}")))?;
        parse_translation(&body)
    }
}

fn parse_translation(body: &str) -> Result<String> {
    let parsed: TranslateResponse = serde_json::from_str(body)?;
    parsed
        .data
        .translations
        .into_iter()
        .next()
        .map(|t| t.translated_text)
        .ok_or_else(|| Error::External("translate returned no translations".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_translation() {
        let body = r#"{"data":{"translations":[{"translatedText":"hello","detectedSourceLanguage":"es"}]}}"#;
        assert_eq!(parse_translation(body).unwrap(), "hello");
    }

    #[test]
    fn empty_translation_list_is_an_error() {
        let err = parse_translation(r#"{"data":{"translations":[]}}"#).unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert!(matches!(
            parse_translation("{}").unwrap_err(),
            Error::Json(_)
        ));
    }
}
