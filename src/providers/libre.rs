use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::post_with_retry;

pub(crate) const DEFAULT_URL: &str = "http://localhost:5000";

/// Client for a LibreTranslate server (Argos models behind an HTTP API).
#[derive(Debug, Clone)]
pub struct LibreTranslate {
    url: String,
    key: Option<String>,
    client: reqwest::Client,
}

impl LibreTranslate {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let url = url.trim().trim_end_matches('/');
        Self {
            url: if url.is_empty() {
                DEFAULT_URL.to_string()
            } else {
                url.to_string()
            },
            key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.key = key.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let endpoint = format!("{}/translate", self.url);
        let mut body = json!({
            "q": text,
            "source": source,
            "target": target,
            "format": "text"
        });
        if let Some(key) = &self.key {
            body["api_key"] = json!(key);
        }
        let reply = post_with_retry(
            "LibreTranslate",
            || self.client.post(&endpoint).json(&body),
            extract_error,
        )
        .await
        .with_context(|| format!("LibreTranslate at {} failed", self.url))?;
        extract_translation(&reply)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

fn extract_translation(body: &str) -> Result<String> {
    let payload: TranslateResponse =
        serde_json::from_str(body).with_context(|| "failed to parse LibreTranslate response")?;
    if payload.translated_text.trim().is_empty() {
        return Err(anyhow!("LibreTranslate returned an empty translation"));
    }
    Ok(payload.translated_text)
}

fn extract_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.error.filter(|message| !message.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_translated_text() {
        let body = r#"{"translatedText":"안녕 세상"}"#;
        assert_eq!(extract_translation(body).unwrap(), "안녕 세상");
    }

    #[test]
    fn empty_translation_is_an_error() {
        assert!(extract_translation(r#"{"translatedText":"  "}"#).is_err());
        assert!(extract_translation("not json").is_err());
    }

    #[test]
    fn reads_error_message() {
        let body = r#"{"error":"ko is not supported"}"#;
        assert_eq!(extract_error(body).as_deref(), Some("ko is not supported"));
    }

    #[test]
    fn trims_trailing_slash_from_url() {
        assert_eq!(
            LibreTranslate::new("http://translate.local/").url(),
            "http://translate.local"
        );
        assert_eq!(LibreTranslate::new(" ").url(), DEFAULT_URL);
    }
}
