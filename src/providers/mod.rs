use anyhow::{Result, anyhow};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

mod claude;
mod libre;
mod openai;
mod retry;

pub use libre::LibreTranslate;

pub(crate) use libre::DEFAULT_URL as DEFAULT_LIBRE_URL;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Claude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Claude => "claude",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => openai::DEFAULT_MODEL,
            ProviderKind::Claude => claude::DEFAULT_MODEL,
        }
    }
}

/// What `--translator` asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslatorSelection {
    Llm {
        provider: ProviderKind,
        requested_model: Option<String>,
    },
    Libre {
        url: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One forced tool call: the system prompt, the paragraph to translate and
/// the tool the model has to answer with.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub system: String,
    pub user: String,
    pub tool: ToolSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderResponse {
    pub args: serde_json::Value,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<ProviderResponse>> + Send + 'a>>;

pub trait Provider: Send + Sync {
    fn call_tool<'a>(&'a self, request: &'a ToolRequest) -> ProviderFuture<'a>;
}

/// An LLM chat API reached over HTTP. Both APIs share the request and retry
/// loop and differ only in body shape, auth headers and reply parsing.
#[derive(Debug, Clone)]
pub struct ChatProvider {
    kind: ProviderKind,
    key: String,
    model: String,
    client: reqwest::Client,
}

impl ChatProvider {
    pub fn new(kind: ProviderKind, key: impl Into<String>, model: Option<String>) -> Self {
        let model = model
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());
        Self {
            kind,
            key: key.into(),
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn body(&self, request: &ToolRequest) -> serde_json::Value {
        match self.kind {
            ProviderKind::OpenAI => openai::request_body(&self.model, request),
            ProviderKind::Claude => claude::request_body(&self.model, request),
        }
    }

    fn post(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        match self.kind {
            ProviderKind::OpenAI => self
                .client
                .post(openai::endpoint())
                .bearer_auth(&self.key)
                .json(body),
            ProviderKind::Claude => self
                .client
                .post(claude::endpoint())
                .header("x-api-key", &self.key)
                .header("anthropic-version", claude::API_VERSION)
                .json(body),
        }
    }
}

impl Provider for ChatProvider {
    fn call_tool<'a>(&'a self, request: &'a ToolRequest) -> ProviderFuture<'a> {
        Box::pin(async move {
            let body = self.body(request);
            let (service, describe_error): (&str, fn(&str) -> Option<String>) = match self.kind {
                ProviderKind::OpenAI => ("OpenAI", openai::describe_error),
                ProviderKind::Claude => ("Claude", claude::describe_error),
            };
            let reply = retry::post_with_retry(service, || self.post(&body), describe_error).await?;
            match self.kind {
                ProviderKind::OpenAI => openai::parse_response(&reply, &request.tool.name, &self.model),
                ProviderKind::Claude => claude::parse_response(&reply, &request.tool.name, &self.model),
            }
        })
    }
}

/// Picks the translation backend from `--translator`, or from whichever API
/// key is present, falling back to a LibreTranslate server.
pub fn resolve_translator_selection(
    translator_arg: Option<&str>,
    override_key: Option<&str>,
) -> Result<TranslatorSelection> {
    match translator_arg {
        Some(value) => parse_translator_arg(value),
        None => Ok(default_translator_selection(override_key)),
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key {
        return Ok(key.to_string());
    }

    match provider {
        ProviderKind::OpenAI => get_env("OPENAI_API_KEY"),
        ProviderKind::Claude => get_env("ANTHROPIC_API_KEY"),
    }
    .ok_or_else(|| anyhow!("API key not found for provider {}", provider.as_str()))
}

fn default_translator_selection(override_key: Option<&str>) -> TranslatorSelection {
    if get_env("OPENAI_API_KEY").is_some() || override_key.is_some() {
        return TranslatorSelection::Llm {
            provider: ProviderKind::OpenAI,
            requested_model: None,
        };
    }
    if get_env("ANTHROPIC_API_KEY").is_some() {
        return TranslatorSelection::Llm {
            provider: ProviderKind::Claude,
            requested_model: None,
        };
    }
    TranslatorSelection::Libre { url: None }
}

pub fn parse_translator_arg(translator_arg: &str) -> Result<TranslatorSelection> {
    let raw = translator_arg.trim();
    if raw.is_empty() {
        return Err(anyhow!("translator argument is empty"));
    }

    let (name, rest) = match raw.split_once(':') {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|value| !value.is_empty())),
        None => (raw, None),
    };
    let name = name.trim().to_lowercase();

    if matches!(name.as_str(), "libre" | "libretranslate" | "argos") {
        return Ok(TranslatorSelection::Libre {
            url: rest.map(str::to_string),
        });
    }
    if let Some(provider) = provider_from_name(&name) {
        return Ok(TranslatorSelection::Llm {
            provider,
            requested_model: rest.map(str::to_string),
        });
    }

    Err(anyhow!(
        "unknown translator '{}'. Use openai[:model], claude[:model] or libre[:url]",
        raw
    ))
}

fn provider_from_name(name: &str) -> Option<ProviderKind> {
    match name {
        "openai" | "gpt" => Some(ProviderKind::OpenAI),
        "claude" | "anthropic" => Some(ProviderKind::Claude),
        _ => None,
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
