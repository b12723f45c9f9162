use anyhow::{Context, Result};
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::providers::{
    self, ChatProvider, LibreTranslate, Provider, ProviderUsage, ToolRequest, TranslatorSelection,
};
use crate::translations::{self, TOOL_NAME, TranslateOptions, tool_spec};

pub type TranslateFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Translates one block of text. Called once per paragraph, never per word.
pub trait TextTranslator: Send + Sync {
    fn translate<'a>(&'a self, text: &'a str, options: &'a TranslateOptions)
    -> TranslateFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct Translator<P: Provider> {
    provider: P,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl<P: Provider> Translator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub async fn exec(&self, input: &str, options: &TranslateOptions) -> Result<ExecutionOutput> {
        let request = ToolRequest {
            system: translations::render_system_prompt(options, TOOL_NAME)?,
            user: input.to_string(),
            tool: tool_spec(TOOL_NAME),
        };
        let response = self.provider.call_tool(&request).await?;

        let parsed = translations::parse_tool_args(response.args, options)?;
        if let Some(usage) = &response.usage {
            debug!(
                "translated with {} ({:?} tokens)",
                response.model.as_deref().unwrap_or("unknown model"),
                usage.total_tokens
            );
        }
        Ok(ExecutionOutput {
            text: parsed.translation,
            model: response.model,
            usage: response.usage,
        })
    }
}

impl<P: Provider> TextTranslator for Translator<P> {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        options: &'a TranslateOptions,
    ) -> TranslateFuture<'a> {
        Box::pin(async move { Ok(self.exec(text, options).await?.text) })
    }
}

impl TextTranslator for LibreTranslate {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        options: &'a TranslateOptions,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            LibreTranslate::translate(self, text, &options.source_lang, &options.lang).await
        })
    }
}

/// Every backend `--translator` can select.
#[derive(Debug, Clone)]
pub enum AnyTranslator {
    Llm(Translator<ChatProvider>),
    Libre(LibreTranslate),
}

impl AnyTranslator {
    pub fn from_selection(
        selection: TranslatorSelection,
        override_key: Option<&str>,
        default_libre_url: Option<&str>,
    ) -> Result<Self> {
        match selection {
            TranslatorSelection::Llm {
                provider,
                requested_model,
            } => {
                let key = providers::resolve_key(provider, override_key)
                    .with_context(|| "no API key found for selected provider")?;
                Ok(AnyTranslator::Llm(Translator::new(ChatProvider::new(
                    provider,
                    key,
                    requested_model,
                ))))
            }
            TranslatorSelection::Libre { url } => {
                let url = url
                    .or_else(|| default_libre_url.map(str::to_string))
                    .unwrap_or_else(|| providers::DEFAULT_LIBRE_URL.to_string());
                Ok(AnyTranslator::Libre(
                    LibreTranslate::new(url).with_key(override_key.map(str::to_string)),
                ))
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            AnyTranslator::Llm(translator) => format!(
                "{} ({})",
                translator.provider.kind().as_str(),
                translator.provider.model()
            ),
            AnyTranslator::Libre(libre) => format!("libre ({})", libre.url()),
        }
    }
}

impl TextTranslator for AnyTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        options: &'a TranslateOptions,
    ) -> TranslateFuture<'a> {
        match self {
            AnyTranslator::Llm(translator) => translator.translate(text, options),
            AnyTranslator::Libre(libre) => TextTranslator::translate(libre, text, options),
        }
    }
}
