use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::providers::ToolSpec;

pub const TOOL_NAME: &str = "deliver_translation";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    pub source_lang: String,
    pub lang: String,
}

impl TranslateOptions {
    pub fn new(source_lang: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            source_lang: source_lang.into(),
            lang: lang.into(),
        }
    }

    pub fn is_auto_source(&self) -> bool {
        self.source_lang.trim().eq_ignore_ascii_case("auto")
    }
}

#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub translation: String,
    pub source_language: String,
    pub target_language: String,
}

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the translated paragraph with its language codes.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "translation": {"type": "string"},
                "source_language": {"type": "string"},
                "target_language": {"type": "string"}
            },
            "required": ["translation", "source_language", "target_language"]
        }),
    }
}

pub fn render_system_prompt(options: &TranslateOptions, tool_name: &str) -> Result<String> {
    let mut context = TeraContext::new();
    let source_lang = if options.is_auto_source() {
        "auto".to_string()
    } else {
        normalize_lang_code(&options.source_lang)
    };
    context.insert("source_lang", &source_lang);
    context.insert("target_lang", &normalize_lang_code(&options.lang));
    context.insert("tool_name", tool_name);

    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render system prompt")
}

pub fn parse_tool_args(value: Value, options: &TranslateOptions) -> Result<TranslationResult> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "invalid translation tool arguments")?;
    validate_tool_args(&args, options)?;

    Ok(TranslationResult {
        translation: args.translation.trim().to_string(),
        source_language: normalize_lang_code(&args.source_language),
        target_language: normalize_lang_code(&args.target_language),
    })
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    translation: String,
    source_language: String,
    target_language: String,
}

fn validate_tool_args(args: &ToolArgs, expected: &TranslateOptions) -> Result<()> {
    if args.translation.trim().is_empty() {
        return Err(anyhow!("translation is empty"));
    }
    if args.source_language.trim().is_empty() {
        return Err(anyhow!("source_language is empty"));
    }
    if args.target_language.trim().is_empty() {
        return Err(anyhow!("target_language is empty"));
    }

    if expected.is_auto_source() {
        if !is_lang_code(&args.source_language) {
            return Err(anyhow!(
                "source_language must be a language code when auto-detected (got '{}')",
                args.source_language
            ));
        }
    } else if !eq_insensitive(&args.source_language, &expected.source_lang) {
        return Err(anyhow!(
            "tool response source_language mismatch (expected '{}', got '{}')",
            expected.source_lang,
            args.source_language
        ));
    }

    if !eq_insensitive(&args.target_language, &expected.lang) {
        return Err(anyhow!(
            "tool response target_language mismatch (expected '{}', got '{}')",
            expected.lang,
            args.target_language
        ));
    }
    Ok(())
}

/// Accepts `ko`, `eng`, `zh-cn` or `zho-hant` shaped codes.
fn is_lang_code(code: &str) -> bool {
    let code = code.trim();
    let (base, suffix) = match code.split_once('-') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (code, None),
    };
    let base_ok = (2..=3).contains(&base.len()) && base.chars().all(|c| c.is_ascii_alphabetic());
    let suffix_ok = suffix
        .map(|value| (2..=4).contains(&value.len()) && value.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(true);
    base_ok && suffix_ok
}

fn normalize_lang_code(code: &str) -> String {
    code.trim().to_lowercase()
}

fn eq_insensitive(left: &str, right: &str) -> bool {
    left.trim().eq_ignore_ascii_case(right.trim())
}
