use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ProviderResponse, ProviderUsage, ToolRequest};

pub(crate) const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub(super) fn endpoint() -> String {
    let base = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    format!("{}/chat/completions", base.trim_end_matches('/'))
}

/// Chat completions body that forces a call to the request's tool.
pub(super) fn request_body(model: &str, request: &ToolRequest) -> Value {
    let tool = &request.tool;
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.user}
        ],
        "tools": [{
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters
            }
        }],
        "tool_choice": {"type": "function", "function": {"name": tool.name}}
    })
}

#[derive(Debug, Deserialize)]
struct Completion {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    // JSON encoded as a string
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

pub(super) fn parse_response(body: &str, tool_name: &str, model: &str) -> Result<ProviderResponse> {
    let completion: Completion =
        serde_json::from_str(body).with_context(|| "failed to parse OpenAI completion")?;
    let call = completion
        .choices
        .iter()
        .flat_map(|choice| &choice.message.tool_calls)
        .find(|call| call.function.name == tool_name)
        .ok_or_else(|| anyhow!("OpenAI did not call `{}`", tool_name))?;
    let args = serde_json::from_str(&call.function.arguments)
        .with_context(|| format!("`{}` arguments are not valid JSON", tool_name))?;

    Ok(ProviderResponse {
        args,
        model: completion
            .model
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(model.to_string())),
        usage: completion.usage.map(|usage| ProviderUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }),
    })
}

pub(super) fn describe_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        message: Option<String>,
        code: Option<String>,
    }

    let Detail { message, code } = serde_json::from_str::<Envelope>(body).ok()?.error;
    match (message, code) {
        (Some(message), Some(code)) => Some(format!("{} ({})", message, code)),
        (Some(message), None) => Some(message),
        (None, code) => code,
    }
}
