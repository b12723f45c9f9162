use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ProviderResponse, ProviderUsage, ToolRequest};

pub(crate) const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub(super) const API_VERSION: &str = "2023-06-01";
const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
// a translated paragraph never gets near this
const MAX_TOKENS: u32 = 1024;

pub(super) fn endpoint() -> String {
    std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
}

pub(super) fn request_body(model: &str, request: &ToolRequest) -> Value {
    let tool = &request.tool;
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "system": request.system,
        "messages": [{"role": "user", "content": request.user}],
        "tools": [{
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.parameters
        }],
        "tool_choice": {"type": "tool", "name": tool.name}
    })
}

#[derive(Debug, Deserialize)]
struct Reply {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

pub(super) fn parse_response(body: &str, tool_name: &str, model: &str) -> Result<ProviderResponse> {
    let reply: Reply =
        serde_json::from_str(body).with_context(|| "failed to parse Claude reply")?;
    let args = reply
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlock::ToolUse { name, input } if name == tool_name => Some(input),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Claude did not call `{}`", tool_name))?;

    Ok(ProviderResponse {
        args,
        model: reply
            .model
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(model.to_string())),
        usage: reply.usage.map(|usage| ProviderUsage {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage
                .input_tokens
                .zip(usage.output_tokens)
                .map(|(input, output)| input + output),
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
        #[serde(rename = "type")]
        kind: Option<String>,
        message: Option<String>,
    }

    let Detail { kind, message } = serde_json::from_str::<Envelope>(body).ok()?.error;
    match (message, kind) {
        (Some(message), Some(kind)) => Some(format!("{} ({})", message, kind)),
        (Some(message), None) => Some(message),
        (None, kind) => kind,
    }
}
