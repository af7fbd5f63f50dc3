//! OpenAI Chat Completions 提供方

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use super::{AiError, CategoryProvider, HttpTransport};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiProvider {
    transport: HttpTransport,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(transport: HttpTransport, api_key: String, model: Option<String>) -> Self {
        Self {
            transport,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| AiError::MissingApiKey)?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

impl CategoryProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn send(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AiError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_output_tokens,
            "temperature": 0,
        });
        let reply = self.transport.post_json(ENDPOINT, self.headers()?, &body)?;
        parse_reply(&reply)
    }
}

/// 取 `choices[0].message.content`
pub(crate) fn parse_reply(reply: &Value) -> Result<String, AiError> {
    reply
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AiError::Malformed("缺少 choices[0].message.content".to_string()))
}
