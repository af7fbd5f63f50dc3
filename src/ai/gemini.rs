//! Google Gemini generateContent 提供方

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{Value, json};

use super::{AiError, CategoryProvider, HttpTransport};

const ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    transport: HttpTransport,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(transport: HttpTransport, api_key: String, model: Option<String>) -> Self {
        Self {
            transport,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", ENDPOINT_BASE, self.model)
    }

    fn headers(&self) -> Result<HeaderMap, AiError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.api_key).map_err(|_| AiError::MissingApiKey)?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);
        Ok(headers)
    }
}

impl CategoryProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn send(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AiError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "maxOutputTokens": max_output_tokens,
                "temperature": 0,
            },
        });
        let reply = self.transport.post_json(&self.endpoint(), self.headers()?, &body)?;
        parse_reply(&reply)
    }
}

/// 拼接 `candidates[0].content.parts[*].text`
pub(crate) fn parse_reply(reply: &Value) -> Result<String, AiError> {
    let parts = reply
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| AiError::Malformed("缺少 candidates[0].content.parts".to_string()))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return Err(AiError::Malformed("回复中没有文本".to_string()));
    }
    Ok(text)
}
