//! # AI 分类兜底
//!
//! ## 设计思路
//!
//! 规则分类给出默认结果 `text` 时，可以交给外部大模型再判断一次。
//! 外部提供方被抽象为 `CategoryProvider` 能力接口，`none` 也是一个实现，
//! 因此流水线从不需要判断"当前是哪一家"。
//!
//! ## 错误语义
//!
//! `AiClassifier::classify` 永不向调用方报错：缺少密钥、网络失败、超时、
//! 回复格式不对，统统变成 `None`，调用方保留规则结果。
//! 只有显式的连接测试（`test_connection`）会把诊断信息带回给用户。

mod gemini;
mod openai;
mod transport;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use transport::HttpTransport;

use crate::categorize::Category;
use crate::settings::AiSettings;

/// 发送给提供方的文本最多保留的字符数
pub const MAX_PROMPT_CHARS: usize = 1000;
/// 分类回复只需要一个单词
pub const CLASSIFY_MAX_OUTPUT_TOKENS: u32 = 20;
const CONNECTION_TEST_MAX_OUTPUT_TOKENS: u32 = 5;

const CATEGORIZE_PROMPT: &str = "Analyze the following text and reply with exactly one category.

Categories:
- url: URLs and links
- email: email addresses
- code: program code or scripts
- phone: phone numbers
- filepath: file or directory paths
- text: general text that fits none of the above

Text:
{text}

Reply with the category name only (for example: code):";

/// AI 链路错误，只在本模块与连接测试中可见
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI 分类未启用")]
    Disabled,

    #[error("缺少 API 密钥")]
    MissingApiKey,

    #[error("未知的 AI 提供方: {0}")]
    UnknownProvider(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("请求超时（{0:?}）")]
    Timeout(Duration),

    #[error("提供方返回错误状态 {0}: {1}")]
    Status(u16, String),

    #[error("回复格式无法解析: {0}")]
    Malformed(String),
}

/// 外部分类能力
///
/// 实现方负责自己的超时；`send` 必须在有限时间内返回。
pub trait CategoryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }

    /// 以 temperature = 0 发送提示词，返回原始回复文本
    fn send(&self, prompt: &str, max_output_tokens: u32) -> Result<String, AiError>;
}

/// 永远没有答案的提供方
pub struct NoneProvider;

impl CategoryProvider for NoneProvider {
    fn name(&self) -> &'static str {
        "none"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn send(&self, _prompt: &str, _max_output_tokens: u32) -> Result<String, AiError> {
        Err(AiError::Disabled)
    }
}

/// 配置中可选的提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProviderKind {
    #[default]
    None,
    OpenAi,
    Gemini,
}

impl AiProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AiProviderKind::None => "none",
            AiProviderKind::OpenAi => "openai",
            AiProviderKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProviderKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(AiProviderKind::None),
            "openai" => Ok(AiProviderKind::OpenAi),
            "gemini" => Ok(AiProviderKind::Gemini),
            other => Err(AiError::UnknownProvider(other.to_string())),
        }
    }
}

/// AI 分类器：包装一个 `CategoryProvider`，把所有失败吸收为"无答案"
pub struct AiClassifier {
    provider: Box<dyn CategoryProvider>,
}

impl AiClassifier {
    pub fn disabled() -> Self {
        Self::with_provider(Box::new(NoneProvider))
    }

    pub fn with_provider(provider: Box<dyn CategoryProvider>) -> Self {
        Self { provider }
    }

    /// 按设置构建分类器；配置不完整时退化为 `none`
    pub fn from_settings(settings: &AiSettings, timeout: Duration) -> Self {
        match build_provider(
            settings.provider,
            settings.api_key().map(str::to_string),
            settings.model().map(str::to_string),
            timeout,
        ) {
            Ok(provider) => {
                log::info!("🤖 AI 分类提供方: {}", provider.name());
                Self::with_provider(provider)
            }
            Err(AiError::Disabled) => Self::disabled(),
            Err(err) => {
                log::warn!("AI 分类不可用，仅使用规则分类: {}", err);
                Self::disabled()
            }
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn is_active(&self) -> bool {
        self.provider.is_enabled()
    }

    /// 请求提供方给出类别；任何失败都返回 `None`
    pub fn classify(&self, text: &str) -> Option<Category> {
        if !self.is_active() {
            return None;
        }

        let prompt = build_prompt(text);
        match self.provider.send(&prompt, CLASSIFY_MAX_OUTPUT_TOKENS) {
            Ok(reply) => {
                let parsed = parse_category_reply(&reply);
                if parsed.is_none() {
                    log::debug!("AI 回复不是有效类别，忽略: {:?}", reply);
                }
                parsed
            }
            Err(AiError::Disabled) => None,
            Err(err) => {
                log::warn!("{} 分类失败: {}", self.provider.name(), err);
                None
            }
        }
    }
}

impl Default for AiClassifier {
    fn default() -> Self {
        Self::disabled()
    }
}

fn build_provider(
    kind: AiProviderKind,
    api_key: Option<String>,
    model: Option<String>,
    timeout: Duration,
) -> Result<Box<dyn CategoryProvider>, AiError> {
    let api_key = match kind {
        AiProviderKind::None => return Err(AiError::Disabled),
        _ => api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(AiError::MissingApiKey)?,
    };

    let transport = HttpTransport::new(timeout)?;
    let provider: Box<dyn CategoryProvider> = match kind {
        AiProviderKind::OpenAi => Box::new(OpenAiProvider::new(transport, api_key, model)),
        AiProviderKind::Gemini => Box::new(GeminiProvider::new(transport, api_key, model)),
        AiProviderKind::None => return Err(AiError::Disabled),
    };
    Ok(provider)
}

/// 截断到前 `MAX_PROMPT_CHARS` 个字符并填入提示词模板
pub(crate) fn build_prompt(text: &str) -> String {
    let truncated: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    CATEGORIZE_PROMPT.replace("{text}", &truncated)
}

/// 回复转小写后必须恰好是六个非图片类别之一
pub(crate) fn parse_category_reply(reply: &str) -> Option<Category> {
    let normalized = reply.trim().to_lowercase();
    Category::AI_ANSWERS
        .into_iter()
        .find(|category| category.as_str() == normalized)
}

/// 连接测试结果
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionReport {
    pub ok: bool,
    pub message: String,
}

/// 手动连接测试，仅用于校验配置，不在采集流程中调用
pub fn test_connection(
    provider: &str,
    api_key: &str,
    model: Option<String>,
    timeout: Duration,
) -> ConnectionReport {
    let kind = match provider.parse::<AiProviderKind>() {
        Ok(AiProviderKind::None) | Err(_) => {
            return ConnectionReport {
                ok: false,
                message: format!("不支持的提供方: {}", provider),
            };
        }
        Ok(kind) => kind,
    };

    let result = build_provider(kind, Some(api_key.to_string()), model, timeout)
        .and_then(|p| p.send("test", CONNECTION_TEST_MAX_OUTPUT_TOKENS));

    match result {
        Ok(_) => ConnectionReport {
            ok: true,
            message: "连接成功".to_string(),
        },
        Err(err) => ConnectionReport {
            ok: false,
            message: format!("连接失败: {}", err),
        },
    }
}
