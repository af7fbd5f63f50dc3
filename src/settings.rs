//! AI 相关设置
//!
//! 设置保存在历史库的 `settings` 表中；表中缺失的键回退到环境变量
//! （`AI_PROVIDER`、`OPENAI_API_KEY`、`GEMINI_API_KEY`），再回退到内置默认值。

use crate::ai::AiProviderKind;
use crate::db::HistoryDb;
use crate::error::AppError;

pub const KEY_AI_PROVIDER: &str = "ai_provider";
pub const KEY_USE_AI: &str = "use_ai";
pub const KEY_OPENAI_API_KEY: &str = "openai_api_key";
pub const KEY_GEMINI_API_KEY: &str = "gemini_api_key";
pub const KEY_OPENAI_MODEL: &str = "openai_model";
pub const KEY_GEMINI_MODEL: &str = "gemini_model";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiSettings {
    pub provider: AiProviderKind,
    /// 未显式设置时，选择了提供方即视为启用
    pub use_ai: bool,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_model: Option<String>,
}

impl AiSettings {
    pub fn load(db: &HistoryDb) -> Result<Self, AppError> {
        Self::load_with(db, |name| std::env::var(name).ok())
    }

    /// `env` 用于注入环境变量来源（测试中不修改进程环境）
    pub fn load_with(db: &HistoryDb, env: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let lookup = |key: &str, env_name: Option<&str>| -> Result<Option<String>, AppError> {
            let stored = db.get_setting_opt(key)?;
            Ok(stored
                .or_else(|| env_name.and_then(&env))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };

        let provider_raw = lookup(KEY_AI_PROVIDER, Some("AI_PROVIDER"))?;
        let provider = match provider_raw.as_deref().map(str::parse::<AiProviderKind>) {
            None => AiProviderKind::None,
            Some(Ok(kind)) => kind,
            Some(Err(err)) => {
                log::warn!("{}，AI 分类已停用", err);
                AiProviderKind::None
            }
        };

        let use_ai = match lookup(KEY_USE_AI, None)? {
            Some(flag) => flag.eq_ignore_ascii_case("true") || flag == "1",
            None => provider != AiProviderKind::None,
        };

        Ok(Self {
            provider,
            use_ai,
            openai_api_key: lookup(KEY_OPENAI_API_KEY, Some("OPENAI_API_KEY"))?,
            gemini_api_key: lookup(KEY_GEMINI_API_KEY, Some("GEMINI_API_KEY"))?,
            openai_model: lookup(KEY_OPENAI_MODEL, None)?,
            gemini_model: lookup(KEY_GEMINI_MODEL, None)?,
        })
    }

    /// 当前提供方对应的密钥
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            AiProviderKind::OpenAi => self.openai_api_key.as_deref(),
            AiProviderKind::Gemini => self.gemini_api_key.as_deref(),
            AiProviderKind::None => None,
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self.provider {
            AiProviderKind::OpenAi => self.openai_model.as_deref(),
            AiProviderKind::Gemini => self.gemini_model.as_deref(),
            AiProviderKind::None => None,
        }
    }

    pub fn api_key_setting(provider: AiProviderKind) -> Option<&'static str> {
        match provider {
            AiProviderKind::OpenAi => Some(KEY_OPENAI_API_KEY),
            AiProviderKind::Gemini => Some(KEY_GEMINI_API_KEY),
            AiProviderKind::None => None,
        }
    }
}

pub fn save_provider(db: &HistoryDb, provider: AiProviderKind) -> Result<(), AppError> {
    db.set_setting(KEY_AI_PROVIDER, provider.as_str())
}

pub fn save_use_ai(db: &HistoryDb, use_ai: bool) -> Result<(), AppError> {
    db.set_setting(KEY_USE_AI, if use_ai { "true" } else { "false" })
}

pub fn save_api_key(db: &HistoryDb, provider: AiProviderKind, api_key: &str) -> Result<(), AppError> {
    let key = AiSettings::api_key_setting(provider)
        .ok_or_else(|| AppError::Config("提供方 none 不需要密钥".to_string()))?;
    db.set_setting(key, api_key.trim())
}
