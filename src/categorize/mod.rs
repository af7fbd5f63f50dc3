//! 内容分类模块
//!
//! # 设计思路
//!
//! 分类分两级：
//! - **规则分类**（`rules`）：有序的正则 / 启发式规则，纯函数、确定、总是有结果
//! - **AI 兜底**（`crate::ai`）：仅当规则给出默认结果 `text` 且启用了 AI 时才调用
//!
//! 图片路径识别单独放在 `image_path`，规则分类与流水线都会用到。

pub mod image_path;
pub mod rules;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ai::AiClassifier;

pub use image_path::{extract_path, is_image};
pub use rules::classify_by_rules;

/// 内容类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Url,
    Email,
    Code,
    Phone,
    Filepath,
    Image,
    Text,
}

impl Category {
    /// 展示顺序
    pub const ALL: [Category; 7] = [
        Category::Url,
        Category::Email,
        Category::Code,
        Category::Phone,
        Category::Filepath,
        Category::Image,
        Category::Text,
    ];

    /// AI 提供方允许返回的类别（不含 `image`）
    pub const AI_ANSWERS: [Category; 6] = [
        Category::Url,
        Category::Email,
        Category::Code,
        Category::Phone,
        Category::Filepath,
        Category::Text,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Url => "url",
            Category::Email => "email",
            Category::Code => "code",
            Category::Phone => "phone",
            Category::Filepath => "filepath",
            Category::Image => "image",
            Category::Text => "text",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Url => "🔗",
            Category::Email => "📧",
            Category::Code => "💻",
            Category::Phone => "📞",
            Category::Filepath => "📁",
            Category::Image => "🖼️",
            Category::Text => "📝",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("未知类别: {}", s))
    }
}

/// 完整分类：先规则，规则结果为 `text` 时再尝试 AI
///
/// AI 只有在 `use_ai` 为真且分类器处于激活状态时才会被调用；
/// AI 无结果时保留规则结果。
pub fn categorize(text: &str, use_ai: bool, ai: &AiClassifier) -> Category {
    let rule_category = classify_by_rules(text);
    if !use_ai || !ai.is_active() || rule_category != Category::Text {
        return rule_category;
    }

    match ai.classify(text) {
        Some(category) => {
            log::debug!("🤖 AI 分类结果: {}", category);
            category
        }
        None => rule_category,
    }
}
