//! 内容指纹
//!
//! 对规范字节（文本：去首尾空白后的 UTF-8；图片：PNG 编码字节）计算 SHA-256，
//! 以 64 位小写十六进制字符串保存。它是去重的唯一依据，也是数据库的 UNIQUE 列。

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// 文本指纹总是基于去除首尾空白后的内容
    pub fn of_text(text: &str) -> Self {
        Self::of_bytes(text.trim().as_bytes())
    }

    /// 从数据库读回的十六进制字符串
    pub fn from_hex(hex: impl Into<String>) -> Option<Self> {
        let hex = hex.into();
        let valid = hex.len() == 64 && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then_some(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 前 8 位，用于文件名与日志
    pub fn short(&self) -> &str {
        &self.0[..8]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
