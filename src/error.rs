//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，所有可能失败的公开操作
//! （数据库、剪贴板、图片编码、配置加载）统一返回 `Result<T, AppError>`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - AI 错误（`ai::AiError`）留在 AI 模块内部：分类路径吞掉它，连接测试把它折叠成报告。
//!
//! 注意：重复内容、AI 调用失败、图片文件缺失都不是错误，
//! 它们在流水线内部被吸收为确定性的回退结果，不会出现在这里。

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 图片编码 / 解码失败
    #[error("图片处理失败: {0}")]
    Image(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 存储目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),

    /// 配置无效
    #[error("配置错误: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert_with_prefix() {
        fn read_missing() -> Result<(), AppError> {
            std::fs::read("/nonexistent/clipcat/file")?;
            Ok(())
        }

        let err = read_missing().expect_err("missing file");
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().starts_with("文件系统错误: "));
    }

    #[test]
    fn failed_connection_report_surfaces_as_config_error() {
        let report = crate::ai::test_connection("openai", "", None, std::time::Duration::from_secs(1));
        assert!(!report.ok);
        let err = AppError::Config(report.message.clone());
        assert_eq!(err.to_string(), format!("配置错误: {}", report.message));
    }
}
