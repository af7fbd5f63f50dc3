//! 剪贴板管理模块
//!
//! # 设计思路
//!
//! 统一管理剪贴板相关的核心能力：
//! - **载荷**：`ClipboardPayload` 表示一次剪贴板快照（文本或 RGBA 图片）
//! - **来源契约**：`ClipboardSource` 抽象"读取当前内容 / 写入内容"，
//!   系统实现 `SystemClipboard` 基于 `arboard`，测试可注入内存实现
//! - **指纹**：`fingerprint` 计算 SHA-256 内容指纹，作为唯一去重键
//! - **保存**：`save` 负责 PNG 编码与图片文件持久化
//! - **监控**：`listener` 将变化通知与定时轮询汇入同一条串行处理线程
//!
//! # 实现思路
//!
//! - 同时存在图片与文本时，优先走图片路径（与系统剪贴板 MIME 优先级一致）。
//! - `arboard::Clipboard` 在每个线程内按需创建并复用，不跨线程移动。
//! - Linux (X11 / Wayland) 上剪贴板内容由最后写入的进程提供，进程退出后内容随之消失。
//!   短命进程用 `SystemClipboard::holding` 写入，阻塞到别的程序接管剪贴板或超时。

pub mod fingerprint;
pub mod listener;
pub mod save;

use std::borrow::Cow;
use std::time::{Duration, Instant};

use crate::error::AppError;

pub use fingerprint::ContentFingerprint;
pub use listener::ClipboardMonitor;

/// RGBA8 像素缓冲区（`width * height * 4` 字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: usize,
    pub height: usize,
    pub bytes: Vec<u8>,
}

/// 一次剪贴板快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardPayload {
    Text(String),
    Image(RawImage),
}

/// 剪贴板来源契约
///
/// - `read`：拉取当前内容；没有可用内容时返回 `Ok(None)`
/// - `write`：复制回剪贴板（copy-out）
pub trait ClipboardSource {
    fn read(&mut self) -> Result<Option<ClipboardPayload>, AppError>;

    fn write(&mut self, payload: &ClipboardPayload) -> Result<(), AppError>;
}

/// 基于 `arboard` 的系统剪贴板
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
    hold: Option<Duration>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入后在 Linux 上继续持有剪贴板，直到被其他内容替换或经过 `hold`
    ///
    /// 其他平台由系统保存内容，`hold` 不起作用。
    pub fn holding(hold: Duration) -> Self {
        Self {
            inner: None,
            hold: Some(hold),
        }
    }

    /// 写入的持有截止时间；`None` 表示写完立即返回
    pub fn hold_deadline(&self, now: Instant) -> Option<Instant> {
        self.hold.filter(|hold| !hold.is_zero()).map(|hold| now + hold)
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard, AppError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| AppError::Clipboard(format!("打开剪贴板失败: {}", e)))?;
            self.inner = Some(clipboard);
        }
        self.inner
            .as_mut()
            .ok_or_else(|| AppError::Clipboard("剪贴板不可用".to_string()))
    }
}

impl ClipboardSource for SystemClipboard {
    fn read(&mut self) -> Result<Option<ClipboardPayload>, AppError> {
        let clipboard = self.clipboard()?;

        match clipboard.get_image() {
            Ok(image) => {
                return Ok(Some(ClipboardPayload::Image(RawImage {
                    width: image.width,
                    height: image.height,
                    bytes: image.bytes.into_owned(),
                })));
            }
            Err(arboard::Error::ContentNotAvailable) => {}
            Err(e) => log::debug!("读取剪贴板图片失败，尝试文本: {}", e),
        }

        match clipboard.get_text() {
            Ok(text) => Ok(Some(ClipboardPayload::Text(text))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => {
                // 连接可能已失效，下次重新打开
                self.inner = None;
                Err(AppError::Clipboard(format!("读取剪贴板文本失败: {}", e)))
            }
        }
    }

    fn write(&mut self, payload: &ClipboardPayload) -> Result<(), AppError> {
        let deadline = self.hold_deadline(Instant::now());
        let clipboard = self.clipboard()?;

        #[cfg(target_os = "linux")]
        let set = {
            use arboard::SetExtLinux;
            match deadline {
                Some(deadline) => {
                    log::debug!(
                        "持有剪贴板直到被替换，最长 {:?}",
                        deadline.saturating_duration_since(Instant::now())
                    );
                    clipboard.set().wait_until(deadline)
                }
                None => clipboard.set(),
            }
        };
        #[cfg(not(target_os = "linux"))]
        let set = {
            let _ = deadline;
            clipboard.set()
        };

        let result = match payload {
            ClipboardPayload::Text(text) => set.text(text.as_str()),
            ClipboardPayload::Image(image) => set.image(arboard::ImageData {
                width: image.width,
                height: image.height,
                bytes: Cow::Borrowed(&image.bytes),
            }),
        };
        result.map_err(|e| AppError::Clipboard(format!("写入剪贴板失败: {}", e)))
    }
}
