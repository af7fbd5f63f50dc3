//! 采集流水线
//!
//! # 设计思路
//!
//! 把一次剪贴板快照变成"恰好一条"已分类的历史记录：
//!
//! ```text
//! 读取 → 规范化 → 指纹 → 内存去重 → 持久去重 → 分类 → 图片引用解析 → 入库 → 通知
//! ```
//!
//! - **内存去重**：单槽 `last_seen`，属于流水线实例，监控启动时清空；
//!   只在成功入库或识别为重复时更新。
//! - **持久去重**：先查 `exists`，插入时的 UNIQUE 冲突也按"已存在"处理。
//! - **回声抑制**：复制回剪贴板之前先把 `last_seen` 设为即将写入内容的指纹，
//!   由此产生的剪贴板变化会被内存去重直接吸收。
//!
//! # 错误语义
//!
//! 重复内容、AI 失败、图片引用失效都不是错误；
//! 只有存储层或图片编码失败会返回 `AppError`，由调用方记录日志。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde::Serialize;

use crate::ai::AiClassifier;
use crate::categorize::{self, Category};
use crate::clipboard::save::{encode_png, load_rgba, save_png};
use crate::clipboard::{ClipboardPayload, ClipboardSource, ContentFingerprint, RawImage};
use crate::db::{ContentType, HistoryDb, HistoryRecord, InsertOutcome, NewRecord};
use crate::error::AppError;

/// 新记录入库后发给订阅者的通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryAdded {
    pub id: i64,
    pub category: Category,
    pub content_type: ContentType,
}

/// 一次采集的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// 剪贴板为空，或文本去除空白后为空
    Empty,
    /// 与上一次看到的内容相同
    SeenRecently,
    /// 历史库中已有相同指纹
    AlreadyStored,
    Inserted(HistoryAdded),
}

pub struct IngestPipeline {
    db: Arc<HistoryDb>,
    images_dir: PathBuf,
    ai: RwLock<AiClassifier>,
    use_ai: AtomicBool,
    last_seen: Mutex<Option<ContentFingerprint>>,
    subscribers: Mutex<Vec<Sender<HistoryAdded>>>,
}

impl IngestPipeline {
    pub fn new(db: Arc<HistoryDb>, images_dir: PathBuf, ai: AiClassifier, use_ai: bool) -> Self {
        Self {
            db,
            images_dir,
            ai: RwLock::new(ai),
            use_ai: AtomicBool::new(use_ai),
            last_seen: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn set_use_ai(&self, use_ai: bool) {
        self.use_ai.store(use_ai, Ordering::SeqCst);
    }

    /// 替换 AI 分类器（例如设置变更后）
    pub fn set_ai_classifier(&self, ai: AiClassifier) {
        let mut guard = match self.ai.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = ai;
    }

    fn last_seen_slot(&self) -> MutexGuard<'_, Option<ContentFingerprint>> {
        match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("last_seen 锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    pub fn last_seen(&self) -> Option<ContentFingerprint> {
        self.last_seen_slot().clone()
    }

    /// 新的监控会话开始时调用
    pub fn reset_last_seen(&self) {
        *self.last_seen_slot() = None;
    }

    fn remember(&self, fingerprint: ContentFingerprint) {
        *self.last_seen_slot() = Some(fingerprint);
    }

    /// 订阅新记录通知；接收端被丢弃后自动退订
    pub fn subscribe(&self) -> Receiver<HistoryAdded> {
        let (tx, rx) = mpsc::channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    fn notify(&self, added: &HistoryAdded) {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(added.clone()).is_ok());
    }

    /// 从剪贴板读取一次快照并采集
    pub fn check_clipboard(&self, source: &mut dyn ClipboardSource) -> Result<IngestOutcome, AppError> {
        match source.read()? {
            Some(payload) => self.ingest(payload),
            None => Ok(IngestOutcome::Empty),
        }
    }

    pub fn ingest(&self, payload: ClipboardPayload) -> Result<IngestOutcome, AppError> {
        match payload {
            ClipboardPayload::Text(text) => self.ingest_text(&text),
            ClipboardPayload::Image(image) => self.ingest_image(&image),
        }
    }

    /// 两道去重关卡；返回 `Some` 表示到此为止
    fn dedup_gate(&self, fingerprint: &ContentFingerprint) -> Result<Option<IngestOutcome>, AppError> {
        if self.last_seen_slot().as_ref() == Some(fingerprint) {
            return Ok(Some(IngestOutcome::SeenRecently));
        }

        if self.db.exists(fingerprint)? {
            log::debug!("指纹 {} 已在历史中", fingerprint.short());
            self.remember(fingerprint.clone());
            return Ok(Some(IngestOutcome::AlreadyStored));
        }

        Ok(None)
    }

    fn classify(&self, text: &str) -> Category {
        let use_ai = self.use_ai.load(Ordering::SeqCst);
        let ai = match self.ai.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        categorize::categorize(text, use_ai, &ai)
    }

    fn ingest_text(&self, raw: &str) -> Result<IngestOutcome, AppError> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(IngestOutcome::Empty);
        }

        let fingerprint = ContentFingerprint::of_text(text);
        if let Some(outcome) = self.dedup_gate(&fingerprint)? {
            return Ok(outcome);
        }

        let record = match self.classify(text) {
            Category::Image => resolve_image_reference(text, fingerprint),
            category => NewRecord::text(text, fingerprint, category),
        };
        self.persist(record)
    }

    fn ingest_image(&self, image: &RawImage) -> Result<IngestOutcome, AppError> {
        if image.width == 0 || image.height == 0 || image.bytes.is_empty() {
            return Ok(IngestOutcome::Empty);
        }

        let png = encode_png(image)?;
        let fingerprint = ContentFingerprint::of_bytes(&png);
        if let Some(outcome) = self.dedup_gate(&fingerprint)? {
            return Ok(outcome);
        }

        self.store_image(fingerprint, &png)
    }

    /// 落盘并入库；入库没有成功时删除刚写下的文件
    fn store_image(&self, fingerprint: ContentFingerprint, png: &[u8]) -> Result<IngestOutcome, AppError> {
        let saved = save_png(&self.images_dir, &fingerprint, png)?;
        let outcome = self.persist(NewRecord::image(
            None,
            saved.to_string_lossy().to_string(),
            fingerprint,
        ));

        if !matches!(outcome, Ok(IngestOutcome::Inserted(_))) {
            if let Err(e) = fs::remove_file(&saved) {
                log::warn!("删除未入库的图片文件失败 '{}': {}", saved.display(), e);
            }
        }
        outcome
    }

    /// 入库；UNIQUE 冲突（另一个写入者在去重检查之后抢先插入）按已存在处理
    fn persist(&self, record: NewRecord) -> Result<IngestOutcome, AppError> {
        match self.db.insert(&record)? {
            InsertOutcome::Inserted(id) => {
                self.remember(record.content_hash);
                let added = HistoryAdded {
                    id,
                    category: record.category,
                    content_type: record.content_type,
                };
                log::info!("📋 新记录 #{}（{} / {}）", id, added.content_type, added.category);
                self.notify(&added);
                Ok(IngestOutcome::Inserted(added))
            }
            InsertOutcome::AlreadyExists => {
                self.remember(record.content_hash);
                Ok(IngestOutcome::AlreadyStored)
            }
        }
    }

    /// 把历史记录写回剪贴板
    ///
    /// 写入前先标记 `last_seen`，写入失败时恢复原值。
    pub fn copy_to_clipboard(
        &self,
        record: &HistoryRecord,
        source: &mut dyn ClipboardSource,
    ) -> Result<(), AppError> {
        let (payload, fingerprint) = clipboard_payload_for(record)?;

        let previous = self.last_seen_slot().replace(fingerprint);
        if let Err(err) = source.write(&payload) {
            *self.last_seen_slot() = previous;
            return Err(err);
        }

        log::info!("📋 已复制记录 #{} 到剪贴板", record.id);
        Ok(())
    }
}

/// 文本被识别为图片引用时决定最终记录形态
///
/// 文件存在 → 图片记录（`content` 保留原文）；否则降级为 `url` 文本记录。
fn resolve_image_reference(text: &str, fingerprint: ContentFingerprint) -> NewRecord {
    let path = categorize::extract_path(text).unwrap_or_else(|| text.to_string());
    if Path::new(&path).is_file() {
        NewRecord::image(Some(text.to_string()), path, fingerprint)
    } else {
        log::debug!("图片引用不存在，按链接保存: {}", path);
        NewRecord::text(text, fingerprint, Category::Url)
    }
}

/// 计算写回剪贴板的载荷，以及它再次被采集时会得到的指纹
fn clipboard_payload_for(record: &HistoryRecord) -> Result<(ClipboardPayload, ContentFingerprint), AppError> {
    match record.content_type {
        ContentType::Text => {
            let text = record
                .content
                .clone()
                .ok_or_else(|| AppError::Storage(format!("记录 #{} 没有文本内容", record.id)))?;
            let fingerprint = ContentFingerprint::of_text(&text);
            Ok((ClipboardPayload::Text(text), fingerprint))
        }
        ContentType::Image => {
            let path = record
                .image_path
                .as_deref()
                .ok_or_else(|| AppError::Storage(format!("记录 #{} 没有图片路径", record.id)))?;
            let image = load_rgba(Path::new(path))?;
            let fingerprint = ContentFingerprint::of_bytes(&encode_png(&image)?);
            Ok((ClipboardPayload::Image(image), fingerprint))
        }
    }
}
