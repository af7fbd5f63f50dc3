//! # 剪贴板分类历史 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  命令行 (clipcat)                         │
//! │   watch · list · show · copy · favorite · delete · ...   │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            库 (Rust)                              │
//! │                                                          │
//! │  ┌─ clipboard ── 来源契约 + 监控 (两个生产者 → 单消费者) │
//! │  │   ├─ fingerprint   SHA-256 内容指纹                    │
//! │  │   └─ save          PNG 编码与图片落盘                  │
//! │  │                                                       │
//! │  ├─ pipeline ─── 去重 → 分类 → 入库 → 通知               │
//! │  │                                                       │
//! │  ├─ categorize ─ 规则分类 + 图片路径识别                  │
//! │  ├─ ai ───────── 兜底分类 (none / openai / gemini)        │
//! │  │                                                       │
//! │  ├─ db ───────── SQLite (rusqlite) 历史库 + 设置表        │
//! │  ├─ settings     AI 设置 (设置表 → 环境变量 → 默认值)     │
//! │  ├─ config       目录与间隔配置 (config.json + 环境变量)  │
//! │  ├─ storage      图片存储目录                             │
//! │  └─ error ────── AppError (统一错误类型)                  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`categorize`] | 有序规则分类、图片引用识别、`Category` |
//! | [`ai`] | `CategoryProvider` 能力接口与 HTTP 提供方、连接测试 |
//! | [`clipboard`] | 剪贴板载荷、系统剪贴板、指纹、PNG 保存、监控循环 |
//! | [`pipeline`] | 一次快照到一条记录的采集流水线与回声抑制 |
//! | [`db`] | 历史记录 CRUD、收藏、清空、分类统计、设置表 |
//! | [`settings`] | AI 提供方、密钥与开关的读写 |
//! | [`config`] | 数据目录、数据库位置、轮询间隔、AI 超时 |
//! | [`storage`] | 图片存储目录的获取与占用统计 |

pub mod error;
pub mod ai;
pub mod categorize;
pub mod clipboard;
pub mod config;
pub mod db;
pub mod pipeline;
pub mod settings;
pub mod storage;
