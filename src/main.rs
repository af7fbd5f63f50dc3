//! # 剪贴板分类历史 — 命令行入口
//!
//! 本文件只负责参数解析与命令分发，业务逻辑见 `lib.rs` 架构文档。
//!
//! | 命令 | 说明 |
//! |------|------|
//! | `clipcat watch` | 监控剪贴板，去重、分类并入库，Ctrl+C 停止 |
//! | `clipcat list` | 按分类 / 关键字 / 收藏过滤历史 |
//! | `clipcat show <id>` | 以 JSON 输出单条记录 |
//! | `clipcat copy <id>` | 把记录写回剪贴板；Linux 下持有到其他程序接管或 `--hold-secs` 超时 |
//! | `clipcat favorite <id>` | 切换收藏 |
//! | `clipcat delete <id>` / `clear` | 删除单条 / 清空未收藏记录 |
//! | `clipcat stats` | 总数、今日、收藏、分类分布、图片目录占用 |
//! | `clipcat classify <text>` | 只分类不入库 |
//! | `clipcat config ...` | AI 提供方、密钥、开关 |
//! | `clipcat test-connection <provider>` | 校验 AI 提供方配置 |

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};

use clipboard_categorizer::ai::{self, AiClassifier, AiProviderKind};
use clipboard_categorizer::categorize::{self, Category};
use clipboard_categorizer::clipboard::{ClipboardMonitor, ClipboardSource, SystemClipboard};
use clipboard_categorizer::config::AppConfig;
use clipboard_categorizer::db::{ContentType, HistoryDb, HistoryFilter, HistoryRecord};
use clipboard_categorizer::error::AppError;
use clipboard_categorizer::pipeline::IngestPipeline;
use clipboard_categorizer::settings::{self, AiSettings};
use clipboard_categorizer::storage;

const PREVIEW_CHARS: usize = 60;

/// 剪贴板历史：自动去重并按内容分类
#[derive(Parser)]
#[command(name = "clipcat", version, about = "Clipboard history with automatic categorization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 监控剪贴板直到 Ctrl+C
    Watch {
        /// 只靠定时轮询，不订阅系统变化通知
        #[arg(long)]
        poll_only: bool,
    },

    /// 列出历史记录（最新在前）
    List {
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        favorites: bool,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// 输出 JSON
        #[arg(long)]
        json: bool,
    },

    Show { id: i64 },

    /// 把记录复制回剪贴板
    Copy {
        id: i64,
        /// Linux 下写入后持有剪贴板的最长秒数（0 表示写完立即退出）
        #[arg(long, default_value_t = 60)]
        hold_secs: u64,
    },

    /// 切换收藏
    Favorite { id: i64 },

    Delete { id: i64 },

    /// 删除所有未收藏记录
    Clear,

    Stats,

    /// 对文本分类但不入库
    Classify {
        text: String,
        /// 规则结果为 text 时请求已配置的 AI 提供方
        #[arg(long)]
        ai: bool,
    },

    /// AI 分类设置
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// 测试 AI 提供方连接
    TestConnection {
        provider: String,
        /// 缺省时使用已保存的密钥
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 显示当前设置（密钥打码）
    Show,
    /// none | openai | gemini
    SetProvider { provider: AiProviderKind },
    SetKey { provider: AiProviderKind, key: String },
    /// 是否在规则结果为 text 时使用 AI
    UseAi {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

struct AppContext {
    config: AppConfig,
    images_dir: PathBuf,
    db: Arc<HistoryDb>,
}

impl AppContext {
    /// 数据库无法初始化时直接返回错误，由 `main` 以非零状态退出
    fn open() -> Result<Self, AppError> {
        let config = AppConfig::load()?;
        let images_dir = storage::get_images_dir(&config.data_dir, Some(&config.images_dir))?;
        let db = HistoryDb::open(&config.db_path, Some(images_dir.clone()))?;
        Ok(Self {
            config,
            images_dir,
            db: Arc::new(db),
        })
    }

    fn ai_settings(&self) -> Result<AiSettings, AppError> {
        AiSettings::load(&self.db)
    }

    fn pipeline(&self) -> Result<Arc<IngestPipeline>, AppError> {
        let settings = self.ai_settings()?;
        let ai = AiClassifier::from_settings(&settings, self.config.ai_timeout);
        Ok(Arc::new(IngestPipeline::new(
            Arc::clone(&self.db),
            self.images_dir.clone(),
            ai,
            settings.use_ai,
        )))
    }

    fn record(&self, id: i64) -> Result<HistoryRecord, AppError> {
        self.db
            .get(id)?
            .ok_or_else(|| AppError::Storage(format!("记录 #{} 不存在", id)))
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            eprintln!("错误: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), AppError> {
    let app = AppContext::open()?;

    match command {
        Commands::Watch { poll_only } => watch(&app, !poll_only),
        Commands::List {
            category,
            search,
            favorites,
            limit,
            offset,
            json,
        } => {
            let filter = HistoryFilter {
                category,
                search_text: search,
                favorites_only: favorites,
                limit,
                offset,
            };
            let records = app.db.query(&filter)?;
            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("（没有记录）");
            } else {
                for record in &records {
                    println!("{}", format_row(record));
                }
            }
            Ok(())
        }
        Commands::Show { id } => print_json(&app.record(id)?),
        Commands::Copy { id, hold_secs } => {
            let record = app.record(id)?;
            let pipeline = app.pipeline()?;
            let mut clipboard = SystemClipboard::holding(Duration::from_secs(hold_secs));
            if cfg!(target_os = "linux") && hold_secs > 0 {
                println!("正在持有剪贴板（最长 {}s），其他程序复制后自动退出", hold_secs);
            }
            pipeline.copy_to_clipboard(&record, &mut clipboard)?;
            println!("已复制 #{}", id);
            Ok(())
        }
        Commands::Favorite { id } => {
            if !app.db.toggle_favorite(id)? {
                return Err(AppError::Storage(format!("记录 #{} 不存在", id)));
            }
            let record = app.record(id)?;
            println!("#{} {}", id, if record.is_favorite { "★ 已收藏" } else { "☆ 已取消收藏" });
            Ok(())
        }
        Commands::Delete { id } => {
            if app.db.delete(id)? {
                println!("已删除 #{}", id);
                Ok(())
            } else {
                Err(AppError::Storage(format!("记录 #{} 不存在", id)))
            }
        }
        Commands::Clear => {
            let removed = app.db.clear_non_favorites()?;
            println!("已清除 {} 条未收藏记录", removed);
            Ok(())
        }
        Commands::Stats => print_stats(&app),
        Commands::Classify { text, ai } => {
            let classifier = if ai {
                AiClassifier::from_settings(&app.ai_settings()?, app.config.ai_timeout)
            } else {
                AiClassifier::disabled()
            };
            let category = categorize::categorize(&text, ai, &classifier);
            println!("{} {}", category.icon(), category);
            Ok(())
        }
        Commands::Config { action } => configure(&app, action),
        Commands::TestConnection { provider, key, model } => {
            let settings = app.ai_settings()?;
            let kind = provider.parse::<AiProviderKind>().unwrap_or_default();
            let api_key = key
                .or_else(|| match kind {
                    AiProviderKind::OpenAi => settings.openai_api_key.clone(),
                    AiProviderKind::Gemini => settings.gemini_api_key.clone(),
                    AiProviderKind::None => None,
                })
                .unwrap_or_default();
            let model = model.or_else(|| match kind {
                AiProviderKind::OpenAi => settings.openai_model.clone(),
                AiProviderKind::Gemini => settings.gemini_model.clone(),
                AiProviderKind::None => None,
            });

            let report = ai::test_connection(&provider, &api_key, model, app.config.ai_timeout);
            println!("{} {}", if report.ok { "✅" } else { "❌" }, report.message);
            if report.ok {
                Ok(())
            } else {
                Err(AppError::Config(report.message))
            }
        }
    }
}

fn watch(app: &AppContext, listen_for_changes: bool) -> Result<(), AppError> {
    let pipeline = app.pipeline()?;
    let added = pipeline.subscribe();

    thread::spawn(move || {
        for item in added {
            println!("{} #{} {}", item.category.icon(), item.id, item.category);
        }
    });

    let monitor = ClipboardMonitor::start(
        Arc::clone(&pipeline),
        || Box::new(SystemClipboard::new()) as Box<dyn ClipboardSource>,
        app.config.poll_interval,
        listen_for_changes,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    log::info!("收到停止信号，等待当前采集完成");
    monitor.stop();
    Ok(())
}

fn configure(app: &AppContext, action: ConfigAction) -> Result<(), AppError> {
    match action {
        ConfigAction::Show => {
            let settings = app.ai_settings()?;
            println!("provider     : {}", settings.provider);
            println!("use_ai       : {}", settings.use_ai);
            println!("openai key   : {}", mask_key(settings.openai_api_key.as_deref()));
            println!("gemini key   : {}", mask_key(settings.gemini_api_key.as_deref()));
            println!("openai model : {}", settings.openai_model.as_deref().unwrap_or("(默认)"));
            println!("gemini model : {}", settings.gemini_model.as_deref().unwrap_or("(默认)"));
            println!("数据库       : {}", app.config.db_path.display());
            println!("图片目录     : {}", app.images_dir.display());
        }
        ConfigAction::SetProvider { provider } => {
            settings::save_provider(&app.db, provider)?;
            println!("AI 提供方已设为 {}", provider);
        }
        ConfigAction::SetKey { provider, key } => {
            settings::save_api_key(&app.db, provider, &key)?;
            println!("{} 密钥已保存", provider);
        }
        ConfigAction::UseAi { enabled } => {
            settings::save_use_ai(&app.db, enabled)?;
            println!("AI 分类已{}", if enabled { "启用" } else { "停用" });
        }
    }
    Ok(())
}

fn print_stats(app: &AppContext) -> Result<(), AppError> {
    let stats = app.db.stats()?;
    let counts = app.db.category_counts()?;
    let images = storage::images_dir_info(&app.images_dir);

    println!("总数 {} · 今日 {} · 收藏 {}", stats.total, stats.today, stats.favorites);
    for category in Category::ALL {
        let count = counts.get(&category).copied().unwrap_or(0);
        if count > 0 {
            println!("  {} {:<9} {}", category.icon(), category.as_str(), count);
        }
    }
    println!(
        "图片目录 {}（{} 个文件，{:.1} KB）",
        images.path,
        images.file_count,
        images.total_size as f64 / 1024.0
    );
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Storage(format!("序列化输出失败: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn format_row(record: &HistoryRecord) -> String {
    let time = DateTime::from_timestamp_millis(record.created_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();

    let preview = match record.content_type {
        ContentType::Text => record.content.as_deref().unwrap_or_default(),
        ContentType::Image => record
            .image_path
            .as_deref()
            .or(record.content.as_deref())
            .unwrap_or_default(),
    };
    let first_line = preview.lines().next().unwrap_or_default();
    let mut short: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if first_line.chars().count() > PREVIEW_CHARS || preview.lines().nth(1).is_some() {
        short.push('…');
    }

    format!(
        "#{:<5} {} {:<9} {} {}  {}",
        record.id,
        record.category.icon(),
        record.category.as_str(),
        if record.is_favorite { "★" } else { " " },
        time,
        short
    )
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        None => "(未设置)".to_string(),
        Some(key) if key.chars().count() <= 8 => "****".to_string(),
        Some(key) => {
            let head: String = key.chars().take(4).collect();
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            format!("{}…{}", head, tail)
        }
    }
}
