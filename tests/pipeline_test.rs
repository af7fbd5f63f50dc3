// 采集流水线集成测试：去重、图片引用、回声抑制、监控循环
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clipboard_categorizer::ai::{AiClassifier, AiError, CategoryProvider};
use clipboard_categorizer::categorize::Category;
use clipboard_categorizer::clipboard::{
    ClipboardMonitor, ClipboardPayload, ClipboardSource, ContentFingerprint, RawImage,
};
use clipboard_categorizer::db::{ContentType, HistoryDb, HistoryFilter, HistoryRecord};
use clipboard_categorizer::error::AppError;
use clipboard_categorizer::pipeline::{HistoryAdded, IngestOutcome, IngestPipeline};

/// 内存剪贴板：读取返回最近写入的内容
#[derive(Clone, Default)]
struct MemoryClipboard {
    current: Arc<Mutex<Option<ClipboardPayload>>>,
    fail_writes: bool,
}

impl MemoryClipboard {
    fn with(payload: ClipboardPayload) -> Self {
        let clipboard = Self::default();
        clipboard.set(payload);
        clipboard
    }

    fn set(&self, payload: ClipboardPayload) {
        *self.current.lock().expect("lock clipboard") = Some(payload);
    }

    fn get(&self) -> Option<ClipboardPayload> {
        self.current.lock().expect("lock clipboard").clone()
    }
}

impl ClipboardSource for MemoryClipboard {
    fn read(&mut self) -> Result<Option<ClipboardPayload>, AppError> {
        Ok(self.get())
    }

    fn write(&mut self, payload: &ClipboardPayload) -> Result<(), AppError> {
        if self.fail_writes {
            return Err(AppError::Clipboard("写入被拒绝".to_string()));
        }
        self.set(payload.clone());
        Ok(())
    }
}

struct CountingProvider {
    reply: &'static str,
    calls: Arc<AtomicUsize>,
}

impl CategoryProvider for CountingProvider {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn send(&self, _prompt: &str, _max_output_tokens: u32) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.to_string())
    }
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("{}_{}", prefix, nanos));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn setup(prefix: &str) -> (Arc<HistoryDb>, PathBuf) {
    let images_dir = unique_temp_dir(prefix);
    let db = HistoryDb::open_in_memory()
        .expect("open db")
        .with_images_dir(images_dir.clone());
    (Arc::new(db), images_dir)
}

fn pipeline_for(db: &Arc<HistoryDb>, images_dir: &Path) -> IngestPipeline {
    IngestPipeline::new(Arc::clone(db), images_dir.to_path_buf(), AiClassifier::disabled(), false)
}

fn all_records(db: &HistoryDb) -> Vec<HistoryRecord> {
    db.query(&HistoryFilter::default()).expect("query")
}

fn expect_inserted(outcome: IngestOutcome) -> HistoryAdded {
    match outcome {
        IngestOutcome::Inserted(added) => added,
        other => panic!("expected insert, got {:?}", other),
    }
}

fn text(value: &str) -> ClipboardPayload {
    ClipboardPayload::Text(value.to_string())
}

fn checkerboard() -> RawImage {
    let mut bytes = Vec::new();
    for i in 0..16 {
        if i % 2 == 0 {
            bytes.extend_from_slice(&[255, 0, 0, 255]);
        } else {
            bytes.extend_from_slice(&[0, 0, 255, 128]);
        }
    }
    RawImage {
        width: 4,
        height: 4,
        bytes,
    }
}

#[test]
fn same_text_twice_stores_once_and_notifies_once() {
    let (db, images_dir) = setup("clipcat_dedup");
    let pipeline = pipeline_for(&db, &images_dir);
    let added = pipeline.subscribe();

    let outcome = pipeline.ingest(text("  hello there ")).expect("first ingest");
    let first = expect_inserted(outcome);
    assert_eq!(first.category, Category::Text);
    assert_eq!(first.content_type, ContentType::Text);

    assert_eq!(pipeline.ingest(text("hello there")).expect("second"), IngestOutcome::SeenRecently);

    let records = all_records(&db);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content.as_deref(), Some("hello there"));
    assert_eq!(added.try_iter().count(), 1);

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn durable_gate_catches_content_from_earlier_session() {
    let (db, images_dir) = setup("clipcat_durable");
    pipeline_for(&db, &images_dir)
        .ingest(text("user@example.com"))
        .expect("seed");

    let pipeline = pipeline_for(&db, &images_dir);
    let added = pipeline.subscribe();
    assert_eq!(pipeline.last_seen(), None);

    assert_eq!(
        pipeline.ingest(text("user@example.com")).expect("ingest"),
        IngestOutcome::AlreadyStored
    );
    assert_eq!(pipeline.last_seen(), Some(ContentFingerprint::of_text("user@example.com")));
    assert_eq!(pipeline.ingest(text("user@example.com")).expect("again"), IngestOutcome::SeenRecently);
    assert_eq!(all_records(&db).len(), 1);
    assert!(added.try_recv().is_err());

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn empty_clipboard_and_blank_text_are_ignored() {
    let (db, images_dir) = setup("clipcat_empty");
    let pipeline = pipeline_for(&db, &images_dir);

    let mut empty = MemoryClipboard::default();
    assert_eq!(pipeline.check_clipboard(&mut empty).expect("check"), IngestOutcome::Empty);
    assert_eq!(pipeline.ingest(text(" \n\t ")).expect("blank"), IngestOutcome::Empty);
    assert!(all_records(&db).is_empty());
    assert_eq!(pipeline.last_seen(), None);

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn missing_image_reference_is_stored_as_url_text() {
    let (db, images_dir) = setup("clipcat_missing_ref");
    let pipeline = pipeline_for(&db, &images_dir);
    let reference = "file:///tmp/clipcat-definitely-missing-4f1c.png";

    let outcome = pipeline.ingest(text(reference)).expect("ingest");
    let added = expect_inserted(outcome);
    assert_eq!(added.content_type, ContentType::Text);
    assert_eq!(added.category, Category::Url);

    let record = db.get(added.id).expect("get").expect("record");
    assert_eq!(record.content.as_deref(), Some(reference));
    assert_eq!(record.image_path, None);

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn existing_image_reference_is_stored_as_image_record() {
    let (db, images_dir) = setup("clipcat_existing_ref");
    let user_dir = unique_temp_dir("clipcat_user_pictures");
    let picture = user_dir.join("screenshot.png");
    fs::write(&picture, b"not really a png").expect("write picture");

    let pipeline = pipeline_for(&db, &images_dir);
    let reference = format!("file://{}", picture.display());
    let outcome = pipeline.ingest(text(&reference)).expect("ingest");
    let added = expect_inserted(outcome);
    assert_eq!(added.content_type, ContentType::Image);
    assert_eq!(added.category, Category::Image);

    let record = db.get(added.id).expect("get").expect("record");
    assert_eq!(record.image_path.as_deref(), Some(&*picture.to_string_lossy()));
    assert_eq!(record.content.as_deref(), Some(reference.as_str()));
    assert_eq!(record.content_hash, ContentFingerprint::of_text(&reference));

    // 删除引用记录不会删除用户自己的文件
    assert!(db.delete(added.id).expect("delete"));
    assert!(picture.exists());

    let _ = fs::remove_dir_all(&images_dir);
    let _ = fs::remove_dir_all(&user_dir);
}

#[test]
fn image_payload_is_saved_once_with_stable_fingerprint() {
    let (db, images_dir) = setup("clipcat_image_payload");
    let pipeline = pipeline_for(&db, &images_dir);

    let outcome = pipeline
        .ingest(ClipboardPayload::Image(checkerboard()))
        .expect("ingest image");
    let added = expect_inserted(outcome);
    assert_eq!(added.category, Category::Image);

    let record = db.get(added.id).expect("get").expect("record");
    let saved = PathBuf::from(record.image_path.clone().expect("image path"));
    assert!(saved.is_file());
    assert_eq!(saved.parent(), Some(images_dir.as_path()));
    assert_eq!(record.content, None);

    // 新会话再次看到相同像素：持久去重吸收，不会再写文件
    let next_session = pipeline_for(&db, &images_dir);
    assert_eq!(
        next_session
            .ingest(ClipboardPayload::Image(checkerboard()))
            .expect("ingest again"),
        IngestOutcome::AlreadyStored
    );
    assert_eq!(next_session.last_seen(), Some(record.content_hash.clone()));
    assert_eq!(fs::read_dir(&images_dir).expect("read dir").count(), 1);

    // 删除记录时清理生成的图片
    assert!(db.delete(record.id).expect("delete"));
    assert!(!saved.exists());

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn invalid_image_buffer_is_an_error_not_a_record() {
    let (db, images_dir) = setup("clipcat_bad_image");
    let pipeline = pipeline_for(&db, &images_dir);

    let broken = RawImage {
        width: 3,
        height: 3,
        bytes: vec![0; 7],
    };
    assert!(pipeline.ingest(ClipboardPayload::Image(broken)).is_err());
    assert!(all_records(&db).is_empty());

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn copy_out_is_not_captured_again() {
    let (db, images_dir) = setup("clipcat_copy_out");
    let pipeline = pipeline_for(&db, &images_dir);

    let IngestOutcome::Inserted(first) = pipeline.ingest(text("copy me back")).expect("first") else {
        panic!("expected insert");
    };
    pipeline.ingest(text("something newer")).expect("second");

    let added = pipeline.subscribe();
    let mut clipboard = MemoryClipboard::with(text("something newer"));
    let record = db.get(first.id).expect("get").expect("record");

    pipeline.copy_to_clipboard(&record, &mut clipboard).expect("copy out");
    assert_eq!(clipboard.get(), Some(text("copy me back")));
    assert_eq!(pipeline.last_seen(), Some(record.content_hash.clone()));

    assert_eq!(pipeline.check_clipboard(&mut clipboard).expect("check"), IngestOutcome::SeenRecently);
    assert_eq!(all_records(&db).len(), 2);
    assert!(added.try_recv().is_err());

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn copy_out_image_is_not_captured_again() {
    let (db, images_dir) = setup("clipcat_copy_out_image");
    let pipeline = pipeline_for(&db, &images_dir);

    let IngestOutcome::Inserted(added) = pipeline
        .ingest(ClipboardPayload::Image(checkerboard()))
        .expect("ingest image")
    else {
        panic!("expected insert");
    };
    pipeline.ingest(text("later text")).expect("text");

    let record = db.get(added.id).expect("get").expect("record");
    let mut clipboard = MemoryClipboard::default();
    pipeline.copy_to_clipboard(&record, &mut clipboard).expect("copy out");

    assert_eq!(clipboard.get(), Some(ClipboardPayload::Image(checkerboard())));
    assert_eq!(pipeline.check_clipboard(&mut clipboard).expect("check"), IngestOutcome::SeenRecently);
    assert_eq!(all_records(&db).len(), 2);

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn failed_copy_out_restores_last_seen() {
    let (db, images_dir) = setup("clipcat_copy_fail");
    let pipeline = pipeline_for(&db, &images_dir);

    let IngestOutcome::Inserted(first) = pipeline.ingest(text("first")).expect("first") else {
        panic!("expected insert");
    };
    pipeline.ingest(text("second")).expect("second");

    let mut clipboard = MemoryClipboard {
        fail_writes: true,
        ..MemoryClipboard::default()
    };
    let record = db.get(first.id).expect("get").expect("record");
    assert!(pipeline.copy_to_clipboard(&record, &mut clipboard).is_err());
    assert_eq!(pipeline.last_seen(), Some(ContentFingerprint::of_text("second")));

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn clearing_keeps_favorites() {
    let (db, images_dir) = setup("clipcat_clear");
    let pipeline = pipeline_for(&db, &images_dir);

    let mut ids = Vec::new();
    for value in ["keep me", "drop me", "drop me too"] {
        if let IngestOutcome::Inserted(added) = pipeline.ingest(text(value)).expect("ingest") {
            ids.push(added.id);
        }
    }
    assert_eq!(ids.len(), 3);
    assert!(db.toggle_favorite(ids[0]).expect("favorite"));

    assert_eq!(db.clear_non_favorites().expect("clear"), 2);
    let remaining = all_records(&db);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ids[0]);
    assert!(remaining[0].is_favorite);
    assert_eq!(
        db.query(&HistoryFilter {
            favorites_only: true,
            ..HistoryFilter::default()
        })
        .expect("favorites")
        .len(),
        1
    );

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn ai_answer_used_only_when_enabled_and_rules_uncertain() {
    let (db, images_dir) = setup("clipcat_ai");
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = CountingProvider {
        reply: "phone",
        calls: Arc::clone(&calls),
    };
    let pipeline = IngestPipeline::new(
        Arc::clone(&db),
        images_dir.clone(),
        AiClassifier::with_provider(Box::new(provider)),
        true,
    );

    let IngestOutcome::Inserted(added) = pipeline.ingest(text("call the office")).expect("ingest") else {
        panic!("expected insert");
    };
    assert_eq!(added.category, Category::Phone);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let IngestOutcome::Inserted(added) = pipeline.ingest(text("https://example.com")).expect("ingest") else {
        panic!("expected insert");
    };
    assert_eq!(added.category, Category::Url);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    pipeline.set_use_ai(false);
    let IngestOutcome::Inserted(added) = pipeline.ingest(text("another note")).expect("ingest") else {
        panic!("expected insert");
    };
    assert_eq!(added.category, Category::Text);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    pipeline.set_use_ai(true);
    pipeline.set_ai_classifier(AiClassifier::disabled());
    let IngestOutcome::Inserted(added) = pipeline.ingest(text("one more note")).expect("ingest") else {
        panic!("expected insert");
    };
    assert_eq!(added.category, Category::Text);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let _ = fs::remove_dir_all(&images_dir);
}

#[test]
fn monitor_ingests_by_polling_and_stops_idempotently() {
    let (db, images_dir) = setup("clipcat_monitor");
    let pipeline = Arc::new(pipeline_for(&db, &images_dir));
    let added = pipeline.subscribe();

    let clipboard = MemoryClipboard::with(text("const answer = 42;"));
    let source = clipboard.clone();
    let monitor = ClipboardMonitor::start(
        Arc::clone(&pipeline),
        move || Box::new(source) as Box<dyn ClipboardSource>,
        Duration::from_millis(20),
        false,
    );

    let first = added.recv_timeout(Duration::from_secs(5)).expect("first record");
    assert_eq!(first.category, Category::Code);

    clipboard.set(text("https://example.org"));
    let second = added.recv_timeout(Duration::from_secs(5)).expect("second record");
    assert_eq!(second.category, Category::Url);

    assert!(monitor.is_running());
    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());

    // 轮询多次看到同一内容，仍然只有两条记录
    assert_eq!(all_records(&db).len(), 2);
    assert!(added.try_recv().is_err());

    let _ = fs::remove_dir_all(&images_dir);
}
