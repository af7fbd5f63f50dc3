use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clipboard_master::{CallbackResult, ClipboardHandler, Master, Shutdown};

use super::ClipboardSource;
use crate::pipeline::IngestPipeline;

const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;
const STOP_CHECK_SLICE_MS: u64 = 50;

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

/// 送往串行消费线程的触发信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// 系统通知剪贴板已变化
    Changed,
    /// 定时轮询
    Poll,
    Shutdown,
}

/// 把积压的触发信号合并为一次检查
///
/// 返回 `(是否需要检查, 是否收到停止信号)`。
fn drain_pending(first: Trigger, rx: &Receiver<Trigger>) -> (bool, bool) {
    let mut check = first != Trigger::Shutdown;
    let mut shutdown = first == Trigger::Shutdown;
    loop {
        match rx.try_recv() {
            Ok(Trigger::Shutdown) => shutdown = true,
            Ok(_) => check = true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
    (check, shutdown)
}

/// 剪贴板事件处理器（内部实现）
///
/// 只负责把变化通知转成 `Trigger::Changed`；停止后在下一次回调时退出。
struct Handler {
    tx: Sender<Trigger>,
    running: Arc<AtomicBool>,
}

impl ClipboardHandler for Handler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if !self.running.load(Ordering::SeqCst) || self.tx.send(Trigger::Changed).is_err() {
            return CallbackResult::Stop;
        }
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: std::io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

/// 当前 `Master` 的停止句柄，监听线程写入，`stop()` 取走
type ShutdownSlot = Arc<Mutex<Option<Shutdown>>>;

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("监控锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

/// 分段睡眠，`running` 变为 `false` 时提前返回
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    let slice = Duration::from_millis(STOP_CHECK_SLICE_MS);
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(slice.min(deadline - now));
    }
}

fn spawn_change_listener(tx: Sender<Trigger>, running: Arc<AtomicBool>, shutdown: ShutdownSlot) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut restart_attempt: u32 = 0;
        while running.load(Ordering::SeqCst) {
            let handler = Handler {
                tx: tx.clone(),
                running: Arc::clone(&running),
            };
            match Master::new(handler) {
                Ok(mut master) => {
                    *lock_or_recover(&shutdown) = Some(master.shutdown_channel());

                    // Shutdown 的通道容量为 0：必须先释放 master，再丢弃句柄，否则发送会一直阻塞
                    if !running.load(Ordering::SeqCst) {
                        let pending = lock_or_recover(&shutdown).take();
                        drop(master);
                        drop(pending);
                        break;
                    }

                    restart_attempt = 0;
                    log::info!("📋 剪贴板监听已启动");
                    let result = master.run();

                    let stale = lock_or_recover(&shutdown).take();
                    drop(master);
                    drop(stale);

                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    match result {
                        Ok(()) => log::warn!("📋 剪贴板监听已退出，将尝试重启"),
                        Err(err) => log::warn!("📋 剪贴板监听出错，将尝试重启: {}", err),
                    }
                }
                Err(err) => {
                    log::error!("📋 创建剪贴板监听失败: {}", err);
                }
            }

            restart_attempt = restart_attempt.saturating_add(1);
            let backoff_ms = compute_restart_backoff_ms(restart_attempt);
            log::warn!("📋 剪贴板监听 {}ms 后重试（attempt={}）", backoff_ms, restart_attempt);
            sleep_while_running(&running, Duration::from_millis(backoff_ms));
        }
        log::debug!("📋 剪贴板变化监听线程退出");
    })
}

fn spawn_poller(tx: Sender<Trigger>, running: Arc<AtomicBool>, interval: Duration) {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            thread::sleep(interval);
            if !running.load(Ordering::SeqCst) || tx.send(Trigger::Poll).is_err() {
                break;
            }
        }
        log::debug!("📋 剪贴板轮询线程退出");
    });
}

fn run_consumer(pipeline: &IngestPipeline, source: &mut dyn ClipboardSource, rx: Receiver<Trigger>) {
    // 启动时先检查一次当前内容
    check_once(pipeline, source);

    while let Ok(first) = rx.recv() {
        let (check, shutdown) = drain_pending(first, &rx);
        if check {
            check_once(pipeline, source);
        }
        if shutdown {
            break;
        }
    }
    log::info!("📋 剪贴板采集循环已停止");
}

fn check_once(pipeline: &IngestPipeline, source: &mut dyn ClipboardSource) {
    if let Err(err) = pipeline.check_clipboard(source) {
        log::error!("处理剪贴板内容失败: {}", err);
    }
}

/// 剪贴板监控器
///
/// 两个生产者（变化通知、定时轮询）向同一个通道发送触发信号，
/// 唯一的消费线程串行执行采集流水线，同一时刻最多处理一份快照。
///
/// `stop()` 幂等：只在两次快照之间响应停止信号，正在进行的采集会完整跑完。
/// 变化监听线程通过 `Shutdown` 句柄唤醒退出，`stop()` 返回时两个线程都已结束。
pub struct ClipboardMonitor {
    running: Arc<AtomicBool>,
    tx: Sender<Trigger>,
    consumer: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    listener_shutdown: ShutdownSlot,
}

impl ClipboardMonitor {
    /// 在后台线程启动监控
    ///
    /// `make_source` 在消费线程内部调用，剪贴板句柄不会跨线程移动。
    /// `listen_for_changes` 为 `false` 时只靠轮询（无图形会话或测试时使用）。
    pub fn start<F>(
        pipeline: Arc<IngestPipeline>,
        make_source: F,
        poll_interval: Duration,
        listen_for_changes: bool,
    ) -> Self
    where
        F: FnOnce() -> Box<dyn ClipboardSource> + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel();

        let listener_shutdown: ShutdownSlot = Arc::new(Mutex::new(None));

        pipeline.reset_last_seen();

        let listener = listen_for_changes.then(|| {
            spawn_change_listener(tx.clone(), Arc::clone(&running), Arc::clone(&listener_shutdown))
        });
        spawn_poller(tx.clone(), Arc::clone(&running), poll_interval);

        let consumer = thread::spawn(move || {
            let mut source = make_source();
            run_consumer(&pipeline, source.as_mut(), rx);
        });

        log::info!("📋 剪贴板监控已启动（轮询间隔 {}ms）", poll_interval.as_millis());

        Self {
            running,
            tx,
            consumer: Mutex::new(Some(consumer)),
            listener: Mutex::new(listener),
            listener_shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 停止监控并等待当前采集完成
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let _ = self.tx.send(Trigger::Shutdown);

        // 先放开锁再发送：发送会等到 run() 下一次检查停止信号
        let shutdown = lock_or_recover(&self.listener_shutdown).take();
        if let Some(shutdown) = shutdown {
            shutdown.signal();
        }

        let consumer = lock_or_recover(&self.consumer).take();
        if let Some(handle) = consumer {
            if handle.join().is_err() {
                log::error!("剪贴板采集线程异常退出");
            }
        }

        let listener = lock_or_recover(&self.listener).take();
        if let Some(handle) = listener {
            if handle.join().is_err() {
                log::error!("剪贴板监听线程异常退出");
            }
        }
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
