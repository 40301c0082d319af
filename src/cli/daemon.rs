//! daemon 命令 - 常驻运行通知转发和后台电池同步
//!
//! 通知事件以 JSON 行的形式从标准输入读入，例如：
//!
//! ```text
//! {"type":"posted","app_id":"com.foo","title":"Hi","text":"hello"}
//! {"type":"removed","app_id":"com.foo"}
//! ```
//!
//! 标准输入关闭后电池同步继续运行，直到收到 Ctrl+C。

use super::context::AppContext;
use crate::infra::{NotificationAccess, StdinListenerAccess};
use crate::notification::{parse_signal_line, ListenerSignal, NotificationForwarder};
use crate::service::TokioScheduler;
use crate::settings::SettingsStore;
use crate::sync::{BatterySync, BatterySyncWorker};
use anyhow::Result;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 信号通道容量
const SIGNAL_CHANNEL_CAPACITY: usize = 256;

/// 处理 daemon 命令
pub async fn handle_daemon(ctx: AppContext) -> Result<()> {
    let cancel = CancellationToken::new();
    let settings = ctx.settings.clone();

    let scheduler = Arc::new(TokioScheduler::new(ctx.probe.clone()));
    let worker = Arc::new(BatterySyncWorker::new(
        settings.clone(),
        ctx.battery.clone(),
        ctx.delivery.clone(),
    ));
    let sync = Arc::new(
        BatterySync::new(settings.clone(), scheduler.clone(), worker)
            .with_interval(ctx.config.sync_interval()),
    );
    sync.reconcile(&settings.get());

    let follow = {
        let sync = sync.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { sync.follow_settings(cancel).await })
    };

    let refresh = tokio::spawn(refresh_loop(
        settings.clone(),
        ctx.config.settings_refresh_interval(),
        cancel.clone(),
    ));

    let access = StdinListenerAccess;
    if !access.is_granted() {
        warn!(hint = %access.settings_hint(), "Notification access not granted");
    }

    let forwarder = NotificationForwarder::with_max_in_flight(
        settings.clone(),
        ctx.delivery.clone(),
        ctx.catalog.clone(),
        ctx.config.max_in_flight,
    );
    let (tx, rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);
    let listener = {
        let forwarder = forwarder.clone();
        tokio::spawn(async move { forwarder.run(rx).await })
    };
    // 标准输入在独立线程上阻塞读取，不占用运行时的阻塞线程池，退出时不必等它
    std::thread::Builder::new()
        .name("stdin-listener".to_string())
        .spawn(move || read_signals(std::io::stdin().lock(), tx))?;

    let current = settings.get();
    info!(
        configured = current.is_configured(),
        forwarding = current.notification_forwarding_enabled,
        background_sync = current.background_sync_enabled,
        interval_secs = ctx.config.sync_interval().as_secs(),
        "Relay daemon started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down relay daemon");

    cancel.cancel();
    forwarder.shutdown().await;
    let (follow, refresh, listener) = tokio::join!(follow, refresh, listener);
    log_join("settings follower", follow);
    log_join("settings refresh", refresh);
    log_join("notification listener", listener);

    sync.disable();
    info!(remaining_jobs = scheduler.job_names().len(), "Relay daemon stopped");
    Ok(())
}

/// 定期重新读取设置文件，让其他进程（CLI）写入的修改生效
async fn refresh_loop(settings: Arc<SettingsStore>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match settings.refresh().await {
                Ok(true) => info!("Settings changed on disk, reloaded"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Failed to reload settings"),
            },
        }
    }
}

fn log_join(task: &str, result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        warn!(task, error = %e, "Daemon task ended abnormally");
    }
}

/// 逐行读取监听信号，直到输入结束或接收端关闭
pub fn read_signals(input: impl BufRead, tx: mpsc::Sender<ListenerSignal>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read notification input");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match parse_signal_line(&line) {
            Ok(signal) => {
                if tx.blocking_send(signal).is_err() {
                    debug!("Notification receiver closed");
                    return;
                }
            }
            Err(e) => warn!(error = %e, "Ignoring malformed notification event"),
        }
    }
    debug!("Notification input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_signals_until_eof() {
        let input = Cursor::new(
            "{\"type\":\"posted\",\"app_id\":\"com.foo\",\"title\":\"Hi\"}\n\
             \n\
             not json\n\
             {\"type\":\"removed\",\"app_id\":\"com.foo\"}\n",
        );
        let (tx, mut rx) = mpsc::channel(8);

        read_signals(input, tx);

        assert!(matches!(
            rx.try_recv(),
            Ok(ListenerSignal::Posted { app_id, .. }) if app_id == "com.foo"
        ));
        assert!(matches!(rx.try_recv(), Ok(ListenerSignal::Removed { .. })));
        // 输入结束后发送端已释放
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_log_join_reports_panicked_task() {
        let panicked: Result<(), _> = tokio::spawn(async { panic!("task failed") }).await;
        assert!(panicked.as_ref().is_err_and(|e| e.is_panic()));
        log_join("settings refresh", panicked);

        let finished = tokio::spawn(async {}).await;
        assert!(finished.is_ok());
        log_join("settings refresh", finished);
    }

    #[test]
    fn test_read_signals_stops_when_receiver_closed() {
        let line = "{\"type\":\"removed\",\"app_id\":\"com.foo\"}\n";
        let input = Cursor::new(line.repeat(100));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        // 接收端关闭后立即返回，不会读完全部输入
        let handle = std::thread::spawn(move || read_signals(input, tx));
        assert!(handle.join().is_ok());
    }
}
