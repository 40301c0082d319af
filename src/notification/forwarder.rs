//! 通知转发器 - 监听通知、过滤并上报
//!
//! 每条通知独立处理：提取 → 过滤 → 发送，实例之间不共享可变状态，
//! 也不保证发送顺序（每条记录带自己的 `receivedAt`）。关闭转发器会取消
//! 所有仍在处理中的实例。

use super::event::{ListenerSignal, NotificationEvent, NotificationHandle};
use crate::delivery::{DeliveryClient, DeliveryPayload, DeliveryResult, EventKind};
use crate::filter::{self, FilterDecision, RejectReason};
use crate::infra::AppNameResolver;
use crate::settings::SettingsStore;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// 默认并发上限
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// 单条通知的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStage {
    Idle,
    Extracting,
    Filtering,
    Delivering,
}

impl fmt::Display for ForwardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ForwardStage::Idle => "idle",
            ForwardStage::Extracting => "extracting",
            ForwardStage::Filtering => "filtering",
            ForwardStage::Delivering => "delivering",
        };
        f.write_str(text)
    }
}

/// 单条通知的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// 被过滤链拒绝
    Filtered(RejectReason),
    /// 已送达
    Delivered,
    /// 发送失败（不重试）
    Failed(DeliveryResult),
    /// 转发器关闭时被取消
    Cancelled,
}

struct Inner {
    settings: Arc<SettingsStore>,
    delivery: Arc<dyn DeliveryClient>,
    resolver: Arc<dyn AppNameResolver>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// 通知转发器（可克隆，克隆体共享同一个生命周期）
#[derive(Clone)]
pub struct NotificationForwarder {
    inner: Arc<Inner>,
}

impl NotificationForwarder {
    pub fn new(
        settings: Arc<SettingsStore>,
        delivery: Arc<dyn DeliveryClient>,
        resolver: Arc<dyn AppNameResolver>,
    ) -> Self {
        Self::with_max_in_flight(settings, delivery, resolver, DEFAULT_MAX_IN_FLIGHT)
    }

    /// 指定同时处理的通知上限
    pub fn with_max_in_flight(
        settings: Arc<SettingsStore>,
        delivery: Arc<dyn DeliveryClient>,
        resolver: Arc<dyn AppNameResolver>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                delivery,
                resolver,
                permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// 处理一个监听信号；新通知返回对应任务句柄
    pub fn handle_signal(&self, signal: ListenerSignal) -> Option<JoinHandle<ForwardOutcome>> {
        match signal {
            ListenerSignal::Posted { app_id, handle } => Some(self.on_posted(app_id, handle)),
            ListenerSignal::Removed { app_id } => {
                debug!(app_id = %app_id, "Notification removed");
                None
            }
        }
    }

    /// 新通知：派生独立任务处理，立即返回，不阻塞事件源
    pub fn on_posted(
        &self,
        app_id: String,
        handle: Box<dyn NotificationHandle>,
    ) -> JoinHandle<ForwardOutcome> {
        let forwarder = self.clone();
        let cancel = self.inner.cancel.clone();

        self.inner.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(app_id = %app_id, "Notification processing cancelled");
                    ForwardOutcome::Cancelled
                }
                outcome = forwarder.process_with_permit(&app_id, handle.as_ref()) => outcome,
            }
        })
    }

    async fn process_with_permit(
        &self,
        app_id: &str,
        handle: &dyn NotificationHandle,
    ) -> ForwardOutcome {
        let Ok(_permit) = Arc::clone(&self.inner.permits).acquire_owned().await else {
            return ForwardOutcome::Cancelled;
        };
        self.process(app_id, handle).await
    }

    /// 处理单条通知（提取 → 过滤 → 发送）
    pub async fn process(&self, app_id: &str, handle: &dyn NotificationHandle) -> ForwardOutcome {
        debug!(app_id = %app_id, stage = %ForwardStage::Extracting, "Processing notification");
        let event = NotificationEvent::extract(
            app_id,
            handle,
            self.inner.resolver.as_ref(),
            Utc::now(),
        );

        // 每条事件都使用最新快照
        let settings = self.inner.settings.get();
        debug!(app_id = %app_id, stage = %ForwardStage::Filtering, "Filtering notification");
        if let FilterDecision::Reject(reason) = filter::evaluate_notification(&settings, &event) {
            filter::log_rejection(EventKind::Notification, app_id, reason);
            return ForwardOutcome::Filtered(reason);
        }

        debug!(app_id = %app_id, stage = %ForwardStage::Delivering, "Forwarding notification");
        let payload = DeliveryPayload::from(event.to_request());
        let result = self
            .inner
            .delivery
            .send(&settings.host, &settings.api_key, &payload)
            .await;

        match result {
            DeliveryResult::Delivered => {
                info!(
                    app_id = %app_id,
                    app_name = %event.display_name,
                    "Notification forwarded"
                );
                ForwardOutcome::Delivered
            }
            failure => {
                warn!(
                    app_id = %app_id,
                    result = ?failure,
                    "Notification forwarding failed"
                );
                ForwardOutcome::Failed(failure)
            }
        }
    }

    /// 持续读取信号直到通道关闭或转发器被关闭
    pub async fn run(&self, mut signals: mpsc::Receiver<ListenerSignal>) {
        info!("Notification forwarder started");
        loop {
            tokio::select! {
                _ = self.inner.cancel.cancelled() => break,
                signal = signals.recv() => match signal {
                    Some(signal) => {
                        let _ = self.handle_signal(signal);
                    }
                    None => break,
                },
            }
        }
        info!("Notification forwarder stopped receiving");
    }

    /// 正在处理的通知数量
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// 取消所有处理中的实例并等待它们结束
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("Notification forwarder shut down");
    }

    /// 等待已派生的实例全部结束（不取消）
    pub async fn drain(&self) {
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::event::JsonNotification;
    use crate::settings::{MemoryBackend, Settings};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        sent: Mutex<Vec<DeliveryPayload>>,
    }

    #[async_trait]
    impl DeliveryClient for RecordingClient {
        async fn send(&self, _host: &str, _api_key: &str, payload: &DeliveryPayload) -> DeliveryResult {
            self.sent.lock().unwrap().push(payload.clone());
            DeliveryResult::Delivered
        }
    }

    struct NoNames;

    impl AppNameResolver for NoNames {
        fn resolve_name(&self, _app_id: &str) -> Option<String> {
            None
        }
    }

    async fn forwarder_with(settings: Settings) -> (NotificationForwarder, Arc<RecordingClient>) {
        let store = SettingsStore::open(Arc::new(MemoryBackend::with_settings(settings)))
            .await
            .unwrap();
        let client = Arc::new(RecordingClient::default());
        let forwarder = NotificationForwarder::new(Arc::new(store), client.clone(), Arc::new(NoNames));
        (forwarder, client)
    }

    fn handle(title: &str, text: &str) -> Box<dyn NotificationHandle> {
        Box::new(JsonNotification {
            title: Some(title.to_string()),
            text: Some(text.to_string()),
        })
    }

    #[tokio::test]
    async fn test_unconfigured_is_filtered() {
        let (forwarder, client) = forwarder_with(Settings::default()).await;
        let outcome = forwarder.process("com.foo", handle("Hi", "").as_ref()).await;
        assert_eq!(outcome, ForwardOutcome::Filtered(RejectReason::Unconfigured));
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removed_signal_spawns_nothing() {
        let (forwarder, client) = forwarder_with(Settings::default()).await;
        let spawned = forwarder.handle_signal(ListenerSignal::Removed {
            app_id: "com.foo".to_string(),
        });
        assert!(spawned.is_none());
        assert_eq!(forwarder.in_flight(), 0);
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_app_id_used_as_name_when_unresolved() {
        let settings = Settings {
            host: "https://x".to_string(),
            api_key: "k1".to_string(),
            notification_forwarding_enabled: true,
            allowed_apps: ["com.foo".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let (forwarder, client) = forwarder_with(settings).await;

        let outcome = forwarder
            .on_posted("com.foo".to_string(), handle("Hi", "there"))
            .await
            .unwrap();
        assert_eq!(outcome, ForwardOutcome::Delivered);

        let sent = client.sent.lock().unwrap();
        match &sent[0] {
            DeliveryPayload::Notification(request) => assert_eq!(request.app_name, "com.foo"),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ForwardStage::Delivering.to_string(), "delivering");
    }
}
