//! 电池同步 - 周期性上报电池状态
//!
//! 后台任务无论上报成功与否都向调度器报告成功：下一个周期（默认 30 分钟）
//! 就是自然的重试，报告失败会触发调度器的指数退避，让上报间隔变得不可预测。
//! 开关控制的是任务的注册/注销，而不是每次执行时检查的标志。

use crate::delivery::{DeliveryClient, DeliveryPayload, DeliveryResult, EventKind};
use crate::filter::{self, FilterDecision, RejectReason};
use crate::infra::{BatteryInfo, BatterySource};
use crate::service::scheduler::{
    ExistingJobPolicy, PeriodicJob, PeriodicScheduler, PeriodicWork, RegisterOutcome, WorkOutcome,
};
use crate::settings::{Settings, SettingsStore, SettingsUpdate};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 周期任务名称
pub const BATTERY_SYNC_JOB: &str = "battery_sync_work";

/// 默认同步周期
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// 一次同步尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAttempt {
    /// 未发送（未配置）
    Skipped(RejectReason),
    /// 已尝试发送
    Sent {
        battery: BatteryInfo,
        result: DeliveryResult,
    },
}

impl SyncAttempt {
    /// 读到的电池信息（未发送时为 `None`）
    pub fn battery(&self) -> Option<BatteryInfo> {
        match self {
            SyncAttempt::Skipped(_) => None,
            SyncAttempt::Sent { battery, .. } => Some(*battery),
        }
    }

    /// 交互路径：未配置或发送失败都转换为可展示的错误
    pub fn into_result(self) -> Result<BatteryInfo> {
        match self {
            SyncAttempt::Skipped(RejectReason::Unconfigured) => {
                anyhow::bail!("Configure host and API key first")
            }
            SyncAttempt::Skipped(reason) => anyhow::bail!("Battery sync skipped: {}", reason),
            SyncAttempt::Sent { battery, result } => result.into_result().map(|_| battery),
        }
    }
}

/// 单次电池同步
pub struct BatterySyncWorker {
    settings: Arc<SettingsStore>,
    battery: Arc<dyn BatterySource>,
    delivery: Arc<dyn DeliveryClient>,
}

impl BatterySyncWorker {
    pub fn new(
        settings: Arc<SettingsStore>,
        battery: Arc<dyn BatterySource>,
        delivery: Arc<dyn DeliveryClient>,
    ) -> Self {
        Self {
            settings,
            battery,
            delivery,
        }
    }

    /// 读取电池并上报（未配置时不读取也不发送）
    pub async fn attempt(&self) -> SyncAttempt {
        let settings = self.settings.get();
        if let FilterDecision::Reject(reason) = filter::evaluate_battery(&settings) {
            filter::log_rejection(EventKind::Battery, BATTERY_SYNC_JOB, reason);
            return SyncAttempt::Skipped(reason);
        }

        // 读取失败时是哨兵值，照常上报
        let battery = self.battery.read().await;
        debug!(
            percent = battery.percent,
            charging = battery.is_charging,
            "Battery read"
        );

        let payload = DeliveryPayload::from(battery.to_request());
        let result = self
            .delivery
            .send(&settings.host, &settings.api_key, &payload)
            .await;

        SyncAttempt::Sent { battery, result }
    }
}

#[async_trait]
impl PeriodicWork for BatterySyncWorker {
    async fn run(&self) -> WorkOutcome {
        match self.attempt().await {
            // 已在 attempt 中记录
            SyncAttempt::Skipped(_) => {}
            SyncAttempt::Sent {
                result: DeliveryResult::Delivered,
                battery,
            } => {
                info!(percent = battery.percent, "Battery sync completed");
            }
            SyncAttempt::Sent { result, .. } => {
                warn!(result = ?result, "Battery sync failed, waiting for next tick");
            }
        }

        // 不重试：失败也报告成功
        WorkOutcome::Success
    }
}

/// 电池同步控制：开关和周期任务注册
pub struct BatterySync {
    settings: Arc<SettingsStore>,
    scheduler: Arc<dyn PeriodicScheduler>,
    worker: Arc<BatterySyncWorker>,
    interval: Duration,
}

impl BatterySync {
    pub fn new(
        settings: Arc<SettingsStore>,
        scheduler: Arc<dyn PeriodicScheduler>,
        worker: Arc<BatterySyncWorker>,
    ) -> Self {
        Self {
            settings,
            scheduler,
            worker,
            interval: DEFAULT_SYNC_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// 注册周期任务（已存在时保留原任务，不重置周期）
    pub fn enable(&self) -> RegisterOutcome {
        let job = PeriodicJob::new(BATTERY_SYNC_JOB, self.interval, self.worker.clone())
            .requires_network(true);
        self.scheduler.register(job, ExistingJobPolicy::Keep)
    }

    /// 注销周期任务（不存在时无操作）
    pub fn disable(&self) -> bool {
        self.scheduler.cancel(BATTERY_SYNC_JOB)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled(BATTERY_SYNC_JOB)
    }

    /// 保存开关并同步注册状态
    pub async fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.settings
            .set(SettingsUpdate::new().background_sync(enabled))
            .await?;
        self.apply(enabled);
        Ok(())
    }

    /// 按设置中的开关调整注册状态
    pub fn reconcile(&self, settings: &Settings) {
        self.apply(settings.background_sync_enabled);
    }

    fn apply(&self, enabled: bool) {
        if enabled {
            let outcome = self.enable();
            debug!(outcome = ?outcome, "Battery sync enabled");
        } else if self.disable() {
            info!("Battery sync disabled");
        }
    }

    /// 订阅设置变化，直到取消
    pub async fn follow_settings(&self, cancel: CancellationToken) {
        let mut watcher = self.settings.observe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = watcher.next() => match next {
                    Some(settings) => self.reconcile(&settings),
                    None => break,
                },
            }
        }
    }
}
