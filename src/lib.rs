//! Device Relay - 把电池状态和通知转发到远程 HTTP 服务器

pub mod cli;
pub mod config;
pub mod delivery;
pub mod filter;
pub mod infra;
pub mod notification;
pub mod service;
pub mod settings;
pub mod sync;

pub use config::RelayConfig;
pub use delivery::{DeliveryClient, DeliveryPayload, DeliveryResult, HttpDeliveryClient};
pub use filter::{evaluate_battery, evaluate_notification, FilterDecision, PolicyOutcome, RejectReason};
pub use infra::{BatteryInfo, BatterySource, DesktopEntryCatalog, SysfsBatterySource};
pub use notification::{
    ForwardOutcome, JsonNotification, ListenerSignal, NotificationEvent, NotificationForwarder,
    NotificationHandle,
};
pub use service::{ExistingJobPolicy, PeriodicScheduler, RegisterOutcome, TokioScheduler, WorkOutcome};
pub use settings::{JsonFileBackend, MemoryBackend, Settings, SettingsStore, SettingsUpdate};
pub use sync::{BatterySync, BatterySyncWorker, SyncAttempt, BATTERY_SYNC_JOB};
