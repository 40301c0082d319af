//! 通知转发 - 监听通知事件，按设置过滤后上报
//!
//! # 流程
//! 1. 事件源推送 `ListenerSignal::Posted`
//! 2. `NotificationForwarder` 为每条通知派生独立任务
//! 3. 提取标题/正文和应用名称，生成 `NotificationEvent`
//! 4. 过滤链（`crate::filter`）基于最新设置决定是否转发
//! 5. 通过 `DeliveryClient` 发送，失败只记日志

pub mod event;
pub mod forwarder;

pub use event::{
    format_received_at, parse_signal_line, JsonNotification, ListenerSignal, NotificationEvent,
    NotificationHandle,
};
pub use forwarder::{ForwardOutcome, ForwardStage, NotificationForwarder, DEFAULT_MAX_IN_FLIGHT};
