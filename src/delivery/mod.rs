//! 上报层 - 把电池状态和通知发送到配置的服务器

pub mod client;
pub mod payload;

pub use client::{endpoint_url, DeliveryClient, DeliveryResult, HttpDeliveryClient, API_KEY_HEADER};
pub use payload::{BatteryStatus, BatteryStatusRequest, DeliveryPayload, EventKind, NotificationRequest};
