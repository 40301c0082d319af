//! 上报载荷 - 固定的 JSON 结构

use serde::{Deserialize, Serialize};
use std::fmt;

/// 电池状态上报
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatusRequest {
    pub battery_percent: i32,
    pub battery_status: BatteryStatus,
}

/// 充电状态（充满且接通电源也算 `CHARGING`）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    Charging,
    NotCharging,
}

impl BatteryStatus {
    pub fn from_charging(is_charging: bool) -> Self {
        if is_charging {
            BatteryStatus::Charging
        } else {
            BatteryStatus::NotCharging
        }
    }
}

/// 通知上报
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub app_name: String,
    pub title: String,
    pub content: String,
    /// ISO 8601 时间
    pub received_at: String,
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Battery,
    Notification,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Battery => write!(f, "battery"),
            EventKind::Notification => write!(f, "notification"),
        }
    }
}

/// 待发送的载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPayload {
    Battery(BatteryStatusRequest),
    Notification(NotificationRequest),
}

impl DeliveryPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            DeliveryPayload::Battery(_) => EventKind::Battery,
            DeliveryPayload::Notification(_) => EventKind::Notification,
        }
    }

    /// 服务端路径
    pub fn path(&self) -> &'static str {
        match self {
            DeliveryPayload::Battery(_) => "/internal/khlug-phone/status",
            DeliveryPayload::Notification(_) => "/internal/khlug-phone/notification",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            DeliveryPayload::Battery(request) => serde_json::to_value(request),
            DeliveryPayload::Notification(request) => serde_json::to_value(request),
        };
        // 两种结构都只有字符串和整数字段，序列化不会失败
        value.unwrap_or(serde_json::Value::Null)
    }
}

impl From<BatteryStatusRequest> for DeliveryPayload {
    fn from(request: BatteryStatusRequest) -> Self {
        DeliveryPayload::Battery(request)
    }
}

impl From<NotificationRequest> for DeliveryPayload {
    fn from(request: NotificationRequest) -> Self {
        DeliveryPayload::Notification(request)
    }
}
