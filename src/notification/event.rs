//! 通知事件 - 从原始通知中提取的标准化记录
//!
//! 事件在一次处理内创建、过滤、发送然后丢弃，不持久化。

use crate::delivery::NotificationRequest;
use crate::infra::AppNameResolver;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::fmt;

/// 原始通知句柄
///
/// 标题和正文各自可能缺失，缺失不是错误。
pub trait NotificationHandle: Send + Sync + fmt::Debug {
    fn title(&self) -> Option<String>;

    fn text(&self) -> Option<String>;
}

/// 监听器收到的信号
#[derive(Debug)]
pub enum ListenerSignal {
    /// 新通知
    Posted {
        app_id: String,
        handle: Box<dyn NotificationHandle>,
    },
    /// 通知被移除（仅记录，不触发处理）
    Removed { app_id: String },
}

/// 标准化的通知事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    /// 来源应用 ID
    pub source_app_id: String,
    /// 应用显示名称，解析失败时为应用 ID
    pub display_name: String,
    pub title: String,
    pub body: String,
    /// 处理时刻（不是原始发布时刻）
    pub received_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// 从原始句柄提取事件，不会失败
    pub fn extract(
        app_id: &str,
        handle: &dyn NotificationHandle,
        resolver: &dyn AppNameResolver,
        received_at: DateTime<Utc>,
    ) -> Self {
        let display_name = resolver
            .resolve_name(app_id)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| app_id.to_string());

        Self {
            source_app_id: app_id.to_string(),
            display_name,
            title: handle.title().unwrap_or_default(),
            body: handle.text().unwrap_or_default(),
            received_at,
        }
    }

    /// 标题和正文都为空（空白也算空）
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.body.trim().is_empty()
    }

    pub fn to_request(&self) -> NotificationRequest {
        NotificationRequest {
            app_name: self.display_name.clone(),
            title: self.title.clone(),
            content: self.body.clone(),
            received_at: format_received_at(&self.received_at),
        }
    }
}

/// ISO 8601 UTC 时间，毫秒精度，`Z` 结尾
pub fn format_received_at(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JSON 格式的通知（来自标准输入等外部事件源）
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JsonNotification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "body")]
    pub text: Option<String>,
}

impl NotificationHandle for JsonNotification {
    fn title(&self) -> Option<String> {
        self.title.clone()
    }

    fn text(&self) -> Option<String> {
        self.text.clone()
    }
}

/// 一行 JSON 事件
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum SignalLine {
    Posted {
        app_id: String,
        #[serde(flatten)]
        notification: JsonNotification,
    },
    Removed {
        app_id: String,
    },
}

/// 解析一行 JSON 事件
///
/// ```text
/// {"type":"posted","app_id":"org.example.Mail","title":"Hi","text":"..."}
/// {"type":"removed","app_id":"org.example.Mail"}
/// ```
pub fn parse_signal_line(line: &str) -> Result<ListenerSignal> {
    let parsed: SignalLine = serde_json::from_str(line.trim())
        .with_context(|| format!("Invalid notification event: {}", line.trim()))?;

    Ok(match parsed {
        SignalLine::Posted {
            app_id,
            notification,
        } => ListenerSignal::Posted {
            app_id,
            handle: Box::new(notification),
        },
        SignalLine::Removed { app_id } => ListenerSignal::Removed { app_id },
    })
}
