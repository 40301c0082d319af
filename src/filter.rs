//! 事件过滤链 - 根据当前设置决定转发还是丢弃
//!
//! 纯函数，每个事件都针对最新的设置快照重新计算。被拒绝的事件只记日志，
//! 不向用户报错。

use crate::delivery::EventKind;
use crate::notification::NotificationEvent;
use crate::settings::Settings;
use std::fmt;
use tracing::{debug, info};

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// host 或 API key 未配置
    Unconfigured,
    /// 通知转发开关关闭
    ForwardingDisabled,
    /// 应用不在允许列表中
    AppNotAllowed,
    /// 标题和正文都为空
    EmptyContent,
}

/// 策略结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOutcome {
    Unconfigured,
    FilteredOut,
}

impl RejectReason {
    pub fn category(&self) -> PolicyOutcome {
        match self {
            RejectReason::Unconfigured => PolicyOutcome::Unconfigured,
            RejectReason::ForwardingDisabled
            | RejectReason::AppNotAllowed
            | RejectReason::EmptyContent => PolicyOutcome::FilteredOut,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::Unconfigured => "unconfigured",
            RejectReason::ForwardingDisabled => "forwarding disabled",
            RejectReason::AppNotAllowed => "app not allowed",
            RejectReason::EmptyContent => "empty content",
        };
        f.write_str(text)
    }
}

/// 过滤结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

/// 通知事件过滤
pub fn evaluate_notification(settings: &Settings, event: &NotificationEvent) -> FilterDecision {
    if !settings.is_configured() {
        return FilterDecision::Reject(RejectReason::Unconfigured);
    }
    if !settings.notification_forwarding_enabled {
        return FilterDecision::Reject(RejectReason::ForwardingDisabled);
    }
    if !settings.is_app_allowed(&event.source_app_id) {
        return FilterDecision::Reject(RejectReason::AppNotAllowed);
    }
    if event.is_empty() {
        return FilterDecision::Reject(RejectReason::EmptyContent);
    }
    FilterDecision::Accept
}

/// 记录被拒绝的事件
///
/// 未配置时用户需要处理，按 info 记录；其余是正常的过滤，只在 debug 下可见。
pub fn log_rejection(kind: EventKind, subject: &str, reason: RejectReason) {
    match reason.category() {
        PolicyOutcome::Unconfigured => {
            info!(kind = %kind, subject, "Host or API key not configured, event dropped");
        }
        PolicyOutcome::FilteredOut => {
            debug!(kind = %kind, subject, reason = %reason, "Event filtered out");
        }
    }
}

/// 电池事件过滤（同步开关由调度层控制，这里只检查是否已配置）
pub fn evaluate_battery(settings: &Settings) -> FilterDecision {
    if !settings.is_configured() {
        return FilterDecision::Reject(RejectReason::Unconfigured);
    }
    FilterDecision::Accept
}
