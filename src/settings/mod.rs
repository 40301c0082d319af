//! 用户设置 - 服务器地址、API key、开关和允许转发的应用列表
//!
//! 所有组件在每次决策时都读取最新的 `Settings` 快照。

pub mod backend;
pub mod store;

pub use backend::{JsonFileBackend, MemoryBackend, SettingsBackend};
pub use store::{SettingsStore, SettingsWatcher};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 设置记录
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 服务器地址
    pub host: String,
    /// API key（通过 `x-api-key` 头发送）
    pub api_key: String,
    /// 后台电池同步开关
    pub background_sync_enabled: bool,
    /// 通知转发开关
    pub notification_forwarding_enabled: bool,
    /// 允许转发通知的应用 ID
    #[serde(rename = "allowed_notification_apps")]
    pub allowed_apps: BTreeSet<String>,
}

impl Settings {
    /// host 和 api_key 都非空时才算已配置
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn is_app_allowed(&self, app_id: &str) -> bool {
        self.allowed_apps.contains(app_id)
    }

    /// 应用部分更新
    pub fn apply(&mut self, update: &SettingsUpdate) {
        if let Some(host) = &update.host {
            self.host = host.clone();
        }
        if let Some(api_key) = &update.api_key {
            self.api_key = api_key.clone();
        }
        if let Some(enabled) = update.background_sync_enabled {
            self.background_sync_enabled = enabled;
        }
        if let Some(enabled) = update.notification_forwarding_enabled {
            self.notification_forwarding_enabled = enabled;
        }
        if let Some(apps) = &update.allowed_apps {
            self.allowed_apps = apps.clone();
        }
    }

    /// 用于日志和 CLI 展示，隐藏 API key
    pub fn masked_api_key(&self) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return String::new();
        }
        let visible: String = key.chars().take(2).collect();
        format!("{}***", visible)
    }
}

/// 部分更新，`None` 表示保持原值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub background_sync_enabled: Option<bool>,
    pub notification_forwarding_enabled: Option<bool>,
    pub allowed_apps: Option<BTreeSet<String>>,
}

impl SettingsUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn background_sync(mut self, enabled: bool) -> Self {
        self.background_sync_enabled = Some(enabled);
        self
    }

    pub fn notification_forwarding(mut self, enabled: bool) -> Self {
        self.notification_forwarding_enabled = Some(enabled);
        self
    }

    pub fn allowed_apps<I, S>(mut self, apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_apps = Some(apps.into_iter().map(Into::into).collect());
        self
    }

    /// 在当前快照基础上加入一个应用
    pub fn allow_app(current: &Settings, app_id: &str) -> Self {
        let mut apps = current.allowed_apps.clone();
        apps.insert(app_id.to_string());
        Self::new().allowed_apps(apps)
    }

    /// 在当前快照基础上移除一个应用
    pub fn deny_app(current: &Settings, app_id: &str) -> Self {
        let mut apps = current.allowed_apps.clone();
        apps.remove(app_id);
        Self::new().allowed_apps(apps)
    }
}
