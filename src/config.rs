//! 运行配置 - 调度周期、超时、并发上限等调优参数
//!
//! 与用户设置 (`Settings`) 分开存放：设置是用户数据，这里是进程行为。
//! 文件位于 `~/.config/device-relay/config.json`，所有字段都可省略。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// 配置目录环境变量（测试和多实例时使用）
pub const CONFIG_DIR_ENV: &str = "DEVICE_RELAY_CONFIG_DIR";

/// 运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 电池同步周期（分钟）
    pub sync_interval_minutes: u64,
    /// HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 同时处理的通知上限
    pub max_in_flight: usize,
    /// daemon 重新读取设置文件的间隔（秒）
    pub settings_refresh_secs: u64,
    /// 网络探测地址 (host:port)，为空时视为始终在线
    pub connectivity_probe: Option<String>,
    /// 电源设备目录
    pub power_supply_dir: PathBuf,
    /// `.desktop` 文件搜索目录，为空时使用 XDG 默认目录
    pub applications_dirs: Vec<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sync_interval_minutes: 30,
            request_timeout_secs: 10,
            max_in_flight: 16,
            settings_refresh_secs: 5,
            connectivity_probe: None,
            power_supply_dir: PathBuf::from("/sys/class/power_supply"),
            applications_dirs: Vec::new(),
        }
    }
}

impl RelayConfig {
    /// 配置目录
    pub fn config_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }

        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("device-relay")
    }

    /// 设置文件路径
    pub fn settings_path() -> PathBuf {
        Self::config_dir().join("settings.json")
    }

    /// 配置文件路径
    pub fn path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// 从默认位置加载，文件不存在时使用默认值
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path())
    }

    /// 从指定文件加载
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: RelayConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        Ok(config.sanitized())
    }

    /// 修正非法值（0 周期等）
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.sync_interval_minutes == 0 {
            warn!("sync_interval_minutes must be positive, falling back to default");
            self.sync_interval_minutes = defaults.sync_interval_minutes;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = defaults.request_timeout_secs;
        }
        if self.max_in_flight == 0 {
            self.max_in_flight = defaults.max_in_flight;
        }
        if self.settings_refresh_secs == 0 {
            self.settings_refresh_secs = defaults.settings_refresh_secs;
        }
        self
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn settings_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.settings_refresh_secs)
    }

    /// `.desktop` 搜索目录（未配置时使用 XDG 默认目录）
    pub fn application_dirs(&self) -> Vec<PathBuf> {
        if !self.applications_dirs.is_empty() {
            return self.applications_dirs.clone();
        }

        let mut dirs_list = Vec::new();
        if let Some(data) = dirs::data_dir() {
            dirs_list.push(data.join("applications"));
        }
        dirs_list.push(PathBuf::from("/usr/local/share/applications"));
        dirs_list.push(PathBuf::from("/usr/share/applications"));
        dirs_list
    }
}
