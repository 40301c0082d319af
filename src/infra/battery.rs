//! 电池状态读取 - Linux sysfs (`/sys/class/power_supply`)

use crate::delivery::{BatteryStatus, BatteryStatusRequest};
use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 电池信息（读取时构造，不落盘）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatteryInfo {
    /// 0-100，读取失败时为 -1
    pub percent: i32,
    /// 充电中或已充满
    pub is_charging: bool,
}

impl BatteryInfo {
    /// 无法读取时的哨兵值
    pub const UNKNOWN_PERCENT: i32 = -1;

    pub fn new(percent: i32, is_charging: bool) -> Self {
        Self { percent, is_charging }
    }

    pub fn unreadable() -> Self {
        Self::new(Self::UNKNOWN_PERCENT, false)
    }

    pub fn is_readable(&self) -> bool {
        self.percent >= 0
    }

    /// CLI 展示文本
    pub fn display_text(&self) -> String {
        let percent = if self.is_readable() {
            format!("{}%", self.percent)
        } else {
            "unknown".to_string()
        };
        format!(
            "Battery: {}\nCharging: {}",
            percent,
            if self.is_charging { "yes" } else { "no" }
        )
    }

    pub fn to_request(&self) -> BatteryStatusRequest {
        BatteryStatusRequest {
            battery_percent: self.percent,
            battery_status: BatteryStatus::from_charging(self.is_charging),
        }
    }
}

/// 设备电池状态来源
///
/// 读取失败时返回哨兵值，而不是错误。
#[async_trait]
pub trait BatterySource: Send + Sync {
    async fn read(&self) -> BatteryInfo;
}

/// sysfs 实现：取第一个 `type` 为 `Battery` 的电源
#[derive(Debug, Clone)]
pub struct SysfsBatterySource {
    dir: PathBuf,
}

impl SysfsBatterySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 同步读取
    pub fn read_now(&self) -> BatteryInfo {
        let Some(supply) = self.find_battery() else {
            debug!(dir = %self.dir.display(), "No battery found");
            return BatteryInfo::unreadable();
        };

        let percent = Self::read_percent(&supply).unwrap_or(BatteryInfo::UNKNOWN_PERCENT);
        let is_charging = matches!(
            read_trimmed(&supply.join("status")).as_deref(),
            Some("Charging") | Some("Full")
        );

        BatteryInfo::new(percent, is_charging)
    }

    fn find_battery(&self) -> Option<PathBuf> {
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        entries
            .into_iter()
            .find(|path| read_trimmed(&path.join("type")).as_deref() == Some("Battery"))
    }

    fn read_percent(supply: &Path) -> Option<i32> {
        if let Some(capacity) = read_number(&supply.join("capacity")) {
            return Some(capacity.clamp(0, 100) as i32);
        }

        // 没有 capacity 时按 level * 100 / scale 计算
        for (now, full) in [("energy_now", "energy_full"), ("charge_now", "charge_full")] {
            let level = read_number(&supply.join(now));
            let scale = read_number(&supply.join(full));
            if let (Some(level), Some(scale)) = (level, scale) {
                if level >= 0 && scale > 0 {
                    return Some((level * 100 / scale).clamp(0, 100) as i32);
                }
            }
        }

        None
    }
}

#[async_trait]
impl BatterySource for SysfsBatterySource {
    async fn read(&self) -> BatteryInfo {
        self.read_now()
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Option<i64> {
    read_trimmed(path)?.parse().ok()
}
