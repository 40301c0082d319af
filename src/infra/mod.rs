//! 基础设施层 - 设备侧协作者（电池、应用目录、通知权限）

pub mod access;
pub mod apps;
pub mod battery;

pub use access::{NotificationAccess, StdinListenerAccess};
pub use apps::{filter_apps, AppCatalog, AppNameResolver, DesktopEntryCatalog, InstalledApp};
pub use battery::{BatteryInfo, BatterySource, SysfsBatterySource};
