//! 组合根 - 构造并注入各组件
//!
//! 设置存储在这里创建一次，以 `Arc` 传给所有需要它的组件，没有全局单例。

use crate::config::RelayConfig;
use crate::delivery::{DeliveryClient, HttpDeliveryClient};
use crate::infra::{BatterySource, DesktopEntryCatalog, SysfsBatterySource};
use crate::service::{AlwaysOnline, ConnectivityProbe, TcpProbe};
use crate::settings::{JsonFileBackend, SettingsStore};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// 网络探测超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// 运行时组件
pub struct AppContext {
    pub config: RelayConfig,
    pub settings: Arc<SettingsStore>,
    pub delivery: Arc<dyn DeliveryClient>,
    pub battery: Arc<dyn BatterySource>,
    pub catalog: Arc<DesktopEntryCatalog>,
    pub probe: Arc<dyn ConnectivityProbe>,
}

impl AppContext {
    /// 从默认位置加载配置和设置
    pub async fn load() -> Result<Self> {
        let config = RelayConfig::load()?;
        let backend = Arc::new(JsonFileBackend::new(RelayConfig::settings_path()));
        let settings = Arc::new(SettingsStore::open(backend).await?);
        Self::build(config, settings)
    }

    /// 用给定的配置和设置存储构造其余组件
    pub fn build(config: RelayConfig, settings: Arc<SettingsStore>) -> Result<Self> {
        let delivery: Arc<dyn DeliveryClient> =
            Arc::new(HttpDeliveryClient::new(config.request_timeout())?);
        let battery: Arc<dyn BatterySource> =
            Arc::new(SysfsBatterySource::new(config.power_supply_dir.clone()));
        let catalog = Arc::new(DesktopEntryCatalog::new(config.application_dirs()));
        let probe: Arc<dyn ConnectivityProbe> = match &config.connectivity_probe {
            Some(addr) if !addr.trim().is_empty() => {
                Arc::new(TcpProbe::new(addr.trim(), PROBE_TIMEOUT))
            }
            _ => Arc::new(AlwaysOnline),
        };

        Ok(Self {
            config,
            settings,
            delivery,
            battery,
            catalog,
            probe,
        })
    }
}
