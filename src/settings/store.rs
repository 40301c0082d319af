//! 设置存储 - 快照读取、订阅变更、原子写入
//!
//! 所有写入都经过同一把异步锁，写入完成（已持久化并发布）后 `get()`
//! 才会返回新值，保证同一调用序列内 read-your-writes。订阅基于
//! `tokio::sync::watch`，每个订阅者首先收到当前值。

use super::backend::SettingsBackend;
use super::{Settings, SettingsUpdate};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

/// 设置存储
pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
    tx: watch::Sender<Settings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// 打开存储，后端为空时使用默认设置
    pub async fn open(backend: Arc<dyn SettingsBackend>) -> Result<Self> {
        let loader = Arc::clone(&backend);
        let initial = tokio::task::spawn_blocking(move || loader.load())
            .await
            .context("Settings loader task failed")??
            .unwrap_or_default();

        debug!(configured = initial.is_configured(), "Settings store opened");

        let (tx, _rx) = watch::channel(initial);
        Ok(Self {
            backend,
            tx,
            write_lock: Mutex::new(()),
        })
    }

    /// 当前快照
    pub fn get(&self) -> Settings {
        self.tx.borrow().clone()
    }

    /// 订阅设置变更（首次 `next()` 立即返回当前值）
    pub fn observe(&self) -> SettingsWatcher {
        SettingsWatcher {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }

    /// 应用部分更新并持久化，返回更新后的记录
    ///
    /// 内容没有变化时不会向订阅者重复发布。
    pub async fn set(&self, update: SettingsUpdate) -> Result<Settings> {
        let _guard = self.write_lock.lock().await;

        // 基于后端中的最新记录合并，而不是本进程的快照
        let backend = Arc::clone(&self.backend);
        let next = tokio::task::spawn_blocking(move || backend.update(&update))
            .await
            .context("Settings writer task failed")??;

        let changed = self.tx.send_if_modified(|current| {
            if *current != next {
                *current = next.clone();
                true
            } else {
                false
            }
        });

        if changed {
            info!(
                configured = next.is_configured(),
                background_sync = next.background_sync_enabled,
                forwarding = next.notification_forwarding_enabled,
                allowed_apps = next.allowed_apps.len(),
                "Settings updated"
            );
        }

        Ok(next)
    }

    /// 重新读取后端（其他进程可能修改过），有变化时发布
    pub async fn refresh(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let backend = Arc::clone(&self.backend);
        let loaded = tokio::task::spawn_blocking(move || backend.load())
            .await
            .context("Settings loader task failed")??
            .unwrap_or_default();

        let changed = self.tx.send_if_modified(|current| {
            if *current != loaded {
                *current = loaded.clone();
                true
            } else {
                false
            }
        });

        if changed {
            info!("Settings reloaded from storage");
        }
        Ok(changed)
    }
}

/// 设置订阅
pub struct SettingsWatcher {
    rx: watch::Receiver<Settings>,
    primed: bool,
}

impl SettingsWatcher {
    /// 下一个值；存储被销毁后返回 `None`
    ///
    /// 订阅者处理较慢时，中间值可能被合并，只保证拿到最新值。
    pub async fn next(&mut self) -> Option<Settings> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }

        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
