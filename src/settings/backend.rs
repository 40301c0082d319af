//! 设置持久化后端

use super::{Settings, SettingsUpdate};
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// 设置存储引擎
///
/// `load` 返回 `None` 表示尚未写入过（首次访问时由调用方套用默认值）。
pub trait SettingsBackend: Send + Sync {
    fn load(&self) -> Result<Option<Settings>>;

    fn save(&self, settings: &Settings) -> Result<()>;

    /// 读取最新记录、应用更新并写回，整个过程互斥
    fn update(&self, update: &SettingsUpdate) -> Result<Settings>;
}

/// JSON 文件后端（带文件锁，原子替换）
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("json.lock")
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension(format!("json.tmp.{}", std::process::id()))
    }

    /// 跨进程互斥：CLI 和 daemon 可能同时写
    fn with_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        use fs2::FileExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())
            .context("Failed to open settings lock file")?;
        lock.lock_exclusive()?;

        let result = f();

        lock.unlock()?;
        result
    }

    /// 写临时文件后原子替换（调用方持有锁）
    fn write(&self, settings: &Settings) -> Result<()> {
        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(serde_json::to_string_pretty(settings)?.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<Settings>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let settings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file {}", self.path.display()))?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        self.with_lock(|| self.write(settings))
    }

    fn update(&self, update: &SettingsUpdate) -> Result<Settings> {
        // 在锁内重新读取，其他进程的写入不会被旧快照覆盖
        self.with_lock(|| {
            let mut settings = self.load()?.unwrap_or_default();
            settings.apply(update);
            self.write(&settings)?;
            Ok(settings)
        })
    }
}

/// 内存后端（测试和一次性命令使用）
#[derive(Debug, Default)]
pub struct MemoryBackend {
    value: Mutex<Option<Settings>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            value: Mutex::new(Some(settings)),
        }
    }
}

impl SettingsBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Settings>> {
        let guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("settings backend lock poisoned"))?;
        Ok(guard.clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("settings backend lock poisoned"))?;
        *guard = Some(settings.clone());
        Ok(())
    }

    fn update(&self, update: &SettingsUpdate) -> Result<Settings> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| anyhow::anyhow!("settings backend lock poisoned"))?;
        let mut settings = guard.clone().unwrap_or_default();
        settings.apply(update);
        *guard = Some(settings.clone());
        Ok(settings)
    }
}
