//! 已安装应用目录 - 基于 XDG `.desktop` 文件
//!
//! 转发流程只用它把应用 ID 解析成显示名称；完整列表只给 `apps` 命令用。

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// 已安装应用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledApp {
    /// 应用 ID（`.desktop` 文件名，不含扩展名）
    pub id: String,
    /// 显示名称
    pub name: String,
}

/// 应用 ID → 显示名称
pub trait AppNameResolver: Send + Sync {
    /// 解析失败返回 `None`，调用方回退到原始 ID
    fn resolve_name(&self, app_id: &str) -> Option<String>;
}

/// 已安装应用列表
pub trait AppCatalog: Send + Sync {
    fn installed_apps(&self) -> Vec<InstalledApp>;
}

/// 解析 `.desktop` 文件的目录实现
#[derive(Debug, Clone)]
pub struct DesktopEntryCatalog {
    dirs: Vec<PathBuf>,
}

/// 单个 `.desktop` 条目中关心的字段
#[derive(Debug, Default)]
struct DesktopEntry {
    name: Option<String>,
    hidden: bool,
}

impl DesktopEntryCatalog {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    fn parse_entry(path: &Path) -> Option<DesktopEntry> {
        let content = fs::read_to_string(path).ok()?;
        let mut entry = DesktopEntry::default();
        let mut in_main_section = false;

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                in_main_section = line == "[Desktop Entry]";
                continue;
            }
            if !in_main_section {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                // 只取未本地化的 Name
                "Name" if entry.name.is_none() => entry.name = Some(value.trim().to_string()),
                "NoDisplay" | "Hidden" if value.trim().eq_ignore_ascii_case("true") => {
                    entry.hidden = true
                }
                _ => {}
            }
        }

        Some(entry)
    }
}

impl AppNameResolver for DesktopEntryCatalog {
    fn resolve_name(&self, app_id: &str) -> Option<String> {
        if app_id.is_empty() || app_id.contains('/') {
            return None;
        }

        self.dirs
            .iter()
            .map(|dir| dir.join(format!("{}.desktop", app_id)))
            .filter(|path| path.exists())
            .find_map(|path| Self::parse_entry(&path).and_then(|e| e.name))
            .filter(|name| !name.is_empty())
    }
}

impl AppCatalog for DesktopEntryCatalog {
    fn installed_apps(&self) -> Vec<InstalledApp> {
        let mut apps: Vec<InstalledApp> = Vec::new();

        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };

            for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
                else {
                    continue;
                };
                // 目录顺序即优先级，前面的覆盖后面的
                if apps.iter().any(|app| app.id == id) {
                    continue;
                }

                if let Some(DesktopEntry {
                    name: Some(name),
                    hidden: false,
                }) = Self::parse_entry(&path)
                {
                    apps.push(InstalledApp { id, name });
                }
            }
        }

        apps.sort_by_key(|app| app.name.to_lowercase());
        apps
    }
}

/// 按名称或 ID 过滤（不区分大小写），空查询返回全部
pub fn filter_apps<'a>(apps: &'a [InstalledApp], query: &str) -> Vec<&'a InstalledApp> {
    let query = query.trim().to_lowercase();
    apps.iter()
        .filter(|app| {
            query.is_empty()
                || app.name.to_lowercase().contains(&query)
                || app.id.to_lowercase().contains(&query)
        })
        .collect()
}
