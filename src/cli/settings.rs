//! 设置相关命令 - status / config / apps / forwarding / sync

use super::context::AppContext;
use super::output::format_output;
use crate::config::RelayConfig;
use crate::infra::{filter_apps, AppCatalog, AppNameResolver, NotificationAccess, StdinListenerAccess};
use crate::settings::{Settings, SettingsUpdate};
use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;

/// 开关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}

/// config 子命令
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// 显示当前设置
    Show {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 修改服务器地址和 API key
    Set {
        /// 服务器地址，如 https://example.org
        #[arg(long)]
        host: Option<String>,
        /// API key
        #[arg(long)]
        api_key: Option<String>,
    },
}

/// apps 子命令
#[derive(Subcommand)]
pub enum AppsCommand {
    /// 列出已安装应用（标记是否允许转发）
    List {
        /// 按名称或 ID 搜索
        #[arg(long, short)]
        query: Option<String>,
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 允许转发某个应用的通知
    Allow {
        /// 应用 ID
        app_id: String,
    },
    /// 不再转发某个应用的通知
    Deny {
        /// 应用 ID
        app_id: String,
    },
}

/// status 命令参数
#[derive(Args)]
pub struct StatusArgs {
    /// 输出 JSON 格式
    #[arg(long)]
    pub json: bool,
}

/// 状态输出
#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub configured: bool,
    pub host: String,
    pub api_key: String,
    pub background_sync_enabled: bool,
    pub notification_forwarding_enabled: bool,
    pub notification_access_granted: bool,
    pub allowed_apps: Vec<AllowedApp>,
    pub settings_path: String,
}

/// 允许列表条目（名称仅用于展示，按需解析）
#[derive(Debug, Serialize)]
pub struct AllowedApp {
    pub id: String,
    pub name: String,
}

/// 应用列表条目
#[derive(Debug, Serialize)]
pub struct AppListEntry {
    pub id: String,
    pub name: String,
    pub allowed: bool,
}

fn status_output(ctx: &AppContext, settings: &Settings) -> StatusOutput {
    let access = StdinListenerAccess;
    let allowed_apps = settings
        .allowed_apps
        .iter()
        .map(|id| AllowedApp {
            id: id.clone(),
            name: ctx.catalog.resolve_name(id).unwrap_or_else(|| id.clone()),
        })
        .collect();

    StatusOutput {
        configured: settings.is_configured(),
        host: settings.host.clone(),
        api_key: settings.masked_api_key(),
        background_sync_enabled: settings.background_sync_enabled,
        notification_forwarding_enabled: settings.notification_forwarding_enabled,
        notification_access_granted: access.is_granted(),
        allowed_apps,
        settings_path: RelayConfig::settings_path().display().to_string(),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "开启"
    } else {
        "关闭"
    }
}

/// 处理 status 命令
pub fn handle_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let settings = ctx.settings.get();
    let status = status_output(ctx, &settings);

    if args.json {
        println!("{}", format_output(&status, true));
        return Ok(());
    }

    println!("配置状态: {}", if status.configured { "已配置" } else { "未配置" });
    println!("  服务器: {}", if status.host.is_empty() { "-" } else { &status.host });
    println!("  API key: {}", if status.api_key.is_empty() { "-" } else { &status.api_key });
    println!("  后台电池同步: {}", on_off(status.background_sync_enabled));
    println!("  通知转发: {}", on_off(status.notification_forwarding_enabled));
    if !status.notification_access_granted {
        println!("  通知权限未授予: {}", StdinListenerAccess.settings_hint());
    }
    println!("  允许转发的应用 ({}):", status.allowed_apps.len());
    for app in &status.allowed_apps {
        println!("    {} ({})", app.name, app.id);
    }
    println!("  设置文件: {}", status.settings_path);
    Ok(())
}

/// 处理 config 命令
pub async fn handle_config(ctx: &AppContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => handle_status(ctx, StatusArgs { json }),
        ConfigCommand::Set { host, api_key } => {
            if host.is_none() && api_key.is_none() {
                anyhow::bail!("Nothing to update, pass --host and/or --api-key");
            }

            let update = SettingsUpdate {
                host: host.map(|h| h.trim().to_string()),
                api_key: api_key.map(|k| k.trim().to_string()),
                ..Default::default()
            };
            let settings = ctx.settings.set(update).await?;

            println!("✓ 设置已保存");
            if !settings.is_configured() {
                println!("⚠️  host 和 API key 都设置后才会开始上报");
            }
            Ok(())
        }
    }
}

/// 处理 apps 命令
pub async fn handle_apps(ctx: &AppContext, command: AppsCommand) -> Result<()> {
    match command {
        AppsCommand::List { query, json } => {
            let settings = ctx.settings.get();
            let apps = ctx.catalog.installed_apps();
            let entries: Vec<AppListEntry> = filter_apps(&apps, query.as_deref().unwrap_or(""))
                .into_iter()
                .map(|app| AppListEntry {
                    id: app.id.clone(),
                    name: app.name.clone(),
                    allowed: settings.is_app_allowed(&app.id),
                })
                .collect();

            if json {
                println!("{}", format_output(&entries, true));
            } else {
                println!("发现 {} 个应用:\n", entries.len());
                for entry in entries {
                    let mark = if entry.allowed { "✓" } else { " " };
                    println!("  [{}] {} | {}", mark, entry.name, entry.id);
                }
            }
            Ok(())
        }
        AppsCommand::Allow { app_id } => {
            let current = ctx.settings.get();
            ctx.settings
                .set(SettingsUpdate::allow_app(&current, &app_id))
                .await?;
            println!("✓ 已允许转发: {}", app_id);
            Ok(())
        }
        AppsCommand::Deny { app_id } => {
            let current = ctx.settings.get();
            if !current.is_app_allowed(&app_id) {
                println!("{} 不在允许列表中", app_id);
                return Ok(());
            }
            ctx.settings
                .set(SettingsUpdate::deny_app(&current, &app_id))
                .await?;
            println!("✓ 已停止转发: {}", app_id);
            Ok(())
        }
    }
}

/// 处理 forwarding 命令
pub async fn handle_forwarding(ctx: &AppContext, state: Toggle) -> Result<()> {
    ctx.settings
        .set(SettingsUpdate::new().notification_forwarding(state.enabled()))
        .await?;
    println!("✓ 通知转发已{}", on_off(state.enabled()));
    Ok(())
}

/// 处理 sync 命令
///
/// 只保存开关；运行中的 daemon 读到新设置后注册或注销周期任务。
pub async fn handle_sync(ctx: &AppContext, state: Toggle) -> Result<()> {
    ctx.settings
        .set(SettingsUpdate::new().background_sync(state.enabled()))
        .await?;
    println!("✓ 后台电池同步已{}", on_off(state.enabled()));
    Ok(())
}
