//! Device Relay CLI
//!
//! 把本机电池状态和通知转发到远程服务器

use anyhow::Result;
use clap::{Parser, Subcommand};
use device_relay::cli::{
    handle_apps, handle_battery, handle_config, handle_daemon, handle_forwarding, handle_notify,
    handle_status, handle_sync, AppContext, AppsCommand, BatteryArgs, ConfigCommand, NotifyArgs,
    StatusArgs, Toggle,
};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "drelay")]
#[command(about = "Device Relay - 转发电池状态和通知到远程服务器")]
#[command(version)]
struct Cli {
    /// 输出调试日志
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示当前配置和开关状态
    Status(StatusArgs),
    /// 查看或修改服务器配置
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// 管理允许转发通知的应用
    Apps {
        #[command(subcommand)]
        command: AppsCommand,
    },
    /// 开启或关闭通知转发
    Forwarding {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// 开启或关闭后台电池同步
    Sync {
        #[arg(value_enum)]
        state: Toggle,
    },
    /// 读取并上报一次电池状态
    Battery(BatteryArgs),
    /// 手动转发一条通知
    Notify(NotifyArgs),
    /// 常驻运行：从标准输入接收通知事件，并按设置定期同步电池状态
    Daemon,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    // 例如: RUST_LOG=debug drelay daemon
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "device_relay={level},drelay={level}",
            level = default_level
        ))
    });

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let ctx = AppContext::load().await?;

    match cli.command {
        Commands::Status(args) => handle_status(&ctx, args)?,
        Commands::Config { command } => handle_config(&ctx, command).await?,
        Commands::Apps { command } => handle_apps(&ctx, command).await?,
        Commands::Forwarding { state } => handle_forwarding(&ctx, state).await?,
        Commands::Sync { state } => handle_sync(&ctx, state).await?,
        Commands::Battery(args) => handle_battery(&ctx, args).await?,
        Commands::Notify(args) => handle_notify(&ctx, args).await?,
        Commands::Daemon => handle_daemon(ctx).await?,
    }

    Ok(())
}
