//! 手动上报命令 - battery / notify
//!
//! 交互路径：发送失败时把可读的错误返回给用户。

use super::context::AppContext;
use crate::notification::{ForwardOutcome, JsonNotification, NotificationForwarder};
use crate::sync::BatterySyncWorker;
use anyhow::Result;
use clap::Args;

/// battery 命令参数
#[derive(Args)]
pub struct BatteryArgs {
    /// 只读取电池状态，不上报
    #[arg(long)]
    pub no_send: bool,
}

/// notify 命令参数
#[derive(Args)]
pub struct NotifyArgs {
    /// 来源应用 ID
    #[arg(long)]
    pub app_id: String,
    /// 通知标题
    #[arg(long)]
    pub title: Option<String>,
    /// 通知正文
    #[arg(long)]
    pub body: Option<String>,
}

/// 处理 battery 命令
pub async fn handle_battery(ctx: &AppContext, args: BatteryArgs) -> Result<()> {
    if args.no_send {
        let battery = ctx.battery.read().await;
        println!("{}", battery.display_text());
        return Ok(());
    }

    let worker = BatterySyncWorker::new(
        ctx.settings.clone(),
        ctx.battery.clone(),
        ctx.delivery.clone(),
    );

    let attempt = worker.attempt().await;
    if let Some(battery) = attempt.battery() {
        println!("{}", battery.display_text());
    }
    attempt.into_result()?;
    println!("✓ 电池状态已上报");
    Ok(())
}

/// 处理 notify 命令（走完整的过滤和转发流程）
pub async fn handle_notify(ctx: &AppContext, args: NotifyArgs) -> Result<()> {
    let forwarder = NotificationForwarder::new(
        ctx.settings.clone(),
        ctx.delivery.clone(),
        ctx.catalog.clone(),
    );
    let handle = JsonNotification {
        title: args.title,
        text: args.body,
    };

    match forwarder.process(&args.app_id, &handle).await {
        ForwardOutcome::Delivered => {
            println!("✓ 通知已转发");
            Ok(())
        }
        ForwardOutcome::Filtered(reason) => {
            println!("通知未转发: {}", reason);
            Ok(())
        }
        ForwardOutcome::Failed(result) => result.into_result(),
        ForwardOutcome::Cancelled => anyhow::bail!("Forwarding was cancelled"),
    }
}
