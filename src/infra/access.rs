//! 通知读取权限
//!
//! 权限由用户在系统中另行授予，这里只检查是否已授予，并告诉用户去哪里打开。

/// 通知监听权限
pub trait NotificationAccess: Send + Sync {
    /// 当前是否已授予
    fn is_granted(&self) -> bool;

    /// 打开授权页面的提示
    fn settings_hint(&self) -> String;
}

/// 标准输入事件源：通知由上游进程推送，不需要额外授权
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinListenerAccess;

impl NotificationAccess for StdinListenerAccess {
    fn is_granted(&self) -> bool {
        true
    }

    fn settings_hint(&self) -> String {
        "Pipe notification events as JSON lines into `drelay daemon`".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stdin_listener_is_granted() {
        let access = StdinListenerAccess;
        assert!(access.is_granted());
        assert!(access.settings_hint().contains("drelay daemon"));
    }
}
