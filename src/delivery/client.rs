//! HTTP 上报客户端
//!
//! 每次调用都带上 host 和 API key，客户端本身不保存会话状态，
//! 设置在两次调用之间可能已经变化。

use super::payload::{DeliveryPayload, EventKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// API key 请求头
pub const API_KEY_HEADER: &str = "x-api-key";

/// 发送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// 服务端返回 2xx
    Delivered,
    /// 服务端返回非 2xx
    RejectedByServer(u16),
    /// 网络错误、超时等
    TransportFailure(String),
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered)
    }

    /// 交互路径上展示给用户的失败信息
    pub fn failure_message(&self) -> Option<String> {
        match self {
            DeliveryResult::Delivered => None,
            DeliveryResult::RejectedByServer(status) => {
                Some(format!("Server error (HTTP {})", status))
            }
            DeliveryResult::TransportFailure(cause) => Some(format!("Network error: {}", cause)),
        }
    }

    /// 交互路径：失败转换为错误
    pub fn into_result(self) -> Result<()> {
        match self.failure_message() {
            None => Ok(()),
            Some(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

/// 上报客户端
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    async fn send(&self, host: &str, api_key: &str, payload: &DeliveryPayload) -> DeliveryResult;
}

/// 拼接完整 URL：去掉多余空白和结尾 `/`，缺少协议时补 `https://`
pub fn endpoint_url(host: &str, path: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        format!("{}{}", host, path)
    } else {
        format!("https://{}{}", host, path)
    }
}

/// 基于 reqwest 的实现
#[derive(Debug, Clone)]
pub struct HttpDeliveryClient {
    client: Client,
}

impl HttpDeliveryClient {
    /// 创建客户端，`timeout` 为单次请求的上限
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, host: &str, api_key: &str, payload: &DeliveryPayload) -> DeliveryResult {
        let url = endpoint_url(host, payload.path());
        let kind: EventKind = payload.kind();

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&payload.to_json())
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                debug!(kind = %kind, url = %url, "Delivered");
                DeliveryResult::Delivered
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(kind = %kind, url = %url, status, "Rejected by server");
                DeliveryResult::RejectedByServer(status)
            }
            Err(e) => {
                warn!(kind = %kind, url = %url, error = %e, "HTTP request failed");
                DeliveryResult::TransportFailure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://x", "/internal/khlug-phone/status"),
            "https://x/internal/khlug-phone/status"
        );
        assert_eq!(
            endpoint_url(" https://x/ ", "/internal/khlug-phone/status"),
            "https://x/internal/khlug-phone/status"
        );
        assert_eq!(
            endpoint_url("example.org:8080", "/p"),
            "https://example.org:8080/p"
        );
        assert_eq!(endpoint_url("http://127.0.0.1:9000", "/p"), "http://127.0.0.1:9000/p");
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(DeliveryResult::Delivered.failure_message(), None);
        assert_eq!(
            DeliveryResult::RejectedByServer(401).failure_message().unwrap(),
            "Server error (HTTP 401)"
        );
        assert!(DeliveryResult::TransportFailure("timed out".to_string())
            .failure_message()
            .unwrap()
            .contains("timed out"));
    }

    #[test]
    fn test_into_result() {
        assert!(DeliveryResult::Delivered.into_result().is_ok());
        let err = DeliveryResult::RejectedByServer(500).into_result().unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpDeliveryClient::new(Duration::from_secs(10)).is_ok());
    }
}
