use crate::domain::errors::{DomainError, DomainResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// ZenoPay 网关配置
#[derive(Clone)]
pub struct ZenoPayConfig {
    /// 网关基础URL
    pub base_url: String,

    /// API密钥（x-api-key 头）
    pub api_key: String,

    /// 支付结果回调地址
    pub webhook_url: Option<String>,

    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 日志中不输出 API 密钥
impl fmt::Debug for ZenoPayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZenoPayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("webhook_url", &self.webhook_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ZenoPayConfig {
    pub fn from_env() -> DomainResult<Arc<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok()).map(Arc::new)
    }

    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ZENOPAY_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                DomainError::ConfigurationError("ZENOPAY_API_KEY must be set".to_string())
            })?;

        let request_timeout_secs = match lookup("ZENOPAY_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                DomainError::ConfigurationError(format!(
                    "ZENOPAY_REQUEST_TIMEOUT_SECS is not a number: {}",
                    raw
                ))
            })?,
            None => 30,
        };

        Ok(Self {
            base_url: lookup("ZENOPAY_BASE_URL")
                .unwrap_or_else(|| "https://zenoapi.com/api/payments".to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            webhook_url: lookup("ZENOPAY_WEBHOOK_URL").filter(|v| !v.is_empty()),
            request_timeout_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn create_order_url(&self) -> String {
        format!("{}/create-order", self.base_url)
    }

    pub fn trigger_ussd_url(&self) -> String {
        format!("{}/trigger-ussd", self.base_url)
    }

    pub fn check_status_url(&self) -> String {
        format!("{}/order-status", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_api_key_required() {
        let result = ZenoPayConfig::from_lookup(lookup(&[]));
        assert!(matches!(result, Err(DomainError::ConfigurationError(_))));
    }

    #[test]
    fn test_urls_built_from_base() {
        let config = ZenoPayConfig::from_lookup(lookup(&[
            ("ZENOPAY_API_KEY", "secret"),
            ("ZENOPAY_BASE_URL", "http://localhost:8000/api/zenopay/"),
        ]))
        .unwrap();

        assert_eq!(config.create_order_url(), "http://localhost:8000/api/zenopay/create-order");
        assert_eq!(config.check_status_url(), "http://localhost:8000/api/zenopay/order-status");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.webhook_url.is_none());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config =
            ZenoPayConfig::from_lookup(lookup(&[("ZENOPAY_API_KEY", "zp-live-secret")])).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("zp-live-secret"));
        assert!(printed.contains("zenoapi.com"));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        let result = ZenoPayConfig::from_lookup(lookup(&[
            ("ZENOPAY_API_KEY", "secret"),
            ("ZENOPAY_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert!(result.is_err());
    }
}
