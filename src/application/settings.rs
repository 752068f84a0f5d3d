use crate::domain::{MobileProvider, TaxPolicy};
use std::time::Duration;

/// 结账会话的运行参数，由调用方显式传入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckoutSettings {
    /// 状态轮询间隔
    pub poll_interval: Duration,
    /// 从推送成功开始计算的等待上限
    pub poll_timeout: Duration,
    pub tax_policy: TaxPolicy,
    /// 手工参考号校验所用的渠道
    pub provider: MobileProvider,
    /// 已关闭会话保留多久后清理
    pub session_retention: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(5 * 60),
            tax_policy: TaxPolicy::default(),
            provider: MobileProvider::ZenoPay,
            session_retention: Duration::from_secs(10 * 60),
        }
    }
}
