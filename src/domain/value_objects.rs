use crate::domain::errors::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 远端订单状态（订单只能从 Pending 前进到某个终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// 待支付
    Pending,
    /// 支付完成
    Completed,
    /// 支付失败
    Failed,
    /// 客户取消
    Cancelled,
    /// 轮询超时
    TimedOut,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// 解析 ZenoPay 返回的 payment_status 字段
    pub fn from_remote(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "COMPLETED" | "SUCCESS" | "SUCCESSFUL" => Some(OrderStatus::Completed),
            "FAILED" => Some(OrderStatus::Failed),
            "CANCELLED" | "CANCELED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Failed => write!(f, "failed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
            OrderStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// USSD 推送流程状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UssdStatus {
    Idle,
    Triggering,
    Sent,
    Pending,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    /// 推送失败，可由操作员重试
    Error,
}

impl UssdStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UssdStatus::Completed | UssdStatus::Failed | UssdStatus::Cancelled | UssdStatus::Timeout
        )
    }

    /// 是否处于需要轮询的状态
    pub fn is_awaiting_customer(&self) -> bool {
        matches!(self, UssdStatus::Sent | UssdStatus::Pending)
    }
}

impl fmt::Display for UssdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UssdStatus::Idle => "idle",
            UssdStatus::Triggering => "triggering",
            UssdStatus::Sent => "sent",
            UssdStatus::Pending => "pending",
            UssdStatus::Completed => "completed",
            UssdStatus::Failed => "failed",
            UssdStatus::Cancelled => "cancelled",
            UssdStatus::Timeout => "timeout",
            UssdStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// 移动支付渠道，决定手工参考号的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MobileProvider {
    ZenoPay,
    MPesa,
    AirtelMoney,
    TigoPesa,
}

impl MobileProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "zenopay" => Some(MobileProvider::ZenoPay),
            "mpesa" => Some(MobileProvider::MPesa),
            "airtelmoney" | "airtel" => Some(MobileProvider::AirtelMoney),
            "tigopesa" | "tigo" => Some(MobileProvider::TigoPesa),
            _ => None,
        }
    }
}

impl fmt::Display for MobileProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MobileProvider::ZenoPay => write!(f, "ZenoPay"),
            MobileProvider::MPesa => write!(f, "M-Pesa"),
            MobileProvider::AirtelMoney => write!(f, "Airtel Money"),
            MobileProvider::TigoPesa => write!(f, "Tigo Pesa"),
        }
    }
}

/// 支付完成的途径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    UssdPopup,
    ManualReference,
}

impl fmt::Display for PaymentChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentChannel::UssdPopup => write!(f, "ussd_popup"),
            PaymentChannel::ManualReference => write!(f, "manual_reference"),
        }
    }
}

/// 货币金额（TZS，以分为单位，避免浮点数精度问题）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Money {
    /// 金额（分）
    pub amount_cents: i64,
}

impl Money {
    pub const ZERO: Money = Money { amount_cents: 0 };

    /// 创建新的金额对象（单位：先令），超出范围时饱和
    pub fn from_shillings(amount: i64) -> Self {
        Self {
            amount_cents: amount.saturating_mul(100),
        }
    }

    /// 创建新的金额对象（单位：分）
    pub fn from_cents(cents: i64) -> Self {
        Self { amount_cents: cents }
    }

    /// 转换为先令
    pub fn to_shillings(&self) -> f64 {
        self.amount_cents as f64 / 100.0
    }

    /// 转换为分
    pub fn to_cents(&self) -> i64 {
        self.amount_cents
    }

    pub fn is_positive(&self) -> bool {
        self.amount_cents > 0
    }

    /// 按基点计算比例金额，四舍五入
    pub fn percent_bps(&self, bps: u32) -> DomainResult<Money> {
        let scaled = self.amount_cents as i128 * bps as i128;
        let rounded = (scaled + 5_000 * scaled.signum()) / 10_000;
        i64::try_from(rounded)
            .map(Money::from_cents)
            .map_err(|_| amount_too_large())
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Money> {
        self.amount_cents
            .checked_add(rhs.amount_cents)
            .map(Money::from_cents)
            .ok_or_else(amount_too_large)
    }

    pub fn checked_sub(self, rhs: Money) -> DomainResult<Money> {
        self.amount_cents
            .checked_sub(rhs.amount_cents)
            .map(Money::from_cents)
            .ok_or_else(amount_too_large)
    }

    /// 求和，溢出时返回校验错误
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> DomainResult<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

fn amount_too_large() -> DomainError {
    DomainError::ValidationError("Amount is too large".to_string())
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TZS {:.2}", self.to_shillings())
    }
}

/// 税率策略（默认 16% 增值税，可配置）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub enabled: bool,
    /// 税率（基点，1600 = 16%）
    pub rate_bps: u32,
}

impl TaxPolicy {
    pub fn new(enabled: bool, rate_bps: u32) -> Self {
        Self { enabled, rate_bps }
    }

    pub fn exempt() -> Self {
        Self {
            enabled: false,
            rate_bps: 0,
        }
    }

    pub fn tax_on(&self, subtotal: Money) -> DomainResult<Money> {
        if self.enabled {
            subtotal.percent_bps(self.rate_bps)
        } else {
            Ok(Money::ZERO)
        }
    }
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            rate_bps: 1600,
        }
    }
}
