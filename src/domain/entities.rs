use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{Money, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 购物车条目（只读输入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

/// 顾客信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Customer {
    /// 移动支付只要求手机号
    pub fn require_phone(&self) -> DomainResult<&str> {
        match self.phone.as_deref().map(str::trim) {
            Some(phone) if !phone.is_empty() => Ok(phone),
            _ => Err(DomainError::ValidationError(
                "Customer phone number is required for mobile money payment".to_string(),
            )),
        }
    }

    /// 没有邮箱时按手机号生成占位邮箱
    pub fn billing_email(&self) -> DomainResult<String> {
        match self.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => Ok(email.to_string()),
            _ => Ok(format!("{}@mobile.money", self.require_phone()?)),
        }
    }
}

/// 收银员（显式传入，不从全局读取）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operator {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Operator {
    pub fn display_name(&self) -> String {
        self.name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or("POS User")
            .to_string()
    }
}

/// ZenoPay 支付订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// ZenoPay 订单号
    pub order_id: String,

    pub buyer_phone: String,

    pub buyer_name: String,

    pub buyer_email: String,

    /// 支付金额
    pub amount: Money,

    /// 订单状态
    pub status: OrderStatus,

    /// 移动支付流水号（完成后返回）
    pub reference: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 远端创建成功后生成待支付订单
    pub fn new(order_id: String, customer: &Customer, amount: Money) -> DomainResult<Self> {
        if order_id.trim().is_empty() {
            return Err(DomainError::ZenoPayError(
                "ZenoPay returned an empty order id".to_string(),
            ));
        }

        if !amount.is_positive() {
            return Err(DomainError::ValidationError(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let now = Utc::now();

        Ok(Self {
            order_id,
            buyer_phone: customer.require_phone()?.to_string(),
            buyer_name: customer.name.clone(),
            buyer_email: customer.billing_email()?,
            amount,
            status: OrderStatus::Pending,
            reference: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// 收银员手工录入参考号时使用的订单，直接处于完成状态
    pub fn manual(customer: &Customer, amount: Money, reference: String) -> DomainResult<Self> {
        let now = Utc::now();
        let mut order = Self::new(
            format!("MANUAL_{}", now.timestamp_millis()),
            customer,
            amount,
        )?;
        order.status = OrderStatus::Completed;
        order.reference = Some(reference);
        Ok(order)
    }

    /// 应用远端返回的状态；返回状态是否发生变化
    pub fn apply_remote_status(
        &mut self,
        status: OrderStatus,
        reference: Option<String>,
    ) -> DomainResult<bool> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidState {
                expected: OrderStatus::Pending.to_string(),
                actual: self.status.to_string(),
            });
        }

        if reference.is_some() {
            self.reference = reference;
        }

        if status == self.status {
            return Ok(false);
        }

        self.status = status;
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// 标记为超时
    pub fn mark_timed_out(&mut self) -> DomainResult<()> {
        self.apply_remote_status(OrderStatus::TimedOut, None).map(|_| ())
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
