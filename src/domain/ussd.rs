//! USSD 推送支付的有限状态机。
//!
//! 状态机本身不做 I/O，也不持有定时器；由会话层驱动。每次新的支付尝试都会
//! 递增 `attempt`，旧尝试或已关闭会话的远端结果一律丢弃。

use crate::domain::entities::Order;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::sale::Sale;
use crate::domain::value_objects::{OrderStatus, UssdStatus};
use chrono::{DateTime, Utc};

/// 支付尝试编号
pub type Attempt = u64;

pub mod messages {
    pub const CREATING_ORDER: &str = "Creating payment order...";
    pub const ORDER_CREATED: &str = "Payment order created successfully. Triggering USSD popup...";
    pub const INITIATING: &str = "Sending payment request to customer's phone...";
    pub const PENDING: &str = "Waiting for customer to confirm payment on their phone...";
    pub const SUCCESS: &str = "Payment completed successfully!";
    pub const FAILED: &str = "Payment failed. Please try again.";
    pub const CANCELLED: &str = "Payment was cancelled by the customer.";
    pub const TIMEOUT: &str =
        "Payment request timed out. Please try again or enter the reference manually.";
    pub const SALE_FAILED: &str = "Failed to complete sale. Please contact support.";
}

/// 一次状态查询的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 旧尝试、会话已关闭或订单已终结，结果被丢弃
    Ignored,
    StillPending,
    Completed(Order),
    Failed,
    Cancelled,
}

impl PollOutcome {
    /// 轮询是否应当停止
    pub fn stops_polling(&self) -> bool {
        !matches!(self, PollOutcome::StillPending)
    }
}

#[derive(Debug, Clone)]
pub struct UssdPaymentMachine {
    status: UssdStatus,
    order: Option<Order>,
    attempt: Attempt,
    creating_order: bool,
    status_message: String,
    error: Option<String>,
    sale: Option<Sale>,
    closed_at: Option<DateTime<Utc>>,
    /// 最近一次状态变化
    updated_at: DateTime<Utc>,
}

impl Default for UssdPaymentMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl UssdPaymentMachine {
    pub fn new() -> Self {
        Self {
            status: UssdStatus::Idle,
            order: None,
            attempt: 0,
            creating_order: false,
            status_message: String::new(),
            error: None,
            sale: None,
            closed_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> UssdStatus {
        self.status
    }

    pub fn order(&self) -> Option<&Order> {
        self.order.as_ref()
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    pub fn is_creating_order(&self) -> bool {
        self.creating_order
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn sale(&self) -> Option<&Sale> {
        self.sale.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 结果是否属于已失效的尝试
    pub fn is_stale(&self, attempt: Attempt) -> bool {
        self.is_closed() || attempt != self.attempt
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::InvalidState {
                expected: "open session".to_string(),
                actual: "closed".to_string(),
            });
        }
        if self.sale.is_some() {
            return Err(DomainError::InvalidState {
                expected: "unpaid session".to_string(),
                actual: "sale completed".to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.status_message.clear();
        self.touch();
    }

    /// 记录一条不改变状态的错误（如校验失败），会话关闭后忽略
    pub fn report_error(&mut self, message: impl Into<String>) {
        if !self.is_closed() {
            self.set_error(message);
        }
    }

    /// 开始新的支付尝试（创建订单）
    pub fn begin_order(&mut self) -> DomainResult<Attempt> {
        self.ensure_open()?;
        if self.creating_order
            || matches!(
                self.status,
                UssdStatus::Triggering | UssdStatus::Sent | UssdStatus::Pending
            )
        {
            return Err(DomainError::InvalidState {
                expected: "no payment in progress".to_string(),
                actual: self.status.to_string(),
            });
        }

        self.attempt += 1;
        self.creating_order = true;
        self.order = None;
        self.status = UssdStatus::Idle;
        self.error = None;
        self.status_message = messages::CREATING_ORDER.to_string();
        self.touch();
        Ok(self.attempt)
    }

    pub fn order_created(&mut self, attempt: Attempt, order: Order) -> bool {
        if self.is_stale(attempt) {
            return false;
        }
        self.creating_order = false;
        self.order = Some(order);
        self.status_message = messages::ORDER_CREATED.to_string();
        self.touch();
        true
    }

    pub fn order_failed(&mut self, attempt: Attempt, message: impl Into<String>) -> bool {
        if self.is_stale(attempt) {
            return false;
        }
        self.creating_order = false;
        self.set_error(message);
        true
    }

    /// 进入 triggering；只允许在 idle 或 error 状态下对待支付订单发起
    pub fn begin_trigger(&mut self, attempt: Attempt) -> DomainResult<Order> {
        self.ensure_open()?;
        if self.is_stale(attempt) {
            return Err(DomainError::InvalidState {
                expected: format!("attempt {}", self.attempt),
                actual: format!("attempt {}", attempt),
            });
        }
        if !matches!(self.status, UssdStatus::Idle | UssdStatus::Error) {
            return Err(DomainError::InvalidState {
                expected: "idle or error".to_string(),
                actual: self.status.to_string(),
            });
        }
        let order = match &self.order {
            Some(order) if !order.is_finished() => order.clone(),
            Some(order) => {
                return Err(DomainError::InvalidState {
                    expected: OrderStatus::Pending.to_string(),
                    actual: order.status.to_string(),
                });
            }
            None => {
                return Err(DomainError::InvalidState {
                    expected: "created order".to_string(),
                    actual: "no order".to_string(),
                });
            }
        };

        self.status = UssdStatus::Triggering;
        self.error = None;
        self.status_message = messages::INITIATING.to_string();
        self.touch();
        Ok(order)
    }

    /// USSD 推送成功，返回是否应启动轮询
    pub fn trigger_succeeded(&mut self, attempt: Attempt) -> bool {
        if self.is_stale(attempt) || self.status != UssdStatus::Triggering {
            return false;
        }
        self.status = UssdStatus::Sent;
        self.status_message = messages::PENDING.to_string();
        self.touch();
        true
    }

    pub fn trigger_failed(&mut self, attempt: Attempt, message: impl Into<String>) -> bool {
        if self.is_stale(attempt) || self.status != UssdStatus::Triggering {
            return false;
        }
        self.status = UssdStatus::Error;
        self.set_error(message);
        true
    }

    /// 应用一次状态查询结果
    pub fn apply_status(
        &mut self,
        attempt: Attempt,
        remote: OrderStatus,
        reference: Option<String>,
    ) -> PollOutcome {
        if self.is_stale(attempt) || self.status.is_terminal() {
            return PollOutcome::Ignored;
        }
        let Some(order) = self.order.as_mut() else {
            return PollOutcome::Ignored;
        };
        if remote == OrderStatus::TimedOut || order.apply_remote_status(remote, reference).is_err()
        {
            return PollOutcome::Ignored;
        }

        match remote {
            OrderStatus::Completed => {
                self.status = UssdStatus::Completed;
                self.error = None;
                self.status_message = messages::SUCCESS.to_string();
                let order = order.clone();
                self.touch();
                PollOutcome::Completed(order)
            }
            OrderStatus::Failed => {
                self.status = UssdStatus::Failed;
                self.set_error(messages::FAILED);
                PollOutcome::Failed
            }
            OrderStatus::Cancelled => {
                self.status = UssdStatus::Cancelled;
                self.set_error(messages::CANCELLED);
                PollOutcome::Cancelled
            }
            _ => {
                if self.status.is_awaiting_customer() {
                    self.status = UssdStatus::Pending;
                    self.status_message = messages::PENDING.to_string();
                }
                self.touch();
                PollOutcome::StillPending
            }
        }
    }

    /// 超时只对仍在等待客户确认的尝试生效
    pub fn time_out(&mut self, attempt: Attempt) -> bool {
        if self.is_stale(attempt) || !self.status.is_awaiting_customer() {
            return false;
        }
        if let Some(order) = self.order.as_mut() {
            if order.mark_timed_out().is_err() {
                return false;
            }
        }
        self.status = UssdStatus::Timeout;
        self.set_error(messages::TIMEOUT);
        true
    }

    /// 手工参考号完成支付：作废当前尝试，直接进入 completed
    pub fn complete_manually(&mut self, order: Order) -> DomainResult<Attempt> {
        self.ensure_open()?;
        if order.status != OrderStatus::Completed {
            return Err(DomainError::InvalidState {
                expected: OrderStatus::Completed.to_string(),
                actual: order.status.to_string(),
            });
        }
        self.attempt += 1;
        self.creating_order = false;
        self.order = Some(order);
        self.status = UssdStatus::Completed;
        self.error = None;
        self.status_message = messages::SUCCESS.to_string();
        self.touch();
        Ok(self.attempt)
    }

    pub fn record_sale(&mut self, sale: Sale) {
        self.sale = Some(sale);
        self.touch();
    }

    pub fn sale_failed(&mut self) {
        self.set_error(messages::SALE_FAILED);
    }

    /// 关闭会话；只有第一次调用返回 true
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        let now = Utc::now();
        self.closed_at = Some(now);
        self.updated_at = now;
        self.creating_order = false;
        true
    }
}
