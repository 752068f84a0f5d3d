//! 测试用的假端口实现

use crate::application::dto::OpenSessionRequest;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{CartItem, Customer, Money, Operator, OrderStatus, Sale};
use crate::ports::zenopay_port::*;
use crate::ports::{CheckoutListener, ZenoPayPort};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub fn checkout_request() -> OpenSessionRequest {
    OpenSessionRequest {
        cart_items: vec![
            CartItem {
                product_id: "p-1".to_string(),
                variant_id: "v-1".to_string(),
                product_name: "Phone case".to_string(),
                variant_name: Some("Black".to_string()),
                sku: Some("CASE-BLK".to_string()),
                quantity: 2,
                unit_price: Money::from_shillings(2_500),
                total_price: Money::from_shillings(5_000),
            },
            CartItem {
                product_id: "p-2".to_string(),
                variant_id: "v-2".to_string(),
                product_name: "Charger".to_string(),
                variant_name: None,
                sku: None,
                quantity: 1,
                unit_price: Money::from_shillings(5_000),
                total_price: Money::from_shillings(5_000),
            },
        ],
        customer: Customer {
            id: "cust-1".to_string(),
            name: "Amina Juma".to_string(),
            email: None,
            phone: Some("255712345678".to_string()),
        },
        amount: Money::from_shillings(10_000),
        operator: Operator {
            name: Some("Neema".to_string()),
            email: None,
        },
    }
}

/// 按脚本返回状态的 ZenoPay；脚本耗尽后一直返回 Pending
pub struct FakeZenoPay {
    statuses: Mutex<VecDeque<OrderStatus>>,
    status_delay: Duration,
    pub fail_create: AtomicBool,
    pub fail_trigger: AtomicBool,
    pub create_calls: AtomicUsize,
    pub trigger_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl FakeZenoPay {
    pub fn with_statuses(statuses: &[OrderStatus]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            status_delay: Duration::ZERO,
            fail_create: AtomicBool::new(false),
            fail_trigger: AtomicBool::new(false),
            create_calls: AtomicUsize::new(0),
            trigger_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        }
    }

    pub fn always_pending() -> Self {
        Self::with_statuses(&[])
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }
}

#[async_trait]
impl ZenoPayPort for FakeZenoPay {
    async fn create_order(&self, _request: CreateOrderRequest) -> DomainResult<CreateOrderResponse> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(DomainError::ZenoPayError("Failed to create payment order".to_string()));
        }
        Ok(CreateOrderResponse {
            order_id: format!("ZP-{}", n),
        })
    }

    async fn trigger_ussd(&self, _request: UssdPushRequest) -> DomainResult<UssdPushResponse> {
        self.trigger_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_trigger.load(Ordering::SeqCst) {
            return Err(DomainError::ZenoPayError("USSD popup rejected".to_string()));
        }
        Ok(UssdPushResponse {
            message: Some("USSD push sent".to_string()),
        })
    }

    async fn check_status(&self, order_id: &str) -> DomainResult<OrderStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OrderStatus::Pending);
        Ok(OrderStatusResponse {
            status,
            reference: (status == OrderStatus::Completed).then(|| format!("REF-{}", order_id)),
        })
    }
}

/// 记录回调的监听器
#[derive(Default)]
pub struct RecordingListener {
    sales: Mutex<Vec<Sale>>,
    fail: bool,
    delay: Duration,
    pub started: AtomicUsize,
    pub closes: AtomicUsize,
}

impl RecordingListener {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// 交接销售记录前先等待 `delay`
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.sales.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckoutListener for RecordingListener {
    async fn on_payment_complete(&self, _session_id: Uuid, sale: &Sale) -> DomainResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(DomainError::InternalError("sale store unavailable".to_string()));
        }
        self.sales.lock().unwrap().push(sale.clone());
        Ok(())
    }

    async fn on_close(&self, _session_id: Uuid) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
