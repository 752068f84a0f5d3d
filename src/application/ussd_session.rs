use crate::application::dto::{OpenSessionRequest, SessionSnapshot};
use crate::application::settings::CheckoutSettings;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::reference::{reference_placeholder, validate_reference};
use crate::domain::{
    Attempt, Order, PaymentChannel, PollOutcome, Sale, SaleContext, SaleTotals,
    UssdPaymentMachine,
};
use crate::ports::zenopay_port::{
    CreateOrderRequest, OrderLineMetadata, OrderMetadata, OrderStatusResponse, UssdPushRequest,
};
use crate::ports::{CheckoutListener, ZenoPayPort};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct SessionInner<Z: ZenoPayPort> {
    id: Uuid,
    zenopay: Arc<Z>,
    listener: Arc<dyn CheckoutListener>,
    settings: CheckoutSettings,
    checkout: OpenSessionRequest,
    machine: tokio::sync::Mutex<UssdPaymentMachine>,
    /// 当前轮询任务；同一时间最多一个
    poller: Mutex<Option<JoinHandle<()>>>,
}

/// 一次 USSD 移动支付结账会话（对应收银台的支付弹窗）
///
/// 会话被丢弃或关闭时，未完成的轮询任务会被取消。
pub struct UssdPaymentSession<Z: ZenoPayPort> {
    inner: Arc<SessionInner<Z>>,
}

impl<Z: ZenoPayPort> UssdPaymentSession<Z> {
    pub fn new(
        zenopay: Arc<Z>,
        listener: Arc<dyn CheckoutListener>,
        settings: CheckoutSettings,
        checkout: OpenSessionRequest,
    ) -> DomainResult<Self> {
        if checkout.cart_items.is_empty() {
            return Err(DomainError::ValidationError("Cart is empty".to_string()));
        }
        if !checkout.amount.is_positive() {
            return Err(DomainError::ValidationError(
                "Amount must be greater than 0".to_string(),
            ));
        }
        // 金额溢出在打开会话时就拒绝，不等到收款之后
        SaleTotals::compute(&checkout.cart_items, settings.tax_policy)?;

        Ok(Self {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                zenopay,
                listener,
                settings,
                checkout,
                machine: tokio::sync::Mutex::new(UssdPaymentMachine::new()),
                poller: Mutex::new(None),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let machine = self.inner.machine.lock().await;
        self.inner.snapshot_of(&machine)
    }

    /// 会话从何时起处于空闲；正在创建订单或轮询时返回 None
    pub async fn idle_since(&self) -> Option<DateTime<Utc>> {
        let machine = self.inner.machine.lock().await;
        if let Some(closed_at) = machine.closed_at() {
            return Some(closed_at);
        }
        if machine.is_creating_order() || self.inner.is_polling() {
            return None;
        }
        Some(machine.updated_at())
    }

    pub fn is_polling(&self) -> bool {
        self.inner.is_polling()
    }

    /// 创建 ZenoPay 订单并立即推送 USSD
    pub async fn start(&self) -> DomainResult<()> {
        let inner = &self.inner;
        let attempt = {
            let mut machine = inner.machine.lock().await;
            if let Err(e) = inner.checkout.customer.require_phone() {
                machine.report_error(e.user_message());
                return Err(e);
            }
            let attempt = machine.begin_order()?;
            inner.cancel_poller();
            attempt
        };

        let customer = &inner.checkout.customer;
        let request = CreateOrderRequest {
            buyer_email: customer.billing_email()?,
            buyer_name: customer.name.clone(),
            buyer_phone: customer.require_phone()?.to_string(),
            amount: inner.checkout.amount,
            metadata: OrderMetadata {
                cart_items: inner
                    .checkout
                    .cart_items
                    .iter()
                    .map(OrderLineMetadata::from)
                    .collect(),
                customer_id: customer.id.clone(),
                pos_session_id: format!("pos_{}", inner.id.simple()),
                order_type: "pos_sale".to_string(),
                payment_method: PaymentChannel::UssdPopup.to_string(),
            },
        };

        info!("Session {} creating payment order (attempt {})", inner.id, attempt);

        let created = inner
            .zenopay
            .create_order(request)
            .await
            .and_then(|response| Order::new(response.order_id, customer, inner.checkout.amount));

        match created {
            Ok(order) => {
                info!("Session {} created order {}", inner.id, order.order_id);
                let mut machine = inner.machine.lock().await;
                if !machine.order_created(attempt, order) {
                    debug!("Session {} dropped stale order for attempt {}", inner.id, attempt);
                    return Ok(());
                }
            }
            Err(e) => {
                warn!("Session {} failed to create order: {}", inner.id, e);
                inner
                    .machine
                    .lock()
                    .await
                    .order_failed(attempt, e.user_message());
                return Err(e);
            }
        }

        Arc::clone(inner).trigger(attempt).await
    }

    /// 操作员手动重新推送 USSD
    pub async fn retry_ussd(&self) -> DomainResult<()> {
        let attempt = self.inner.machine.lock().await.attempt();
        Arc::clone(&self.inner).trigger(attempt).await
    }

    /// 立即查询一次订单状态（不等待轮询）
    pub async fn check_status_now(&self) -> DomainResult<SessionSnapshot> {
        let inner = &self.inner;
        let (attempt, order_id) = {
            let machine = inner.machine.lock().await;
            match machine.order() {
                Some(order) if !order.is_finished() && !machine.is_closed() => {
                    (machine.attempt(), order.order_id.clone())
                }
                Some(order) => {
                    return Err(DomainError::InvalidState {
                        expected: "pending order".to_string(),
                        actual: order.status.to_string(),
                    });
                }
                None => {
                    return Err(DomainError::InvalidState {
                        expected: "created order".to_string(),
                        actual: "no order".to_string(),
                    });
                }
            }
        };

        let response = match inner.zenopay.check_status(&order_id).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Session {} status check failed: {}", inner.id, e);
                inner.machine.lock().await.report_error(e.user_message());
                return Err(e);
            }
        };

        let outcome = inner.handle_status(attempt, response).await;
        if !matches!(outcome, PollOutcome::StillPending | PollOutcome::Ignored) {
            inner.cancel_poller();
        }

        Ok(self.snapshot().await)
    }

    /// 收银员手工录入参考号完成支付，跳过轮询
    pub async fn submit_manual_reference(&self, reference: &str) -> DomainResult<Sale> {
        let inner = &self.inner;
        let mut machine = inner.machine.lock().await;

        let reference = match validate_reference(reference, inner.settings.provider) {
            Ok(reference) => reference,
            Err(e) => {
                machine.report_error(e.user_message());
                return Err(e);
            }
        };

        let order = Order::manual(&inner.checkout.customer, inner.checkout.amount, reference)?;
        machine.complete_manually(order.clone())?;
        inner.cancel_poller();
        info!(
            "Session {} completed with manual reference {:?}",
            inner.id, order.reference
        );

        inner
            .finalize(&mut machine, &order, PaymentChannel::ManualReference)
            .await
    }

    /// 关闭会话并取消轮询；返回是否为首次关闭
    pub async fn close(&self) -> bool {
        let first = {
            let mut machine = self.inner.machine.lock().await;
            let first = machine.close();
            self.inner.cancel_poller();
            first
        };

        if first {
            info!("Session {} closed", self.inner.id);
            self.inner.listener.on_close(self.inner.id).await;
        }
        first
    }
}

impl<Z: ZenoPayPort> Drop for UssdPaymentSession<Z> {
    fn drop(&mut self) {
        self.inner.cancel_poller();
    }
}

impl<Z: ZenoPayPort> SessionInner<Z> {
    fn snapshot_of(&self, machine: &UssdPaymentMachine) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            status: machine.status(),
            status_message: machine.status_message().to_string(),
            error: machine.error().map(String::from),
            order: machine.order().cloned(),
            sale: machine.sale().cloned(),
            amount: self.checkout.amount,
            customer_name: self.checkout.customer.name.clone(),
            customer_phone: self.checkout.customer.phone.clone(),
            polling: self.is_polling(),
            creating_order: machine.is_creating_order(),
            closed: machine.is_closed(),
            reference_placeholder: reference_placeholder(self.settings.provider).to_string(),
        }
    }

    fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// 取消轮询任务；句柄只会被取出并终止一次
    fn cancel_poller(&self) -> bool {
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => {
                let active = !handle.is_finished();
                handle.abort();
                if active {
                    debug!("Session {} polling cancelled", self.id);
                }
                active
            }
            None => false,
        }
    }

    async fn trigger(self: Arc<Self>, attempt: Attempt) -> DomainResult<()> {
        let order = self.machine.lock().await.begin_trigger(attempt)?;

        let request = UssdPushRequest {
            order_id: order.order_id.clone(),
            phone: order.buyer_phone.clone(),
            amount: order.amount,
            customer_name: order.buyer_name.clone(),
        };

        match self.zenopay.trigger_ussd(request).await {
            Ok(response) => {
                let mut machine = self.machine.lock().await;
                if machine.trigger_succeeded(attempt) {
                    info!(
                        "Session {} USSD popup sent for order {}: {}",
                        self.id,
                        order.order_id,
                        response.message.as_deref().unwrap_or("accepted")
                    );
                    // 在持锁期间启动，保证 close 与启动互斥
                    Arc::clone(&self).spawn_poller(attempt, order.order_id);
                }
                Ok(())
            }
            Err(e) => {
                error!(
                    "Session {} USSD popup trigger failed for order {}: {}",
                    self.id, order.order_id, e
                );
                self.machine
                    .lock()
                    .await
                    .trigger_failed(attempt, e.user_message());
                Err(e)
            }
        }
    }

    fn spawn_poller(self: Arc<Self>, attempt: Attempt, order_id: String) {
        let mut slot = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        let task = Arc::clone(&self);
        *slot = Some(tokio::spawn(async move {
            task.poll_until_settled(attempt, order_id).await;
        }));
    }

    async fn poll_until_settled(self: Arc<Self>, attempt: Attempt, order_id: String) {
        let interval = self.settings.poll_interval;
        let timeout = self.settings.poll_timeout;
        debug!(
            "Session {} polling order {} every {:?} for up to {:?}",
            self.id, order_id, interval, timeout
        );

        // 截止时间只约束等待和状态查询，不约束销售记录交接
        let deadline = Instant::now() + timeout;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let checked = time::timeout_at(deadline, async {
                ticker.tick().await;
                self.zenopay.check_status(&order_id).await
            })
            .await;

            match checked {
                Ok(Ok(response)) => {
                    if self.handle_status(attempt, response).await.stops_polling() {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    warn!("Session {} status check failed: {}", self.id, e);
                    if self.machine.lock().await.is_stale(attempt) {
                        break;
                    }
                }
                Err(_) => {
                    let mut machine = self.machine.lock().await;
                    if machine.time_out(attempt) {
                        warn!(
                            "Session {} order {}: {}",
                            self.id,
                            order_id,
                            DomainError::Timeout(timeout.as_secs())
                        );
                    }
                    break;
                }
            }
        }
    }

    /// 应用状态；完成时在持锁期间生成销售记录，避免与 close 竞争
    async fn handle_status(&self, attempt: Attempt, response: OrderStatusResponse) -> PollOutcome {
        let mut machine = self.machine.lock().await;
        let outcome = machine.apply_status(attempt, response.status, response.reference);

        match &outcome {
            PollOutcome::Completed(order) => {
                info!("Session {} payment completed for order {}", self.id, order.order_id);
                if let Err(e) = self
                    .finalize(&mut machine, order, PaymentChannel::UssdPopup)
                    .await
                {
                    error!("Session {} sale completion error: {}", self.id, e);
                }
            }
            PollOutcome::Failed | PollOutcome::Cancelled => {
                let failure = DomainError::RemoteFailure {
                    status: machine.status().to_string(),
                    message: machine.status_message().to_string(),
                };
                warn!("Session {} {}", self.id, failure);
            }
            PollOutcome::StillPending => {
                debug!("Session {} payment still pending", self.id);
            }
            PollOutcome::Ignored => {
                debug!("Session {} ignored status for attempt {}", self.id, attempt);
            }
        }

        outcome
    }

    async fn finalize(
        &self,
        machine: &mut UssdPaymentMachine,
        order: &Order,
        channel: PaymentChannel,
    ) -> DomainResult<Sale> {
        let ctx = SaleContext {
            cart_items: &self.checkout.cart_items,
            customer: &self.checkout.customer,
            operator: &self.checkout.operator,
            tax_policy: self.settings.tax_policy,
            provider: self.settings.provider,
        };

        let sale = match Sale::finalize(&ctx, order, channel) {
            Ok(sale) => sale,
            Err(e) => {
                machine.sale_failed();
                return Err(e);
            }
        };
        machine.record_sale(sale.clone());

        if let Err(e) = self.listener.on_payment_complete(self.id, &sale).await {
            error!("Session {} failed to hand over sale {}: {}", self.id, sale.sale_number, e);
            machine.sale_failed();
            return Err(e);
        }

        info!(
            "Session {} sale {} completed: total {}",
            self.id, sale.sale_number, sale.total
        );
        if machine.close() {
            self.listener.on_close(self.id).await;
        }
        Ok(sale)
    }
}
