use crate::application::dto::{OpenSessionRequest, SessionSnapshot};
use crate::application::settings::CheckoutSettings;
use crate::application::ussd_session::UssdPaymentSession;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::Sale;
use crate::ports::{CheckoutListener, SaleRepositoryPort, ZenoPayPort};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// 支付完成后持久化销售记录
pub struct SaleRecorder<R: SaleRepositoryPort> {
    repository: Arc<R>,
}

impl<R: SaleRepositoryPort> SaleRecorder<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: SaleRepositoryPort> CheckoutListener for SaleRecorder<R> {
    async fn on_payment_complete(&self, session_id: Uuid, sale: &Sale) -> DomainResult<()> {
        self.repository.save(sale).await?;
        info!(
            "Sale {} recorded for session {} ({})",
            sale.sale_number, session_id, sale.total
        );
        Ok(())
    }

    async fn on_close(&self, session_id: Uuid) {
        debug!("Checkout session {} closed", session_id);
    }
}

/// 结账服务：管理进行中的 USSD 支付会话
pub struct CheckoutService<Z: ZenoPayPort, R: SaleRepositoryPort> {
    zenopay: Arc<Z>,
    repository: Arc<R>,
    listener: Arc<dyn CheckoutListener>,
    settings: CheckoutSettings,
    sessions: RwLock<HashMap<Uuid, Arc<UssdPaymentSession<Z>>>>,
}

impl<Z: ZenoPayPort, R: SaleRepositoryPort> CheckoutService<Z, R> {
    pub fn new(zenopay: Arc<Z>, repository: Arc<R>, settings: CheckoutSettings) -> Self {
        let listener = Arc::new(SaleRecorder::new(Arc::clone(&repository)));
        Self::with_listener(zenopay, repository, listener, settings)
    }

    pub fn with_listener(
        zenopay: Arc<Z>,
        repository: Arc<R>,
        listener: Arc<dyn CheckoutListener>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            zenopay,
            repository,
            listener,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    async fn session(&self, session_id: Uuid) -> DomainResult<Arc<UssdPaymentSession<Z>>> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or_else(|| DomainError::SessionNotFound(session_id.to_string()))
    }

    /// 操作类错误已经写入会话的 error 字段，这里只把状态错误返回给调用方
    async fn settle(
        session: &UssdPaymentSession<Z>,
        result: DomainResult<()>,
    ) -> DomainResult<SessionSnapshot> {
        match result {
            Ok(()) => Ok(session.snapshot().await),
            Err(e @ DomainError::InvalidState { .. }) => Err(e),
            Err(e) => {
                debug!("Session {} action failed: {}", session.id(), e);
                Ok(session.snapshot().await)
            }
        }
    }

    /// 打开结账会话并立即发起支付
    pub async fn open_session(&self, request: OpenSessionRequest) -> DomainResult<SessionSnapshot> {
        let session = Arc::new(UssdPaymentSession::new(
            Arc::clone(&self.zenopay),
            Arc::clone(&self.listener),
            self.settings,
            request,
        )?);
        info!("Opened checkout session {}", session.id());

        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));

        let result = session.start().await;
        Self::settle(&session, result).await
    }

    pub async fn get_session(&self, session_id: Uuid) -> DomainResult<SessionSnapshot> {
        Ok(self.session(session_id).await?.snapshot().await)
    }

    /// 新的支付尝试（失败、取消或超时之后）
    pub async fn restart_payment(&self, session_id: Uuid) -> DomainResult<SessionSnapshot> {
        let session = self.session(session_id).await?;
        let result = session.start().await;
        Self::settle(&session, result).await
    }

    pub async fn retry_ussd(&self, session_id: Uuid) -> DomainResult<SessionSnapshot> {
        let session = self.session(session_id).await?;
        let result = session.retry_ussd().await;
        Self::settle(&session, result).await
    }

    pub async fn check_status(&self, session_id: Uuid) -> DomainResult<SessionSnapshot> {
        let session = self.session(session_id).await?;
        match session.check_status_now().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => Self::settle(&session, Err(e)).await,
        }
    }

    /// 手工参考号；校验失败时返回错误，保证不会生成销售记录
    pub async fn submit_manual_reference(
        &self,
        session_id: Uuid,
        reference: &str,
    ) -> DomainResult<SessionSnapshot> {
        let session = self.session(session_id).await?;
        match session.submit_manual_reference(reference).await {
            Ok(sale) => {
                info!("Session {} finalized sale {} manually", session_id, sale.sale_number);
                Ok(session.snapshot().await)
            }
            Err(e @ DomainError::ValidationError(_)) => Err(e),
            Err(e) => Self::settle(&session, Err(e)).await,
        }
    }

    /// 关闭会话（取消轮询）并移除
    pub async fn close_session(&self, session_id: Uuid) -> DomainResult<SessionSnapshot> {
        let session = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or_else(|| DomainError::SessionNotFound(session_id.to_string()))?;

        session.close().await;
        Ok(session.snapshot().await)
    }

    pub async fn get_sale(&self, sale_id: Uuid) -> DomainResult<Sale> {
        self.repository
            .find_by_id(sale_id)
            .await?
            .ok_or_else(|| DomainError::SaleNotFound(sale_id.to_string()))
    }

    /// 清理空闲超过保留期的会话（已关闭，或停在失败、取消、超时等状态无人处理），返回清理数量
    pub async fn evict_expired_sessions(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.settings.session_retention)
            .unwrap_or_else(|_| chrono::Duration::zero());

        let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        let mut expired = Vec::new();
        for session in sessions {
            if let Some(idle_since) = session.idle_since().await {
                if idle_since + retention <= now {
                    expired.push(session.id());
                }
            }
        }

        if expired.is_empty() {
            return 0;
        }

        let removed: Vec<_> = {
            let mut map = self.sessions.write().await;
            expired.iter().filter_map(|id| map.remove(id)).collect()
        };
        for session in &removed {
            session.close().await;
        }

        if removed.len() > 1 {
            info!("Evicted {} expired checkout sessions", removed.len());
        } else if let Some(session) = removed.first() {
            debug!("Evicted expired checkout session {}", session.id());
        }
        removed.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::*;
    use crate::domain::{Money, OrderStatus, UssdStatus};
    use crate::infrastructure::InMemorySaleRepository;
    use std::time::Duration;

    fn service(
        zenopay: FakeZenoPay,
    ) -> (
        CheckoutService<FakeZenoPay, InMemorySaleRepository>,
        Arc<InMemorySaleRepository>,
    ) {
        let repository = Arc::new(InMemorySaleRepository::new());
        let service = CheckoutService::new(
            Arc::new(zenopay),
            Arc::clone(&repository),
            CheckoutSettings::default(),
        );
        (service, repository)
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_sale_is_persisted() {
        let (service, repository) = service(FakeZenoPay::with_statuses(&[OrderStatus::Completed]));

        let snapshot = service.open_session(checkout_request()).await.unwrap();
        assert_eq!(snapshot.status, UssdStatus::Sent);
        assert!(snapshot.polling);

        tokio::time::sleep(Duration::from_secs(6)).await;

        let snapshot = service.get_session(snapshot.session_id).await.unwrap();
        let sale = snapshot.sale.expect("sale recorded");
        assert!(snapshot.closed);

        let stored = repository.find_by_id(sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total, Money::from_shillings(11_600));
        assert_eq!(service.get_sale(sale.id).await.unwrap().id, sale.id);
        assert_eq!(
            repository
                .find_by_sale_number(&sale.sale_number)
                .await
                .unwrap()
                .map(|s| s.id),
            Some(sale.id)
        );
    }

    #[tokio::test]
    async fn test_open_surfaces_validation_error_in_snapshot() {
        let (service, _) = service(FakeZenoPay::always_pending());
        let mut request = checkout_request();
        request.customer.phone = Some(String::new());

        let snapshot = service.open_session(request).await.unwrap();
        assert_eq!(snapshot.status, UssdStatus::Idle);
        assert!(snapshot.order.is_none());
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Customer phone number is required for mobile money payment")
        );
    }

    #[tokio::test]
    async fn test_invalid_manual_reference_is_rejected() {
        let (service, _) = service(FakeZenoPay::always_pending());
        let snapshot = service.open_session(checkout_request()).await.unwrap();

        let result = service
            .submit_manual_reference(snapshot.session_id, "   ")
            .await;
        assert!(matches!(result, Err(DomainError::ValidationError(_))));

        let snapshot = service.get_session(snapshot.session_id).await.unwrap();
        assert!(snapshot.sale.is_none());
        assert_eq!(
            snapshot.error.as_deref(),
            Some("Please enter a reference number")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_removes_session_and_stops_polling() {
        let zenopay = FakeZenoPay::always_pending();
        let (service, _) = service(zenopay);
        let snapshot = service.open_session(checkout_request()).await.unwrap();

        let closed = service.close_session(snapshot.session_id).await.unwrap();
        assert!(closed.closed);
        assert!(!closed.polling);
        assert_eq!(service.session_count().await, 0);

        let result = service.get_session(snapshot.session_id).await;
        assert!(matches!(result, Err(DomainError::SessionNotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_cancellation() {
        let (service, _) = service(FakeZenoPay::with_statuses(&[OrderStatus::Cancelled]));
        let snapshot = service.open_session(checkout_request()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let cancelled = service.get_session(snapshot.session_id).await.unwrap();
        assert_eq!(cancelled.status, UssdStatus::Cancelled);

        let restarted = service.restart_payment(snapshot.session_id).await.unwrap();
        assert_eq!(restarted.status, UssdStatus::Sent);
        assert_eq!(restarted.order.unwrap().order_id, "ZP-2");

        // 进行中的尝试不能再次发起
        let result = service.restart_payment(snapshot.session_id).await;
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_sessions_closed_past_retention() {
        let (service, _) = service(FakeZenoPay::with_statuses(&[
            OrderStatus::Completed,
            OrderStatus::Completed,
        ]));
        service.open_session(checkout_request()).await.unwrap();
        let open = service.open_session(checkout_request()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        // 两个会话都已完成并自动关闭
        assert_eq!(service.session_count().await, 2);
        assert_eq!(service.evict_expired_sessions(Utc::now()).await, 0);

        let later = Utc::now() + chrono::Duration::minutes(11);
        assert_eq!(service.evict_expired_sessions(later).await, 2);
        assert!(service.get_session(open.session_id).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicts_abandoned_open_sessions() {
        let listener = Arc::new(RecordingListener::default());
        let service = CheckoutService::with_listener(
            Arc::new(FakeZenoPay::with_statuses(&[OrderStatus::Failed])),
            Arc::new(InMemorySaleRepository::new()),
            listener.clone(),
            CheckoutSettings::default(),
        );

        // 一个失败、一个超时、一个因缺少手机号停在 idle
        let first = service.open_session(checkout_request()).await.unwrap();
        let second = service.open_session(checkout_request()).await.unwrap();
        let mut request = checkout_request();
        request.customer.phone = None;
        service.open_session(request).await.unwrap();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let first = service.get_session(first.session_id).await.unwrap();
        let polling_id = if first.status == UssdStatus::Failed {
            second.session_id
        } else {
            first.session_id
        };

        // 仍在轮询的会话不会被清理
        let later = Utc::now() + chrono::Duration::minutes(11);
        assert_eq!(service.evict_expired_sessions(later).await, 2);
        assert!(service.get_session(polling_id).await.is_ok());

        tokio::time::sleep(Duration::from_secs(300)).await;
        let timed_out = service.get_session(polling_id).await.unwrap();
        assert_eq!(timed_out.status, UssdStatus::Timeout);
        assert_eq!(service.evict_expired_sessions(Utc::now()).await, 0);

        let later = Utc::now() + chrono::Duration::days(30);
        assert_eq!(service.evict_expired_sessions(later).await, 1);
        assert_eq!(service.session_count().await, 0);
        assert_eq!(listener.closes.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
