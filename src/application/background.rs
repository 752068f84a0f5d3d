use crate::application::CheckoutService;
use crate::ports::{SaleRepositoryPort, ZenoPayPort};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

/// 定期清理过期的结账会话
pub fn spawn_session_sweeper<Z, R>(service: Arc<CheckoutService<Z, R>>) -> JoinHandle<()>
where
    Z: ZenoPayPort,
    R: SaleRepositoryPort,
{
    let period = service
        .settings()
        .session_retention
        .clamp(Duration::from_secs(1), Duration::from_secs(60));

    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            service.evict_expired_sessions(chrono::Utc::now()).await;
        }
    })
}
