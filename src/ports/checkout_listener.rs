use crate::domain::errors::DomainResult;
use crate::domain::Sale;
use async_trait::async_trait;
use uuid::Uuid;

/// 结账会话的回调（支付完成、会话关闭）
#[async_trait]
pub trait CheckoutListener: Send + Sync {
    /// 销售记录生成后调用；返回错误时会话保持打开
    async fn on_payment_complete(&self, session_id: Uuid, sale: &Sale) -> DomainResult<()>;

    async fn on_close(&self, session_id: Uuid);
}
