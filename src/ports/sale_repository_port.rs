use crate::domain::errors::DomainResult;
use crate::domain::Sale;
use async_trait::async_trait;

/// 销售记录仓储端口接口
#[async_trait]
pub trait SaleRepositoryPort: Send + Sync + 'static {
    /// 保存销售记录
    async fn save(&self, sale: &Sale) -> DomainResult<()>;

    /// 根据ID查找
    async fn find_by_id(&self, id: uuid::Uuid) -> DomainResult<Option<Sale>>;

    /// 根据销售单号查找
    async fn find_by_sale_number(&self, sale_number: &str) -> DomainResult<Option<Sale>>;
}
