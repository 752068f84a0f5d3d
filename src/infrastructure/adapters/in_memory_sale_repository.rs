use crate::domain::errors::DomainResult;
use crate::domain::Sale;
use crate::ports::sale_repository_port::SaleRepositoryPort;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// 内存销售记录仓储，未配置数据库时使用
#[derive(Default, Clone)]
pub struct InMemorySaleRepository {
    sales: Arc<RwLock<HashMap<Uuid, Sale>>>,
}

impl InMemorySaleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaleRepositoryPort for InMemorySaleRepository {
    async fn save(&self, sale: &Sale) -> DomainResult<()> {
        let mut sales = self.sales.write().await;
        sales.insert(sale.id, sale.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Sale>> {
        let sales = self.sales.read().await;
        Ok(sales.get(&id).cloned())
    }

    async fn find_by_sale_number(&self, sale_number: &str) -> DomainResult<Option<Sale>> {
        let sales = self.sales.read().await;
        Ok(sales
            .values()
            .filter(|sale| sale.sale_number == sale_number)
            .max_by_key(|sale| sale.sold_at)
            .cloned())
    }
}
