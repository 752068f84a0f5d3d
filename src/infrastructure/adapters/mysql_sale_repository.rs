use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Money, Sale, SaleItem, SalePayment};
use crate::ports::sale_repository_port::SaleRepositoryPort;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use tracing::{debug, error};

/// MySQL销售记录仓储实现
#[derive(Clone)]
pub struct MySqlSaleRepository {
    pool: Arc<Pool<MySql>>,
}

impl MySqlSaleRepository {
    pub fn new(pool: Arc<Pool<MySql>>) -> Self {
        Self { pool }
    }
}

const SELECT_SALE: &str = r#"
    SELECT id, sale_number, items, subtotal_cents, tax_cents,
           discount_cents, total_cents, payment, payment_status,
           customer_id, customer_name, customer_phone, sold_by, sold_at
    FROM pos_sales
"#;

#[async_trait]
impl SaleRepositoryPort for MySqlSaleRepository {
    /// 保存销售记录
    async fn save(&self, sale: &Sale) -> DomainResult<()> {
        let query = r#"
            INSERT INTO pos_sales (
                id, sale_number, items, subtotal_cents, tax_cents,
                discount_cents, total_cents, payment, payment_status,
                customer_id, customer_name, customer_phone, sold_by, sold_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        sqlx::query(query)
            .bind(sale.id)
            .bind(&sale.sale_number)
            .bind(Json(&sale.items))
            .bind(sale.subtotal.to_cents())
            .bind(sale.tax.to_cents())
            .bind(sale.discount.to_cents())
            .bind(sale.total.to_cents())
            .bind(Json(&sale.payment))
            .bind(&sale.payment_status)
            .bind(&sale.customer_id)
            .bind(&sale.customer_name)
            .bind(&sale.customer_phone)
            .bind(&sale.sold_by)
            .bind(sale.sold_at)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| {
                error!("Failed to save sale {}: {}", sale.sale_number, e);
                DomainError::DatabaseError(e)
            })?;

        debug!("Sale saved: {} ({})", sale.id, sale.sale_number);
        Ok(())
    }

    /// 根据ID查找
    async fn find_by_id(&self, id: uuid::Uuid) -> DomainResult<Option<Sale>> {
        let query = format!("{} WHERE id = ?", SELECT_SALE);

        let result = sqlx::query_as::<_, SaleRow>(&query)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(result.map(SaleRow::into_sale))
    }

    /// 根据销售单号查找
    async fn find_by_sale_number(&self, sale_number: &str) -> DomainResult<Option<Sale>> {
        let query = format!("{} WHERE sale_number = ? ORDER BY sold_at DESC LIMIT 1", SELECT_SALE);

        let result = sqlx::query_as::<_, SaleRow>(&query)
            .bind(sale_number)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(result.map(SaleRow::into_sale))
    }
}

/// 数据库行结构体
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: uuid::Uuid,
    sale_number: String,
    items: Json<Vec<SaleItem>>,
    subtotal_cents: i64,
    tax_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    payment: Json<SalePayment>,
    payment_status: String,
    customer_id: String,
    customer_name: String,
    customer_phone: Option<String>,
    sold_by: String,
    sold_at: chrono::DateTime<chrono::Utc>,
}

impl SaleRow {
    fn into_sale(self) -> Sale {
        Sale {
            id: self.id,
            sale_number: self.sale_number,
            items: self.items.0,
            subtotal: Money::from_cents(self.subtotal_cents),
            tax: Money::from_cents(self.tax_cents),
            discount: Money::from_cents(self.discount_cents),
            total: Money::from_cents(self.total_cents),
            payment: self.payment.0,
            payment_status: self.payment_status,
            customer_id: self.customer_id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            sold_by: self.sold_by,
            sold_at: self.sold_at,
        }
    }
}
