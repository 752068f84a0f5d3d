use crate::domain::entities::{CartItem, Customer, Operator, Order};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::value_objects::{MobileProvider, Money, OrderStatus, PaymentChannel, TaxPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 销售明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: Uuid,
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub sku: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
    /// 成本与利润由后续的销售处理服务计算
    pub cost_price: Money,
    pub profit: Money,
}

/// 支付信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePayment {
    /// 固定为 mobile_money
    pub method: String,
    pub provider: MobileProvider,
    pub reference: Option<String>,
    pub channel: PaymentChannel,
    pub order_id: String,
    pub amount: Money,
}

/// 销售记录，构造后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    pub id: Uuid,
    pub sale_number: String,
    pub items: Vec<SaleItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub payment: SalePayment,
    pub payment_status: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: Option<String>,
    pub sold_by: String,
    pub sold_at: DateTime<Utc>,
}

/// 小计、税额与应收合计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl SaleTotals {
    /// total = subtotal + tax - discount；金额溢出时返回校验错误
    pub fn compute(cart_items: &[CartItem], tax_policy: TaxPolicy) -> DomainResult<Self> {
        let subtotal = Money::checked_sum(cart_items.iter().map(|item| item.total_price))?;
        let tax = tax_policy.tax_on(subtotal)?;
        let discount = Money::ZERO;
        let total = subtotal.checked_add(tax)?.checked_sub(discount)?;

        Ok(Self {
            subtotal,
            tax,
            discount,
            total,
        })
    }
}

/// 生成销售记录所需的上下文
#[derive(Debug, Clone)]
pub struct SaleContext<'a> {
    pub cart_items: &'a [CartItem],
    pub customer: &'a Customer,
    pub operator: &'a Operator,
    pub tax_policy: TaxPolicy,
    pub provider: MobileProvider,
}

impl Sale {
    /// 已确认支付的订单生成销售记录，纯构造，无 I/O
    pub fn finalize(
        ctx: &SaleContext<'_>,
        order: &Order,
        channel: PaymentChannel,
    ) -> DomainResult<Self> {
        if order.status != OrderStatus::Completed {
            return Err(DomainError::InvalidState {
                expected: OrderStatus::Completed.to_string(),
                actual: order.status.to_string(),
            });
        }

        if ctx.cart_items.is_empty() {
            return Err(DomainError::ValidationError("Cart is empty".to_string()));
        }

        let totals = SaleTotals::compute(ctx.cart_items, ctx.tax_policy)?;

        // 毫秒尾数每隔约 16 分钟重复，追加 id 片段保证唯一
        let id = Uuid::new_v4();
        let sold_at = Utc::now();
        let millis = sold_at.timestamp_millis().to_string();
        let suffix = &millis[millis.len().saturating_sub(6)..];
        let discriminator = id.simple().to_string()[..6].to_uppercase();

        let items = ctx
            .cart_items
            .iter()
            .map(|item| SaleItem {
                id: Uuid::new_v4(),
                product_id: item.product_id.clone(),
                variant_id: item.variant_id.clone(),
                product_name: item.product_name.clone(),
                variant_name: item.variant_name.clone(),
                sku: item.sku.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price,
                cost_price: Money::ZERO,
                profit: Money::ZERO,
            })
            .collect::<Vec<_>>();

        Ok(Self {
            id,
            sale_number: format!("SALE-{}-{}", suffix, discriminator),
            items,
            subtotal: totals.subtotal,
            tax: totals.tax,
            discount: totals.discount,
            total: totals.total,
            payment: SalePayment {
                method: "mobile_money".to_string(),
                provider: ctx.provider,
                reference: order.reference.clone(),
                channel,
                order_id: order.order_id.clone(),
                amount: order.amount,
            },
            payment_status: "completed".to_string(),
            customer_id: ctx.customer.id.clone(),
            customer_name: ctx.customer.name.clone(),
            customer_phone: ctx.customer.phone.clone(),
            sold_by: ctx.operator.display_name(),
            sold_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Vec<CartItem> {
        vec![
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
        ]
    }

    fn customer() -> Customer {
        Customer {
            id: "cust-1".to_string(),
            name: "Amina Juma".to_string(),
            email: None,
            phone: Some("255712345678".to_string()),
        }
    }

    fn operator() -> Operator {
        Operator {
            name: Some("Neema".to_string()),
            email: None,
        }
    }

    #[test]
    fn test_finalize_applies_tax() {
        let items = cart();
        let customer = customer();
        let operator = operator();
        let ctx = SaleContext {
            cart_items: &items,
            customer: &customer,
            operator: &operator,
            tax_policy: TaxPolicy::default(),
            provider: MobileProvider::ZenoPay,
        };
        let mut order =
            Order::new("ZP-9".to_string(), &customer, Money::from_shillings(10_000)).unwrap();
        order
            .apply_remote_status(OrderStatus::Completed, Some("REF42".to_string()))
            .unwrap();

        let sale = Sale::finalize(&ctx, &order, PaymentChannel::UssdPopup).unwrap();

        assert_eq!(sale.subtotal, Money::from_shillings(10_000));
        assert_eq!(sale.tax, Money::from_shillings(1_600));
        assert_eq!(sale.total, Money::from_shillings(11_600));
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.payment.reference.as_deref(), Some("REF42"));
        assert_eq!(sale.payment.amount, Money::from_shillings(10_000));
        assert_eq!(sale.sold_by, "Neema");
        assert!(sale.sale_number.starts_with("SALE-"));
        assert_eq!(sale.sale_number.len(), "SALE-".len() + 6 + 1 + 6);

        let again = Sale::finalize(&ctx, &order, PaymentChannel::UssdPopup).unwrap();
        assert_ne!(again.sale_number, sale.sale_number);
    }

    #[test]
    fn test_overflowing_cart_is_rejected() {
        let mut items = cart();
        for item in &mut items {
            item.total_price = Money::from_cents(i64::MAX / 2 + 1);
        }
        let customer = customer();
        let operator = operator();
        let ctx = SaleContext {
            cart_items: &items,
            customer: &customer,
            operator: &operator,
            tax_policy: TaxPolicy::default(),
            provider: MobileProvider::ZenoPay,
        };
        let order =
            Order::manual(&customer, Money::from_shillings(10_000), "REF".to_string()).unwrap();

        let result = Sale::finalize(&ctx, &order, PaymentChannel::ManualReference);
        assert!(matches!(result, Err(DomainError::ValidationError(_))));
    }

    #[test]
    fn test_finalize_with_configured_rate() {
        let items = cart();
        let customer = customer();
        let operator = operator();
        let ctx = SaleContext {
            cart_items: &items,
            customer: &customer,
            operator: &operator,
            tax_policy: TaxPolicy::new(true, 1800),
            provider: MobileProvider::ZenoPay,
        };
        let order =
            Order::manual(&customer, Money::from_shillings(10_000), "REF".to_string()).unwrap();

        let sale = Sale::finalize(&ctx, &order, PaymentChannel::ManualReference).unwrap();

        assert_eq!(sale.total, Money::from_shillings(11_800));
        assert_eq!(sale.payment.channel, PaymentChannel::ManualReference);
    }

    #[test]
    fn test_pending_order_cannot_be_finalized() {
        let items = cart();
        let customer = customer();
        let operator = operator();
        let ctx = SaleContext {
            cart_items: &items,
            customer: &customer,
            operator: &operator,
            tax_policy: TaxPolicy::default(),
            provider: MobileProvider::ZenoPay,
        };
        let order =
            Order::new("ZP-9".to_string(), &customer, Money::from_shillings(10_000)).unwrap();

        let result = Sale::finalize(&ctx, &order, PaymentChannel::UssdPopup);
        assert!(matches!(result, Err(DomainError::InvalidState { .. })));
    }
}
