use crate::domain::errors::DomainResult;
use crate::domain::{CartItem, Money, OrderStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 订单附带的购物车明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineMetadata {
    pub product_id: String,
    pub variant_id: String,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

impl From<&CartItem> for OrderLineMetadata {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant_id: item.variant_id.clone(),
            product_name: item.product_name.clone(),
            variant_name: item.variant_name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub cart_items: Vec<OrderLineMetadata>,
    pub customer_id: String,
    pub pos_session_id: String,
    pub order_type: String,
    pub payment_method: String,
}

/// 创建订单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub buyer_email: String,
    pub buyer_name: String,
    pub buyer_phone: String,
    pub amount: Money,
    pub metadata: OrderMetadata,
}

/// 创建订单响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
}

/// USSD 推送请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UssdPushRequest {
    pub order_id: String,
    pub phone: String,
    pub amount: Money,
    pub customer_name: String,
}

/// USSD 推送确认
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UssdPushResponse {
    pub message: Option<String>,
}

/// 订单状态查询响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub status: OrderStatus,
    pub reference: Option<String>,
}

/// ZenoPay 端口接口
#[async_trait]
pub trait ZenoPayPort: Send + Sync + 'static {
    /// 创建支付订单
    async fn create_order(&self, request: CreateOrderRequest) -> DomainResult<CreateOrderResponse>;

    /// 向顾客手机推送 USSD 支付提示
    async fn trigger_ussd(&self, request: UssdPushRequest) -> DomainResult<UssdPushResponse>;

    /// 查询订单状态
    async fn check_status(&self, order_id: &str) -> DomainResult<OrderStatusResponse>;
}
