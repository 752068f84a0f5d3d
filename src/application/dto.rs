use crate::domain::{CartItem, Customer, Money, Operator, Order, Sale, UssdStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 打开结账会话请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionRequest {
    /// 购物车明细
    pub cart_items: Vec<CartItem>,

    pub customer: Customer,

    /// 应付金额（分）
    pub amount: Money,

    /// 当前收银员
    pub operator: Operator,
}

/// 手工参考号
#[derive(Debug, Deserialize)]
pub struct ManualReferenceRequest {
    pub reference: String,
}

/// 会话快照
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,

    /// USSD 流程状态
    pub status: UssdStatus,

    pub status_message: String,

    /// 面向收银员的错误提示
    pub error: Option<String>,

    pub order: Option<Order>,

    pub sale: Option<Sale>,

    pub amount: Money,

    pub customer_name: String,

    pub customer_phone: Option<String>,

    /// 是否正在轮询
    pub polling: bool,

    pub creating_order: bool,

    pub closed: bool,

    /// 手工参考号输入提示
    pub reference_placeholder: String,
}

/// 错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error: String, message: String, retryable: bool) -> Self {
        Self {
            error,
            message,
            retryable,
        }
    }
}
