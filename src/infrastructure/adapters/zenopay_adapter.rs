use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::{Money, OrderStatus};
use crate::infrastructure::config::ZenoPayConfig;
use crate::ports::zenopay_port::*;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Response};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// ZenoPay 网关适配器实现
#[derive(Clone)]
pub struct ZenoPayAdapter {
    config: Arc<ZenoPayConfig>,
    client: Client,
}

impl ZenoPayAdapter {
    pub fn new(config: Arc<ZenoPayConfig>) -> DomainResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { config, client })
    }

    /// 读取响应体；非2xx或 success=false 时转换为网关错误
    async fn read_envelope(response: Response, action: &str) -> DomainResult<Value> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("ZenoPay {} failed: {} - {}", action, status, error_text);
            return Err(DomainError::ZenoPayError(format!(
                "Failed to {}: {} {}",
                action, status, error_text
            )));
        }

        let body: Value = response.json().await?;
        debug!("ZenoPay {} response: {}", action, body);
        check_success(&body, action)?;
        Ok(body)
    }
}

/// ZenoPay 只接受整数先令
fn whole_shillings(amount: Money) -> i64 {
    let cents = amount.to_cents();
    cents.div_euclid(100) + i64::from(cents.rem_euclid(100) >= 50)
}

fn check_success(body: &Value, action: &str) -> DomainResult<()> {
    let success = match &body["success"] {
        Value::Bool(flag) => *flag,
        Value::Null => body["result"].as_str() == Some("SUCCESS"),
        _ => false,
    };

    if success {
        return Ok(());
    }

    let message = body["error"]
        .as_str()
        .or_else(|| body["message"].as_str())
        .map(String::from)
        .unwrap_or_else(|| format!("Failed to {}", action));
    Err(DomainError::ZenoPayError(message))
}

fn parse_create_order(body: &Value) -> DomainResult<CreateOrderResponse> {
    let order_id = body["order_id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| DomainError::ZenoPayError("Missing order_id".to_string()))?;

    Ok(CreateOrderResponse {
        order_id: order_id.to_string(),
    })
}

fn parse_order_status(body: &Value, order_id: &str) -> DomainResult<OrderStatusResponse> {
    let orders = body["orders"]
        .as_array()
        .or_else(|| body["data"].as_array())
        .ok_or_else(|| DomainError::ZenoPayError("Missing orders in status response".to_string()))?;

    let order = orders
        .iter()
        .find(|o| o["order_id"].as_str() == Some(order_id))
        .ok_or_else(|| DomainError::ZenoPayError(format!("Order {} not found", order_id)))?;

    let raw_status = order["payment_status"].as_str().unwrap_or("UNKNOWN");
    let status = OrderStatus::from_remote(raw_status).ok_or_else(|| {
        DomainError::ZenoPayError(format!("Unknown payment status: {}", raw_status))
    })?;

    Ok(OrderStatusResponse {
        status,
        reference: order["reference"]
            .as_str()
            .or_else(|| order["transid"].as_str())
            .filter(|r| !r.is_empty())
            .map(String::from),
    })
}

#[async_trait]
impl ZenoPayPort for ZenoPayAdapter {
    /// 创建支付订单
    async fn create_order(&self, request: CreateOrderRequest) -> DomainResult<CreateOrderResponse> {
        let mut body = json!({
            "buyer_email": request.buyer_email,
            "buyer_name": request.buyer_name,
            "buyer_phone": request.buyer_phone,
            "amount": whole_shillings(request.amount),
            "metadata": request.metadata,
        });
        if let Some(webhook_url) = &self.config.webhook_url {
            body["webhook_url"] = json!(webhook_url);
        }

        info!(
            "Creating ZenoPay order for {} ({})",
            request.buyer_phone, request.amount
        );

        let response = self
            .client
            .post(self.config.create_order_url())
            .header("x-api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let body = Self::read_envelope(response, "create payment order").await?;
        parse_create_order(&body)
    }

    /// 推送USSD
    async fn trigger_ussd(&self, request: UssdPushRequest) -> DomainResult<UssdPushResponse> {
        let body = json!({
            "order_id": request.order_id,
            "phone": request.phone,
            "amount": whole_shillings(request.amount),
            "customer_name": request.customer_name,
        });

        info!(
            "Triggering USSD popup for order {} on {}",
            request.order_id, request.phone
        );

        let response = self
            .client
            .post(self.config.trigger_ussd_url())
            .header("x-api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let body = Self::read_envelope(response, "trigger USSD popup").await?;

        Ok(UssdPushResponse {
            message: body["message"].as_str().map(String::from),
        })
    }

    /// 查询订单状态
    async fn check_status(&self, order_id: &str) -> DomainResult<OrderStatusResponse> {
        let response = self
            .client
            .get(self.config.check_status_url())
            .query(&[("order_id", order_id)])
            .header("x-api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        let body = Self::read_envelope(response, "check payment status").await?;
        let status = parse_order_status(&body, order_id)?;
        if status.status == OrderStatus::Pending {
            debug!("Order {} still pending", order_id);
        } else {
            info!("Order {} reported {}", order_id, status.status);
        }
        Ok(status)
    }
}
