use crate::application::{CheckoutService, ErrorResponse, ManualReferenceRequest, OpenSessionRequest};
use crate::domain::errors::DomainError;
use crate::ports::{SaleRepositoryPort, ZenoPayPort};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 应用状态
pub struct AppState<Z: ZenoPayPort, R: SaleRepositoryPort> {
    pub checkout_service: Arc<CheckoutService<Z, R>>,
}

impl<Z: ZenoPayPort, R: SaleRepositoryPort> Clone for AppState<Z, R> {
    fn clone(&self) -> Self {
        Self {
            checkout_service: self.checkout_service.clone(),
        }
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// 领域错误映射为HTTP响应
fn error_response(code: &str, e: DomainError) -> ApiError {
    let status = match e {
        DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DomainError::SessionNotFound(_) | DomainError::SaleNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::InvalidState { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("{}: {}", code, e);
    } else {
        warn!("{}: {}", code, e);
    }

    (
        status,
        Json(ErrorResponse::new(
            code.to_string(),
            e.user_message(),
            e.is_retryable(),
        )),
    )
}

/// 打开结账会话并发起USSD支付
pub async fn open_session<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Json(request): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "Received checkout request for {} ({} items)",
        request.customer.name,
        request.cart_items.len()
    );

    state
        .checkout_service
        .open_session(request)
        .await
        .map(|snapshot| (StatusCode::CREATED, Json(snapshot)))
        .map_err(|e| error_response("CHECKOUT_ERROR", e))
}

/// 查询会话
pub async fn get_session<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .checkout_service
        .get_session(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response("SESSION_ERROR", e))
}

/// 重新发起支付（新订单）
pub async fn restart_payment<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Restarting payment for session {}", session_id);

    state
        .checkout_service
        .restart_payment(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response("PAYMENT_ERROR", e))
}

/// 对当前订单重新推送USSD
pub async fn retry_ussd<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Retrying USSD push for session {}", session_id);

    state
        .checkout_service
        .retry_ussd(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response("USSD_ERROR", e))
}

/// 立即查询一次订单状态
pub async fn check_status<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .checkout_service
        .check_status(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response("STATUS_ERROR", e))
}

/// 手工录入交易参考号
pub async fn submit_manual_reference<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ManualReferenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Received manual reference for session {}", session_id);

    state
        .checkout_service
        .submit_manual_reference(session_id, &request.reference)
        .await
        .map(Json)
        .map_err(|e| error_response("REFERENCE_ERROR", e))
}

/// 关闭会话
pub async fn close_session<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Closing checkout session {}", session_id);

    state
        .checkout_service
        .close_session(session_id)
        .await
        .map(Json)
        .map_err(|e| error_response("SESSION_ERROR", e))
}

/// 查询销售记录
pub async fn get_sale<Z: ZenoPayPort, R: SaleRepositoryPort>(
    State(state): State<AppState<Z, R>>,
    Path(sale_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .checkout_service
        .get_sale(sale_id)
        .await
        .map(Json)
        .map_err(|e| error_response("SALE_ERROR", e))
}

/// 健康检查
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
