use thiserror::Error;

/// 领域层错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 验证错误（缺少手机号、参考号格式错误等）
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 会话未找到
    #[error("Checkout session not found: {0}")]
    SessionNotFound(String),

    /// 销售记录未找到
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// 状态错误
    #[error("Invalid state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// 轮询超时
    #[error("Payment confirmation timed out after {0} seconds")]
    Timeout(u64),

    /// 远端明确返回失败或取消
    #[error("Payment {status} by remote: {message}")]
    RemoteFailure { status: String, message: String },

    /// ZenoPay API错误
    #[error("ZenoPay API error: {0}")]
    ZenoPayError(String),

    /// 数据库错误
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// 序列化错误
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP请求错误
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// 转换为展示给收银员的提示文本
    pub fn user_message(&self) -> String {
        match self {
            DomainError::ValidationError(msg) => msg.clone(),
            DomainError::ZenoPayError(msg) => msg.clone(),
            DomainError::HttpError(_) => {
                "Could not reach the payment service. Please try again.".to_string()
            }
            DomainError::Timeout(_) => {
                "Payment confirmation timed out. Please try again or enter the reference manually."
                    .to_string()
            }
            DomainError::RemoteFailure { message, .. } => message.clone(),
            DomainError::InvalidState { .. } => {
                "This action is not available in the current payment state.".to_string()
            }
            DomainError::DatabaseError(_) => {
                "Failed to complete sale. Please contact support.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// 操作员能否直接重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::HttpError(_)
                | DomainError::ZenoPayError(_)
                | DomainError::Timeout(_)
                | DomainError::RemoteFailure { .. }
        )
    }
}

/// 领域结果类型
pub type DomainResult<T> = Result<T, DomainError>;
