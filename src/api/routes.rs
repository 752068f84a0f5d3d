use super::handlers::*;
use crate::ports::{SaleRepositoryPort, ZenoPayPort};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router<Z: ZenoPayPort, R: SaleRepositoryPort>(state: AppState<Z, R>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/checkout/sessions", post(open_session))
        .route(
            "/api/checkout/sessions/:session_id",
            get(get_session).delete(close_session),
        )
        .route("/api/checkout/sessions/:session_id/start", post(restart_payment))
        .route("/api/checkout/sessions/:session_id/ussd", post(retry_ussd))
        .route("/api/checkout/sessions/:session_id/status", post(check_status))
        .route(
            "/api/checkout/sessions/:session_id/manual-reference",
            post(submit_manual_reference),
        )
        .route("/api/sales/:sale_id", get(get_sale))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{checkout_request, FakeZenoPay};
    use crate::application::{CheckoutService, CheckoutSettings};
    use crate::infrastructure::InMemorySaleRepository;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let service = CheckoutService::new(
            Arc::new(FakeZenoPay::always_pending()),
            Arc::new(InMemorySaleRepository::new()),
            CheckoutSettings::default(),
        );
        create_router(AppState {
            checkout_service: Arc::new(service),
        })
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => request.body(Body::from(json.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lifecycle() {
        let app = app();
        let request = serde_json::to_value(checkout_request()).unwrap();

        let (status, body) = send(&app, Method::POST, "/api/checkout/sessions", Some(request)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "sent");
        assert_eq!(body["polling"], true);
        let session_id = body["session_id"].as_str().unwrap().to_string();
        let uri = format!("/api/checkout/sessions/{}", session_id);

        // 支付进行中不能重新发起
        let (status, body) = send(&app, Method::POST, &format!("{}/start", uri), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["retryable"], false);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("{}/manual-reference", uri),
            Some(serde_json::json!({ "reference": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please enter a reference number");

        let (status, body) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["closed"], true);

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_sale() {
        let uri = format!("/api/sales/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&app(), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "SALE_ERROR");
    }
}
