use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{checkout::CheckoutError, stripe_webhook::WebhookError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Not found")]
    NotFound,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Checkout(err) => err.status_code(),
            AppError::Webhook(err) => err.status_code(),
            AppError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Display strings only; sources stay in the logs.
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message: self.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn upstream_detail_is_not_leaked() {
        let (status, body) = body_of(AppError::from(CheckoutError::Upstream(anyhow!(
            "sk_live_secret rejected"
        ))))
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], 502);
        assert!(!body["message"].as_str().unwrap().contains("sk_live"));
    }

    #[tokio::test]
    async fn not_found_is_json() {
        let (status, body) = body_of(AppError::NotFound).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "code": 404, "message": "Not found" }));
    }

    #[tokio::test]
    async fn conflict_maps_to_409() {
        let (status, body) = body_of(AppError::from(CheckoutError::AlreadySubscribed)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "already subscribed to this plan");
    }
}
