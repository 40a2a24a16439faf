//! Mapping of service errors to HTTP responses.
//!
//! Every failure answers `{success: false, message, ...}`. Reservation and
//! order creation add a tagged `failure` so clients can branch on its
//! `kind` without parsing the message.

use adashop_core::backend::BackendError;
use adashop_core::service::{OrderCreationError, OrderCreationFailure};
use adashop_core::stock::StockError;
use adashop_sdk::objects::{
    CreateOrdersResponse, ErrorResponse, OrderResponse, StockFailure, StockReservationResponse,
};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug)]
pub enum ApiError {
    /// The request could not be decoded.
    BadRequest(String),
    Stock(StockError),
    OrderCreation(OrderCreationFailure),
    Backend(BackendError),
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<StockError> for ApiError {
    fn from(value: StockError) -> Self {
        ApiError::Stock(value)
    }
}

impl From<OrderCreationFailure> for ApiError {
    fn from(value: OrderCreationFailure) -> Self {
        ApiError::OrderCreation(value)
    }
}

impl From<BackendError> for ApiError {
    fn from(value: BackendError) -> Self {
        ApiError::Backend(value)
    }
}

fn backend_status(e: &BackendError) -> StatusCode {
    match e {
        BackendError::NotFound(_) => StatusCode::NOT_FOUND,
        BackendError::InvalidTransition { .. } => StatusCode::CONFLICT,
        BackendError::Rejected(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn stock_status(e: &StockError) -> StatusCode {
    match e {
        StockError::EmptyRequest
        | StockError::InvalidQuantity { .. }
        | StockError::InvalidWindow { .. } => StatusCode::BAD_REQUEST,
        StockError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
        StockError::InsufficientStock { .. } => StatusCode::CONFLICT,
        StockError::Backend(e) => backend_status(e),
    }
}

fn order_status(e: &OrderCreationError) -> StatusCode {
    match e {
        OrderCreationError::Validation(_) | OrderCreationError::ShippingInfo(_) => {
            StatusCode::BAD_REQUEST
        }
        OrderCreationError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
        OrderCreationError::StockChanged { .. } => StatusCode::CONFLICT,
        OrderCreationError::PriceMismatch { .. }
        | OrderCreationError::UnsupportedToken { .. }
        | OrderCreationError::InactiveToken { .. }
        | OrderCreationError::CurrencyMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OrderCreationError::Backend(e) => backend_status(e),
    }
}

/// Message sent to the client; internal details stay in the log.
fn public_message(status: StatusCode, message: String, fallback: &str) -> String {
    if status.is_server_error() {
        fallback.to_string()
    } else {
        message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::Stock(e) => {
                let status = stock_status(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, "Stock reservation failed");
                }
                let message = public_message(status, e.to_string(), "Failed to validate stock");
                let failure = if status.is_server_error() {
                    StockFailure::Unavailable {
                        reason: message.clone(),
                    }
                } else {
                    e.to_failure()
                };
                let body = StockReservationResponse {
                    success: false,
                    message,
                    reservation_id: None,
                    expires_at: None,
                    items: Vec::new(),
                    failure: Some(failure),
                };
                (status, Json(body)).into_response()
            }
            ApiError::OrderCreation(OrderCreationFailure { created, error }) => {
                let status = order_status(&error);
                if status.is_server_error() {
                    tracing::error!(error = %error, created = created.len(), "Order creation failed");
                }
                let body = CreateOrdersResponse {
                    success: false,
                    orders: created.into_iter().map(OrderResponse::from).collect(),
                    message: public_message(status, error.to_string(), "Failed to create order"),
                    failure: Some(error.to_failure()),
                };
                (status, Json(body)).into_response()
            }
            ApiError::Backend(e) => {
                let status = backend_status(&e);
                if status.is_server_error() {
                    tracing::error!(error = %e, "Request failed");
                }
                let message = public_message(status, e.to_string(), "Internal server error");
                (status, Json(ErrorResponse::new(message))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adashop_core::model::OrderStatus;
    use uuid::Uuid;

    #[test]
    fn test_status_per_error_class() {
        assert_eq!(
            stock_status(&StockError::InsufficientStock {
                product_id: Uuid::nil(),
                product_name: "Tee".to_string(),
                available: 1,
                requested: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            order_status(&OrderCreationError::PriceMismatch {
                product_id: Uuid::nil(),
                product_name: "Tee".to_string(),
                expected: 120,
                got: 100,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            backend_status(&BackendError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Pending,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            backend_status(&BackendError::Transport("timeout".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_server_errors_hide_details() {
        assert_eq!(
            public_message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "database error: pool timed out".to_string(),
                "Failed to create order"
            ),
            "Failed to create order"
        );
        assert_eq!(
            public_message(StatusCode::CONFLICT, "Out of stock".to_string(), "x"),
            "Out of stock"
        );
    }
}
