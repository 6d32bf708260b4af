//! API types for the retrieval service HTTP endpoints.

use crate::{
	LineStatus, NewRetrievalLine, OrderState, Priority, RetrievalLine, SlaPolicy,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	pub customer_id: String,
	#[serde(default)]
	pub sla_policy: SlaPolicy,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default)]
	pub lines: Vec<NewRetrievalLine>,
	pub requested_by: String,
}

/// Body of requests that only need to identify the acting user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
	#[serde(default)]
	pub actor: Option<String>,
}

/// Body of `POST /api/orders/{id}/escalate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalateRequest {
	#[serde(default)]
	pub actor: Option<String>,
	#[serde(default)]
	pub reason: Option<String>,
}

/// Body of `PUT /api/orders/{id}/priority`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriorityRequest {
	pub priority: Priority,
	#[serde(default)]
	pub actor: Option<String>,
}

/// Body of `PUT /api/orders/{id}/sla-policy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSlaPolicyRequest {
	pub sla_policy: SlaPolicy,
	#[serde(default)]
	pub actor: Option<String>,
}

/// Body of `PUT /api/orders/{id}/customer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCustomerRequest {
	pub customer_id: String,
	#[serde(default)]
	pub actor: Option<String>,
}

/// Query of `GET /api/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
	#[serde(default)]
	pub include_archived: bool,
}

/// Body of `POST /api/orders/{id}/lines`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineRequest {
	#[serde(flatten)]
	pub line: NewRetrievalLine,
	#[serde(default)]
	pub actor: Option<String>,
}

/// Body of `PUT /api/orders/{id}/lines/{line_id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLineStatusRequest {
	pub status: LineStatus,
	#[serde(default)]
	pub actor: Option<String>,
}

/// SLA snapshot evaluated at `evaluated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlaStatus {
	pub policy: SlaPolicy,
	pub deadline: DateTime<Utc>,
	pub elapsed_percentage: f64,
	pub breached: bool,
	pub evaluated_at: DateTime<Utc>,
}

/// An order together with its derived values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
	pub id: String,
	pub reference: String,
	pub customer_id: String,
	pub requested_at: DateTime<Utc>,
	pub requested_by: String,
	pub state: OrderState,
	pub priority: Priority,
	pub sla: SlaStatus,
	pub lines: Vec<RetrievalLine>,
	pub item_count: u32,
	pub estimated_pages: u64,
	pub progress_percentage: f64,
	pub estimated_cost: Decimal,
	pub auto_escalated: bool,
	pub escalation_reason: Option<String>,
	pub actual_start_date: Option<DateTime<Utc>>,
	pub actual_completion_date: Option<DateTime<Utc>>,
	pub active: bool,
	pub updated_at: DateTime<Utc>,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
}

/// Structured API error with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input (400)
	BadRequest { error_type: String, message: String },
	/// Unknown resource (404)
	NotFound { error_type: String, message: String },
	/// Action not allowed in the current state (409)
	Conflict {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Business rule rejected the operation (422)
	UnprocessableEntity { error_type: String, message: String },
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::UnprocessableEntity { .. } => 422,
			APIError::InternalServerError { .. } => 500,
		}
	}

	pub fn to_error_response(&self) -> ErrorResponse {
		match self {
			APIError::BadRequest { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::UnprocessableEntity { error_type, message }
			| APIError::InternalServerError { error_type, message } => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: None,
			},
			APIError::Conflict {
				error_type,
				message,
				details,
			} => ErrorResponse {
				error: error_type.clone(),
				message: message.clone(),
				details: details.clone(),
			},
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::UnprocessableEntity { message, .. } => {
				write!(f, "Unprocessable Entity: {}", message)
			},
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
