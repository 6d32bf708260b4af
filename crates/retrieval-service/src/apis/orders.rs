//! Order endpoints.
//!
//! Every handler resolves the acting user from the request body, falling back
//! to [`DEFAULT_ACTOR`]. Action, escalation and archive requests may omit the
//! body entirely. Handlers then call the order state machine and renders the order
//! with its derived values. State machine errors are mapped to HTTP statuses
//! by [`to_api_error`].

use crate::server::AppState;
use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::Json,
};
use retrieval_core::{OrderStateError, RetrievalEngine};
use retrieval_types::{
	truncate_id, APIError, ActorRequest, AddLineRequest, AuditEntry, CreateOrderRequest,
	EscalateRequest, ListOrdersQuery, NewRetrievalOrder, OrderAction, OrderResponse,
	RetrievalOrder, SetCustomerRequest, SetLineStatusRequest, SetPriorityRequest,
	SetSlaPolicyRequest,
};
use serde_json::json;

/// Actor recorded when a request does not name one.
pub const DEFAULT_ACTOR: &str = "api";

fn actor_or_default(actor: Option<String>) -> String {
	actor
		.filter(|a| !a.trim().is_empty())
		.unwrap_or_else(|| DEFAULT_ACTOR.to_string())
}

/// Maps a state machine error onto the API error surface.
pub fn to_api_error(error: OrderStateError) -> APIError {
	let message = error.to_string();
	match error {
		OrderStateError::StateTransition {
			action,
			actual,
			required,
		} => APIError::Conflict {
			error_type: "STATE_TRANSITION".to_string(),
			message,
			details: Some(json!({
				"action": action,
				"actual": actual,
				"required": required,
			})),
		},
		OrderStateError::Validation(_) => APIError::BadRequest {
			error_type: "VALIDATION_ERROR".to_string(),
			message,
		},
		OrderStateError::InvalidOperation(_) => APIError::UnprocessableEntity {
			error_type: "INVALID_OPERATION".to_string(),
			message,
		},
		OrderStateError::OrderNotFound(_) => APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message,
		},
		OrderStateError::Directory(_) | OrderStateError::Storage(_) => {
			tracing::error!(error = %message, "Order request failed");
			APIError::InternalServerError {
				error_type: "INTERNAL_ERROR".to_string(),
				message,
			}
		},
	}
}

async fn respond(
	engine: &RetrievalEngine,
	result: Result<RetrievalOrder, OrderStateError>,
) -> Result<Json<OrderResponse>, APIError> {
	let order = result.map_err(to_api_error)?;
	Ok(Json(engine.state_machine().describe(&order).await))
}

/// Handles POST /api/orders.
pub async fn create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), APIError> {
	let new_order = NewRetrievalOrder {
		customer_id: request.customer_id,
		sla_policy: request.sla_policy,
		priority: request.priority,
		lines: request.lines,
		requested_by: request.requested_by,
	};

	let order = state
		.engine
		.state_machine()
		.create_order(new_order)
		.await
		.map_err(to_api_error)?;
	tracing::info!(
		order_id = %truncate_id(&order.id),
		reference = %order.reference,
		"Order created via API"
	);

	let response = state.engine.state_machine().describe(&order).await;
	Ok((StatusCode::CREATED, Json(response)))
}

/// Handles GET /api/orders. Archived orders are listed only on request.
pub async fn list_orders(
	State(state): State<AppState>,
	Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<OrderResponse>>, APIError> {
	let machine = state.engine.state_machine();
	let orders = machine
		.list_orders(query.include_archived)
		.await
		.map_err(to_api_error)?;

	let mut responses = Vec::with_capacity(orders.len());
	for order in &orders {
		responses.push(machine.describe(order).await);
	}
	Ok(Json(responses))
}

/// Handles GET /api/orders/{id}.
pub async fn get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, APIError> {
	let result = state.engine.state_machine().get_order(&id).await;
	respond(&state.engine, result).await
}

/// Handles POST /api/orders/{id}/actions/{action}.
pub async fn apply_action(
	Path((id, action)): Path<(String, String)>,
	State(state): State<AppState>,
	request: Option<Json<ActorRequest>>,
) -> Result<Json<OrderResponse>, APIError> {
	let action: OrderAction = action.parse().map_err(|e: String| APIError::BadRequest {
		error_type: "UNKNOWN_ACTION".to_string(),
		message: e,
	})?;
	let actor = actor_or_default(request.and_then(|Json(r)| r.actor));

	let result = state
		.engine
		.state_machine()
		.apply(&id, action, &actor)
		.await;
	respond(&state.engine, result).await
}

/// Handles POST /api/orders/{id}/escalate.
pub async fn escalate(
	Path(id): Path<String>,
	State(state): State<AppState>,
	request: Option<Json<EscalateRequest>>,
) -> Result<Json<OrderResponse>, APIError> {
	let request = request.map(|Json(r)| r).unwrap_or_default();
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.manual_escalation(&id, &actor, request.reason)
		.await;
	respond(&state.engine, result).await
}

/// Handles POST /api/orders/{id}/archive.
pub async fn archive(
	Path(id): Path<String>,
	State(state): State<AppState>,
	request: Option<Json<ActorRequest>>,
) -> Result<Json<OrderResponse>, APIError> {
	let actor = actor_or_default(request.and_then(|Json(r)| r.actor));
	let result = state.engine.state_machine().archive(&id, &actor).await;
	respond(&state.engine, result).await
}

/// Handles DELETE /api/orders/{id}.
pub async fn purge_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	state
		.engine
		.state_machine()
		.purge(&id, DEFAULT_ACTOR)
		.await
		.map_err(to_api_error)?;
	Ok(StatusCode::NO_CONTENT)
}

/// Handles PUT /api/orders/{id}/priority.
pub async fn set_priority(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<SetPriorityRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.set_priority(&id, request.priority, &actor)
		.await;
	respond(&state.engine, result).await
}

/// Handles PUT /api/orders/{id}/sla-policy.
pub async fn set_sla_policy(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<SetSlaPolicyRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.set_sla_policy(&id, request.sla_policy, &actor)
		.await;
	respond(&state.engine, result).await
}

/// Handles PUT /api/orders/{id}/customer.
pub async fn set_customer(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<SetCustomerRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.set_customer(&id, &request.customer_id, &actor)
		.await;
	respond(&state.engine, result).await
}

/// Handles POST /api/orders/{id}/lines.
pub async fn add_line(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<AddLineRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), APIError> {
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.add_line(&id, request.line, &actor)
		.await;
	let response = respond(&state.engine, result).await?;
	Ok((StatusCode::CREATED, response))
}

/// Handles DELETE /api/orders/{id}/lines/{line_id}.
pub async fn remove_line(
	Path((id, line_id)): Path<(String, String)>,
	State(state): State<AppState>,
) -> Result<Json<OrderResponse>, APIError> {
	let result = state
		.engine
		.state_machine()
		.remove_line(&id, &line_id, DEFAULT_ACTOR)
		.await;
	respond(&state.engine, result).await
}

/// Handles PUT /api/orders/{id}/lines/{line_id}/status.
pub async fn set_line_status(
	Path((id, line_id)): Path<(String, String)>,
	State(state): State<AppState>,
	Json(request): Json<SetLineStatusRequest>,
) -> Result<Json<OrderResponse>, APIError> {
	let actor = actor_or_default(request.actor);
	let result = state
		.engine
		.state_machine()
		.set_line_status(&id, &line_id, request.status, &actor)
		.await;
	respond(&state.engine, result).await
}

/// Handles GET /api/orders/{id}/audit.
pub async fn audit_trail(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<AuditEntry>>, APIError> {
	let entries = state
		.engine
		.state_machine()
		.audit_trail(&id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(entries))
}
