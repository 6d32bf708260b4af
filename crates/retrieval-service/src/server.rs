//! HTTP server for the retrieval API.
//!
//! All routes are nested under `/api` and delegate to [`crate::apis::orders`].

use crate::apis::orders;
use axum::{
	routing::{delete, get, post, put},
	Router,
};
use retrieval_config::ApiConfig;
use retrieval_core::RetrievalEngine;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<RetrievalEngine>,
}

/// Builds the API router.
pub fn router(engine: Arc<RetrievalEngine>) -> Router {
	Router::new()
		.nest(
			"/api",
			Router::new()
				.route(
					"/orders",
					post(orders::create_order).get(orders::list_orders),
				)
				.route(
					"/orders/{id}",
					get(orders::get_order).delete(orders::purge_order),
				)
				.route("/orders/{id}/actions/{action}", post(orders::apply_action))
				.route("/orders/{id}/escalate", post(orders::escalate))
				.route("/orders/{id}/archive", post(orders::archive))
				.route("/orders/{id}/priority", put(orders::set_priority))
				.route("/orders/{id}/sla-policy", put(orders::set_sla_policy))
				.route("/orders/{id}/customer", put(orders::set_customer))
				.route("/orders/{id}/lines", post(orders::add_line))
				.route("/orders/{id}/lines/{line_id}", delete(orders::remove_line))
				.route(
					"/orders/{id}/lines/{line_id}/status",
					put(orders::set_line_status),
				)
				.route("/orders/{id}/audit", get(orders::audit_trail)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive()),
		)
		.with_state(AppState { engine })
}

/// Binds the configured address and serves the API until the listener fails.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<RetrievalEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(engine);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Retrieval API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}
