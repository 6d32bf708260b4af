//! Startup and shutdown of the retrieval engine.

use super::{EngineError, RetrievalEngine};
use crate::sla;

impl RetrievalEngine {
	/// Logs the state the engine starts from.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		let orders = self
			.state_machine
			.list_orders(false)
			.await
			.map_err(|e| EngineError::Service(e.to_string()))?;

		let now = self.state_machine.clock().now();
		let open = orders.iter().filter(|o| !o.is_terminal()).count();
		let breached = orders.iter().filter(|o| sla::is_breached(o, now)).count();

		tracing::info!(
			service_id = %self.config.service.id,
			active = orders.len(),
			open,
			breached,
			"Initializing retrieval engine"
		);
		Ok(())
	}

	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down retrieval engine");
		Ok(())
	}
}
