//! Broadcast channel for order events.

use retrieval_types::OrderEvent;
use tokio::sync::broadcast;

/// Cloneable handle to a broadcast channel of [`OrderEvent`]s.
///
/// Publishing with no subscribers returns an error; publishers ignore it.
#[derive(Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn publish(
		&self,
		event: OrderEvent,
	) -> Result<usize, broadcast::error::SendError<OrderEvent>> {
		self.sender.send(event)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_subscribers_receive_events() {
		let bus = EventBus::new(8);
		assert!(bus
			.publish(OrderEvent::Archived {
				order_id: "o-1".into()
			})
			.is_err());

		let mut rx = bus.subscribe();
		bus.publish(OrderEvent::Purged {
			order_id: "o-2".into(),
		})
		.unwrap();
		assert_eq!(rx.recv().await.unwrap().order_id(), "o-2");
	}
}
