//! Time source for SLA evaluation and record timestamps.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of the current time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
	now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			now: Mutex::new(start),
		}
	}

	pub fn set(&self, instant: DateTime<Utc>) {
		*self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
	}

	pub fn advance(&self, by: Duration) {
		let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
		*now += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.now.lock().unwrap_or_else(|e| e.into_inner())
	}
}
