//! SLA deadline and breach computation.
//!
//! All functions here are pure: they take the evaluation instant as an
//! argument and never read the clock themselves.

use chrono::{DateTime, Utc};
use retrieval_types::{RetrievalOrder, SlaPolicy, SlaStatus};

/// `requested_at + budget(policy)`.
pub fn sla_deadline(requested_at: DateTime<Utc>, policy: SlaPolicy) -> DateTime<Utc> {
	requested_at + policy.budget()
}

/// Share of the SLA window that has elapsed at `now`, clamped to 0..=100.
pub fn elapsed_percentage(
	requested_at: DateTime<Utc>,
	deadline: DateTime<Utc>,
	now: DateTime<Utc>,
) -> f64 {
	let window = (deadline - requested_at).num_milliseconds();
	if window <= 0 {
		return if now >= deadline { 100.0 } else { 0.0 };
	}
	let elapsed = (now - requested_at).num_milliseconds();
	(elapsed as f64 / window as f64 * 100.0).clamp(0.0, 100.0)
}

/// Past the deadline and not yet terminal. Terminal orders never breach.
pub fn is_breached(order: &RetrievalOrder, now: DateTime<Utc>) -> bool {
	now > order.sla_deadline && !order.is_terminal()
}

/// Selection predicate of the escalation sweep.
pub fn needs_auto_escalation(order: &RetrievalOrder, now: DateTime<Utc>) -> bool {
	order.active && !order.auto_escalated && is_breached(order, now)
}

pub fn sla_status(order: &RetrievalOrder, now: DateTime<Utc>) -> SlaStatus {
	SlaStatus {
		policy: order.sla_policy,
		deadline: order.sla_deadline,
		elapsed_percentage: elapsed_percentage(order.requested_at, order.sla_deadline, now),
		breached: is_breached(order, now),
		evaluated_at: now,
	}
}
