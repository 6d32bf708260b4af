//! Retrieval order types.
//!
//! A retrieval order asks for one or more stored items (boxes, files) to be
//! located, pulled, checked, packed and delivered back to a customer. This
//! module defines the order record, its lines, and the enums that drive its
//! lifecycle and service level.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Rate;

/// Lifecycle state of a retrieval order.
///
/// The workflow is linear from `Draft` to `Completed`; `Cancelled` is
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
	Draft,
	Confirmed,
	Locating,
	Retrieving,
	Quality,
	Packaging,
	Delivering,
	Delivered,
	Completed,
	Cancelled,
}

impl OrderState {
	/// States from which `cancel` is allowed.
	pub const CANCELLABLE: [OrderState; 7] = [
		OrderState::Draft,
		OrderState::Confirmed,
		OrderState::Locating,
		OrderState::Retrieving,
		OrderState::Quality,
		OrderState::Packaging,
		OrderState::Delivering,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderState::Draft => "draft",
			OrderState::Confirmed => "confirmed",
			OrderState::Locating => "locating",
			OrderState::Retrieving => "retrieving",
			OrderState::Quality => "quality",
			OrderState::Packaging => "packaging",
			OrderState::Delivering => "delivering",
			OrderState::Delivered => "delivered",
			OrderState::Completed => "completed",
			OrderState::Cancelled => "cancelled",
		}
	}

	/// Terminal states accept no further transitions or escalation.
	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderState::Completed | OrderState::Cancelled)
	}
}

impl fmt::Display for OrderState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderState {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"draft" => Ok(Self::Draft),
			"confirmed" => Ok(Self::Confirmed),
			"locating" => Ok(Self::Locating),
			"retrieving" => Ok(Self::Retrieving),
			"quality" => Ok(Self::Quality),
			"packaging" => Ok(Self::Packaging),
			"delivering" => Ok(Self::Delivering),
			"delivered" => Ok(Self::Delivered),
			"completed" => Ok(Self::Completed),
			"cancelled" => Ok(Self::Cancelled),
			other => Err(format!("unknown order state '{}'", other)),
		}
	}
}

/// Service level policy, each with a fixed response-time budget.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SlaPolicy {
	/// 24 hours.
	#[default]
	Standard,
	/// 8 hours.
	Priority,
	/// 2 hours.
	Express,
}

impl SlaPolicy {
	/// Response-time budget granted by this policy.
	pub fn budget(&self) -> Duration {
		match self {
			SlaPolicy::Standard => Duration::hours(24),
			SlaPolicy::Priority => Duration::hours(8),
			SlaPolicy::Express => Duration::hours(2),
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SlaPolicy::Standard => "standard",
			SlaPolicy::Priority => "priority",
			SlaPolicy::Express => "express",
		}
	}
}

impl fmt::Display for SlaPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SlaPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"standard" => Ok(Self::Standard),
			"priority" => Ok(Self::Priority),
			"express" => Ok(Self::Express),
			other => Err(format!("unknown SLA policy '{}'", other)),
		}
	}
}

/// Priority tier of an order. Ordered from lowest to highest.
#[derive(
	Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	Low,
	#[default]
	Normal,
	High,
	Urgent,
}

impl Priority {
	/// Next tier up, saturating at `Urgent`.
	pub fn escalated(self) -> Priority {
		match self {
			Priority::Low => Priority::Normal,
			Priority::Normal => Priority::High,
			Priority::High | Priority::Urgent => Priority::Urgent,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Priority::Low => "low",
			Priority::Normal => "normal",
			Priority::High => "high",
			Priority::Urgent => "urgent",
		}
	}
}

impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Priority {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"low" => Ok(Self::Low),
			"normal" => Ok(Self::Normal),
			"high" => Ok(Self::High),
			"urgent" => Ok(Self::Urgent),
			other => Err(format!("unknown priority '{}'", other)),
		}
	}
}

/// Status of a single requested item.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
	#[default]
	Pending,
	Located,
	Retrieved,
	Delivered,
	Completed,
	NotFound,
}

impl LineStatus {
	/// Whether a line in this status counts towards order progress.
	pub fn is_progressed(&self) -> bool {
		matches!(
			self,
			LineStatus::Retrieved | LineStatus::Delivered | LineStatus::Completed
		)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LineStatus::Pending => "pending",
			LineStatus::Located => "located",
			LineStatus::Retrieved => "retrieved",
			LineStatus::Delivered => "delivered",
			LineStatus::Completed => "completed",
			LineStatus::NotFound => "not_found",
		}
	}
}

impl fmt::Display for LineStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Workflow actions exposed by the order controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderAction {
	Confirm,
	StartLocating,
	StartRetrieving,
	QualityCheck,
	StartPackaging,
	StartDelivery,
	MarkDelivered,
	Complete,
	Cancel,
}

impl OrderAction {
	pub const ALL: [OrderAction; 9] = [
		OrderAction::Confirm,
		OrderAction::StartLocating,
		OrderAction::StartRetrieving,
		OrderAction::QualityCheck,
		OrderAction::StartPackaging,
		OrderAction::StartDelivery,
		OrderAction::MarkDelivered,
		OrderAction::Complete,
		OrderAction::Cancel,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderAction::Confirm => "confirm",
			OrderAction::StartLocating => "start_locating",
			OrderAction::StartRetrieving => "start_retrieving",
			OrderAction::QualityCheck => "quality_check",
			OrderAction::StartPackaging => "start_packaging",
			OrderAction::StartDelivery => "start_delivery",
			OrderAction::MarkDelivered => "mark_delivered",
			OrderAction::Complete => "complete",
			OrderAction::Cancel => "cancel",
		}
	}
}

impl fmt::Display for OrderAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for OrderAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		OrderAction::ALL
			.into_iter()
			.find(|action| action.as_str() == s)
			.ok_or_else(|| format!("unknown order action '{}'", s))
	}
}

/// One requested item of a retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalLine {
	/// Identifier unique within the owning order.
	pub id: String,
	/// What is being requested (file title, box label, ...).
	pub description: String,
	/// Storage box the item is expected in, if known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub box_reference: Option<String>,
	/// Estimated number of pages, used for scanning cost.
	pub estimated_pages: u32,
	pub status: LineStatus,
}

/// A retrieval work order.
///
/// Derived values (item count, pages, progress, cost, SLA status) are not
/// stored; they are computed from the fields below whenever they are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOrder {
	/// Opaque identifier assigned at creation.
	pub id: String,
	/// Human-readable order number, e.g. `RET/2026/00042`.
	pub reference: String,
	pub customer_id: String,
	/// When the request was made. Never changes.
	pub requested_at: DateTime<Utc>,
	/// Who created the order.
	pub requested_by: String,
	pub sla_policy: SlaPolicy,
	/// `requested_at + sla_policy.budget()`.
	pub sla_deadline: DateTime<Utc>,
	pub priority: Priority,
	pub state: OrderState,
	#[serde(default)]
	pub lines: Vec<RetrievalLine>,
	/// Set only by the escalation monitor.
	#[serde(default)]
	pub auto_escalated: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub escalation_reason: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual_start_date: Option<DateTime<Utc>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub actual_completion_date: Option<DateTime<Utc>>,
	/// False once the order has been archived.
	pub active: bool,
	pub updated_at: DateTime<Utc>,
	/// Counter used to hand out line identifiers.
	#[serde(default)]
	pub next_line_seq: u32,
}

impl RetrievalOrder {
	pub fn item_count(&self) -> u32 {
		self.lines.len() as u32
	}

	pub fn estimated_pages(&self) -> u64 {
		self.lines.iter().map(|l| l.estimated_pages as u64).sum()
	}

	/// Share of lines that are retrieved, delivered or completed, 0..=100.
	pub fn progress_percentage(&self) -> f64 {
		if self.lines.is_empty() {
			return 0.0;
		}
		let done = self.lines.iter().filter(|l| l.status.is_progressed()).count();
		done as f64 / self.lines.len() as f64 * 100.0
	}

	/// Cost estimate for this order under `rate`. Zero without a rate.
	pub fn estimated_cost(&self, rate: Option<&Rate>) -> Decimal {
		rate.map(|r| r.estimate(self.item_count(), self.estimated_pages()))
			.unwrap_or(Decimal::ZERO)
	}

	pub fn is_terminal(&self) -> bool {
		self.state.is_terminal()
	}

	pub fn line(&self, line_id: &str) -> Option<&RetrievalLine> {
		self.lines.iter().find(|l| l.id == line_id)
	}

	pub fn line_mut(&mut self, line_id: &str) -> Option<&mut RetrievalLine> {
		self.lines.iter_mut().find(|l| l.id == line_id)
	}

	/// Appends a line and assigns it the next line identifier.
	pub fn push_line(&mut self, new_line: NewRetrievalLine) -> &RetrievalLine {
		self.next_line_seq += 1;
		self.lines.push(RetrievalLine {
			id: format!("L{}", self.next_line_seq),
			description: new_line.description,
			box_reference: new_line.box_reference,
			estimated_pages: new_line.estimated_pages,
			status: LineStatus::Pending,
		});
		&self.lines[self.lines.len() - 1]
	}
}

/// Input for creating an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRetrievalOrder {
	pub customer_id: String,
	#[serde(default)]
	pub sla_policy: SlaPolicy,
	#[serde(default)]
	pub priority: Priority,
	#[serde(default)]
	pub lines: Vec<NewRetrievalLine>,
	/// Actor creating the order (portal user, staff member).
	pub requested_by: String,
}

/// Input for a new line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRetrievalLine {
	pub description: String,
	#[serde(default)]
	pub box_reference: Option<String>,
	#[serde(default)]
	pub estimated_pages: u32,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn order_with_lines(statuses: &[(LineStatus, u32)]) -> RetrievalOrder {
		let t0 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
		let mut order = RetrievalOrder {
			id: "order-1".into(),
			reference: "RET/2026/00001".into(),
			customer_id: "acme".into(),
			requested_at: t0,
			requested_by: "clerk".into(),
			sla_policy: SlaPolicy::Standard,
			sla_deadline: t0 + SlaPolicy::Standard.budget(),
			priority: Priority::Normal,
			state: OrderState::Draft,
			lines: Vec::new(),
			auto_escalated: false,
			escalation_reason: None,
			actual_start_date: None,
			actual_completion_date: None,
			active: true,
			updated_at: t0,
			next_line_seq: 0,
		};
		for (status, pages) in statuses {
			order.push_line(NewRetrievalLine {
				description: "file".into(),
				box_reference: None,
				estimated_pages: *pages,
			});
			let last = order.lines.len() - 1;
			order.lines[last].status = *status;
		}
		order
	}

	#[test]
	fn test_policy_budgets() {
		assert_eq!(SlaPolicy::Standard.budget(), Duration::hours(24));
		assert_eq!(SlaPolicy::Priority.budget(), Duration::hours(8));
		assert_eq!(SlaPolicy::Express.budget(), Duration::hours(2));
	}

	#[test]
	fn test_priority_escalation_saturates() {
		assert_eq!(Priority::Low.escalated(), Priority::Normal);
		assert_eq!(Priority::Normal.escalated(), Priority::High);
		assert_eq!(Priority::High.escalated(), Priority::Urgent);
		assert_eq!(Priority::Urgent.escalated(), Priority::Urgent);
		assert!(Priority::Low < Priority::Urgent);
	}

	#[test]
	fn test_terminal_states() {
		assert!(OrderState::Completed.is_terminal());
		assert!(OrderState::Cancelled.is_terminal());
		assert!(!OrderState::Delivered.is_terminal());
		assert!(!OrderState::CANCELLABLE.contains(&OrderState::Delivered));
	}

	#[test]
	fn test_action_parsing() {
		assert_eq!(
			"start_locating".parse::<OrderAction>().unwrap(),
			OrderAction::StartLocating
		);
		assert!("teleport".parse::<OrderAction>().is_err());
		for action in OrderAction::ALL {
			assert_eq!(action.as_str().parse::<OrderAction>().unwrap(), action);
		}
	}

	#[test]
	fn test_derived_counts_and_progress() {
		let order = order_with_lines(&[
			(LineStatus::Pending, 10),
			(LineStatus::Retrieved, 20),
			(LineStatus::Delivered, 5),
			(LineStatus::NotFound, 0),
		]);
		assert_eq!(order.item_count(), 4);
		assert_eq!(order.estimated_pages(), 35);
		assert!((order.progress_percentage() - 50.0).abs() < f64::EPSILON);
		assert_eq!(order.lines[3].id, "L4");
	}

	#[test]
	fn test_progress_without_lines_is_zero() {
		let order = order_with_lines(&[]);
		assert_eq!(order.progress_percentage(), 0.0);
	}

	#[test]
	fn test_cost_without_rate_is_zero() {
		let order = order_with_lines(&[(LineStatus::Pending, 100)]);
		assert_eq!(order.estimated_cost(None), Decimal::ZERO);
	}

	#[test]
	fn test_cost_with_rate() {
		let order = order_with_lines(&[(LineStatus::Pending, 100), (LineStatus::Pending, 50)]);
		let rate = Rate {
			document_retrieval_rate: Decimal::new(350, 2),
			scanning_rate_per_page: Decimal::new(10, 2),
		};
		// 2 * 3.50 + 150 * 0.10
		assert_eq!(order.estimated_cost(Some(&rate)), Decimal::new(2200, 2));
	}

	#[test]
	fn test_state_serializes_snake_case() {
		let json = serde_json::to_string(&OrderState::Delivering).unwrap();
		assert_eq!(json, "\"delivering\"");
		let status: LineStatus = serde_json::from_str("\"not_found\"").unwrap();
		assert_eq!(status, LineStatus::NotFound);
	}
}
