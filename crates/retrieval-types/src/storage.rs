//! Storage-related types for the retrieval service.

use std::str::FromStr;

/// Storage namespaces for the different data collections.
///
/// Replaces string literals in storage calls with typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Retrieval orders, keyed by order id.
	Orders,
	/// Audit trail, keyed by order id.
	AuditLog,
	/// Reference number counters, keyed by sequence name.
	Sequences,
}

impl StorageKey {
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::AuditLog => "audit_log",
			StorageKey::Sequences => "sequences",
		}
	}

	pub fn all() -> impl Iterator<Item = Self> {
		[Self::Orders, Self::AuditLog, Self::Sequences].into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(Self::Orders),
			"audit_log" => Ok(Self::AuditLog),
			"sequences" => Ok(Self::Sequences),
			_ => Err(()),
		}
	}
}

impl From<StorageKey> for &'static str {
	fn from(key: StorageKey) -> Self {
		key.as_str()
	}
}
