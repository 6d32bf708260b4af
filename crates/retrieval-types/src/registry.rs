//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Every pluggable backend module exposes a `Registry` type that names the
/// key it is configured under and hands out its factory function.
pub trait ImplementationRegistry {
	/// Name used in configuration, e.g. `memory` for
	/// `[storage.implementations.memory]`.
	const NAME: &'static str;

	/// Factory function type for this kind of implementation.
	type Factory;

	fn factory() -> Self::Factory;
}
