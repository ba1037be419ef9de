//! Registry trait for self-registering implementations.
//!
//! Each store backend provides a `Registry` type implementing this trait so the
//! service can map the name used in configuration to a factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation.
	///
	/// This must match the key under `[store.implementations]`, for example
	/// `"postgres"` for `[store.implementations.postgres]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
