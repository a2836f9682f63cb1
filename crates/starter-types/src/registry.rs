//! Self-registration of named backend implementations.
//!
//! Each storage or chain-query backend exposes a zero-sized `Registry` type
//! implementing this trait, so the service can collect `(name, factory)`
//! pairs without hard-coding constructors.

/// Associates a configuration name with a factory function.
pub trait ImplementationRegistry {
	/// Name used in configuration to select this implementation.
	const NAME: &'static str;

	/// Factory function type produced by this registry.
	type Factory;

	/// Returns the factory function for this implementation.
	fn factory() -> Self::Factory;
}
