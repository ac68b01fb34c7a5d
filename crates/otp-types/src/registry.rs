//! Registry trait for self-registering implementations.

/// Base trait for implementation registries.
///
/// Each pluggable implementation (a storage backend, an API client) exposes a
/// `Registry` struct implementing this trait, declaring the name it is
/// configured under and the factory that builds it.
pub trait ImplementationRegistry {
	/// The key used under `implementations` in the TOML configuration,
	/// for example "file" for `storage.implementations.file`.
	const NAME: &'static str;

	/// The factory function type of the owning module.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
