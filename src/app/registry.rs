//! Immutable application registrations and the registry the broker resolves them from.

// self
use crate::{
	_prelude::*,
	app::{AppId, AppKey, AppSecret},
};

/// Credentials and cache keys registered for one application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppRegistration {
	/// Logical key callers resolve credentials with.
	pub app_key: AppKey,
	/// Issuer application identifier sent as `appid`.
	pub app_id: AppId,
	/// Issuer application secret sent as `secret`.
	pub secret: AppSecret,
	/// Store key holding the cached access token.
	pub token_cache_key: String,
	/// Store key holding the cached JS API ticket.
	pub ticket_cache_key: String,
}
impl AppRegistration {
	/// Creates a registration using `<app_key>:access_token` and `<app_key>:jsapi_ticket` as
	/// cache keys.
	pub fn new(app_key: AppKey, app_id: AppId, secret: AppSecret) -> Self {
		let token_cache_key = format!("{app_key}:access_token");
		let ticket_cache_key = format!("{app_key}:jsapi_ticket");

		Self { app_key, app_id, secret, token_cache_key, ticket_cache_key }
	}

	/// Overrides the access-token cache key.
	pub fn with_token_cache_key(mut self, key: impl Into<String>) -> Self {
		self.token_cache_key = key.into();

		self
	}

	/// Overrides the JS API ticket cache key.
	pub fn with_ticket_cache_key(mut self, key: impl Into<String>) -> Self {
		self.ticket_cache_key = key.into();

		self
	}
}

/// Lookup table from application key to registration; fixed once the broker is built.
#[derive(Clone, Debug, Default)]
pub struct AppRegistry(HashMap<AppKey, Arc<AppRegistration>>);
impl AppRegistry {
	/// Registers (or replaces) an application.
	pub fn register(&mut self, registration: AppRegistration) {
		self.0.insert(registration.app_key.clone(), Arc::new(registration));
	}

	/// Adds a registration, builder style.
	pub fn with(mut self, registration: AppRegistration) -> Self {
		self.register(registration);

		self
	}

	/// Resolves the registration for `app_key`; empty or unknown keys yield `None`.
	pub fn get(&self, app_key: &str) -> Option<Arc<AppRegistration>> {
		if app_key.is_empty() {
			return None;
		}

		self.0.get(app_key).cloned()
	}

	/// Number of registered applications.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no application is registered.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl FromIterator<AppRegistration> for AppRegistry {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = AppRegistration>,
	{
		let mut registry = Self::default();

		iter.into_iter().for_each(|registration| registry.register(registration));

		registry
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn registration(key: &str) -> AppRegistration {
		AppRegistration::new(
			AppKey::new(key).expect("App key fixture should be valid."),
			AppId::new("wx0123").expect("App id fixture should be valid."),
			AppSecret::new("secret"),
		)
	}

	#[test]
	fn default_cache_keys_derive_from_app_key() {
		let registration = registration("shop");

		assert_eq!(registration.token_cache_key, "shop:access_token");
		assert_eq!(registration.ticket_cache_key, "shop:jsapi_ticket");

		let registration = registration
			.with_token_cache_key("access_token")
			.with_ticket_cache_key("tools_ticket");

		assert_eq!(registration.token_cache_key, "access_token");
		assert_eq!(registration.ticket_cache_key, "tools_ticket");
	}

	#[test]
	fn registry_ignores_empty_and_unknown_keys() {
		let registry: AppRegistry = [registration("shop")].into_iter().collect();

		assert_eq!(registry.len(), 1);
		assert!(registry.get("").is_none());
		assert!(registry.get("blog").is_none());
		assert_eq!(
			registry.get("shop").map(|registration| registration.app_id.to_string()),
			Some("wx0123".into())
		);
	}
}
