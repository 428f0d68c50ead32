//! Thread-safe in-memory [`CredentialStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, String>>>;

/// Keeps credential keys in-process; nothing survives a restart.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(StoreMap);
impl CredentialStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().get(key).cloned()) })
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.to_owned(), value.to_owned());

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().remove(key);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn put_get_remove_cycle() {
		let store = MemoryStore::default();

		assert_eq!(store.get("missing").await.expect("Get should succeed."), None);

		store.put("k", "v").await.expect("Put should succeed.");

		assert_eq!(store.get("k").await.expect("Get should succeed."), Some("v".into()));

		store.remove("k").await.expect("Remove should succeed.");
		store.remove("k").await.expect("Removing an absent key should be a no-op.");

		assert_eq!(store.get("k").await.expect("Get should succeed."), None);
	}
}
