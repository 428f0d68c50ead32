//! Encrypted file-backed [`CredentialStore`] for durable client installs.
//!
//! The snapshot is a JSON map sealed with AES-256-GCM. The key is derived
//! from a caller-supplied passphrase via SHA-256, and every write uses a
//! fresh random 96-bit nonce, so two identical snapshots never produce the
//! same ciphertext. Writes go through a temporary file plus rename so a
//! crash mid-write leaves the previous snapshot intact.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// crates.io
use aes_gcm::{
	Aes256Gcm, Key, Nonce,
	aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError, StoreFuture},
};

const NONCE_LEN: usize = 12;

#[derive(Serialize, Deserialize)]
struct SealedSnapshot {
	nonce: String,
	data: String,
}

/// Persists credential keys to an encrypted JSON snapshot after each mutation.
#[derive(Clone)]
pub struct EncryptedFileStore {
	path: PathBuf,
	cipher: Aes256Gcm,
	inner: Arc<RwLock<HashMap<String, String>>>,
}
impl EncryptedFileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading and
	/// decrypting existing data with the given passphrase.
	pub fn open(path: impl Into<PathBuf>, passphrase: &str) -> Result<Self, StoreError> {
		let path = path.into();
		let cipher = Self::derive_cipher(passphrase);

		Self::ensure_parent_exists(&path)?;

		let snapshot =
			if path.exists() { Self::load_snapshot(&path, &cipher)? } else { HashMap::new() };

		Ok(Self { path, cipher, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn derive_cipher(passphrase: &str) -> Aes256Gcm {
		let digest = Sha256::digest(passphrase.as_bytes());

		Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest))
	}

	fn load_snapshot(
		path: &Path,
		cipher: &Aes256Gcm,
	) -> Result<HashMap<String, String>, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let sealed: SealedSnapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;
		let nonce = BASE64.decode(&sealed.nonce).map_err(|e| StoreError::Crypto {
			message: format!("Snapshot nonce is not valid base64: {e}"),
		})?;
		let ciphertext = BASE64.decode(&sealed.data).map_err(|e| StoreError::Crypto {
			message: format!("Snapshot payload is not valid base64: {e}"),
		})?;

		if nonce.len() != NONCE_LEN {
			return Err(StoreError::Crypto { message: "Snapshot nonce has a bad length".into() });
		}

		let plaintext =
			cipher.decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref()).map_err(|_| {
				StoreError::Crypto {
					message: "Snapshot could not be decrypted; wrong passphrase or corrupt file"
						.into(),
				}
			})?;
		let entries: Vec<(String, String)> =
			serde_json::from_slice(&plaintext).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse decrypted snapshot: {e}"),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}
		Ok(())
	}

	fn persist_locked(&self, contents: &HashMap<String, String>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let plaintext =
			serde_json::to_vec(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
			})?;
		let mut nonce = [0u8; NONCE_LEN];

		rand::rng().fill_bytes(&mut nonce);

		let ciphertext = self
			.cipher
			.encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
			.map_err(|_| StoreError::Crypto { message: "Snapshot encryption failed".into() })?;
		let sealed =
			SealedSnapshot { nonce: BASE64.encode(nonce), data: BASE64.encode(ciphertext) };
		let serialized =
			serde_json::to_vec(&sealed).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize sealed snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl Debug for EncryptedFileStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EncryptedFileStore").field("path", &self.path).finish()
	}
}
impl CredentialStore for EncryptedFileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn put<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			guard.insert(key.to_owned(), value.to_owned());
			self.persist_locked(&guard)?;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if guard.remove(key).is_some() {
				self.persist_locked(&guard)?;
			}

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"oidc_conduit_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[tokio::test]
	async fn save_and_reload_round_trip() {
		let path = temp_path();
		let store = EncryptedFileStore::open(&path, "hunter2")
			.expect("Failed to open encrypted store snapshot.");

		store.put("oidc.access", "access-token").await.expect("Put should succeed.");
		store.put("sso.id", "keycloak").await.expect("Put should succeed.");
		drop(store);

		let reopened = EncryptedFileStore::open(&path, "hunter2")
			.expect("Failed to reopen encrypted store snapshot.");

		assert_eq!(
			reopened.get("oidc.access").await.expect("Get should succeed."),
			Some("access-token".into()),
		);
		assert_eq!(
			reopened.get("sso.id").await.expect("Get should succeed."),
			Some("keycloak".into()),
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn wrong_passphrase_is_a_crypto_error() {
		let path = temp_path();
		let store = EncryptedFileStore::open(&path, "correct horse")
			.expect("Failed to open encrypted store snapshot.");

		store.put("oidc.refresh", "refresh-token").await.expect("Put should succeed.");
		drop(store);

		let err = EncryptedFileStore::open(&path, "battery staple")
			.expect_err("Opening with the wrong passphrase should fail.");

		assert!(matches!(err, StoreError::Crypto { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store snapshot {}: {e}", path.display())
		});
	}

	#[tokio::test]
	async fn snapshot_is_not_plaintext_on_disk() {
		let path = temp_path();
		let store = EncryptedFileStore::open(&path, "hunter2")
			.expect("Failed to open encrypted store snapshot.");

		store.put("oidc.access", "very-visible-access-token").await.expect("Put should succeed.");

		let raw = fs::read_to_string(&path).expect("Snapshot file should exist after a write.");

		assert!(!raw.contains("very-visible-access-token"));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary store snapshot {}: {e}", path.display())
		});
	}
}
