//! Single-use-per-connection transit tokens that bind OAuth callbacks to the scope that
//! started them.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{Scope, Secret},
	store::OptionStore,
};

const TRANSIT_OPTION: &str = "tt";
const SEED_LEN: usize = 64;

/// Issues, validates, and rotates the per-scope transit token used as the OAuth `state`.
#[derive(Clone)]
pub struct TransitGuard {
	store: Arc<dyn OptionStore>,
}
impl TransitGuard {
	/// Wraps the shared option store.
	pub fn new(store: Arc<dyn OptionStore>) -> Self {
		Self { store }
	}

	/// Storage key holding the transit token of `scope`.
	pub fn key(scope: Scope) -> String {
		scope.option_key(TRANSIT_OPTION)
	}

	/// Returns the live token for `scope`, generating and persisting one when none exists.
	///
	/// Repeated calls return the same value until [`rotate`](Self::rotate) runs.
	pub async fn issue(&self, scope: Scope) -> Result<Secret> {
		let key = Self::key(scope);

		if let Some(existing) =
			self.store.fetch_as::<Secret>(&key).await?.filter(|token| !token.is_empty())
		{
			return Ok(existing);
		}

		let token = generate_token();

		self.store.save_as(&key, &token).await?;

		Ok(token)
	}

	/// Compares `candidate` against the stored token in constant time.
	///
	/// Returns false for an empty candidate, a missing token, or an unreadable store.
	pub async fn validate(&self, scope: Scope, candidate: &str) -> bool {
		if candidate.is_empty() {
			return false;
		}

		let stored = match self.store.fetch_as::<Secret>(&Self::key(scope)).await {
			Ok(Some(stored)) if !stored.is_empty() => stored,
			_ => return false,
		};

		stored.expose().as_bytes().ct_eq(candidate.as_bytes()).into()
	}

	/// Replaces the token of `scope` with a fresh value and returns it.
	pub async fn rotate(&self, scope: Scope) -> Result<Secret> {
		let token = generate_token();

		self.store.save_as(&Self::key(scope), &token).await?;

		Ok(token)
	}
}
impl Debug for TransitGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TransitGuard(..)")
	}
}

fn generate_token() -> Secret {
	let seed: String =
		rand::rng().sample_iter(Alphanumeric).take(SEED_LEN).map(char::from).collect();
	let digest = Sha256::digest(seed.as_bytes());

	Secret::new(URL_SAFE_NO_PAD.encode(digest))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	fn guard() -> (TransitGuard, Arc<MemoryStore>) {
		let backend = Arc::new(MemoryStore::default());

		(TransitGuard::new(backend.clone()), backend)
	}

	#[tokio::test]
	async fn issue_is_idempotent_until_rotation() {
		let (guard, _) = guard();
		let first = guard.issue(Scope::Site).await.expect("Issue should succeed.");
		let second = guard.issue(Scope::Site).await.expect("Second issue should succeed.");

		assert_eq!(first, second);
		// SHA-256 digest encoded without padding.
		assert_eq!(first.expose().len(), 43);

		let rotated = guard.rotate(Scope::Site).await.expect("Rotation should succeed.");

		assert_ne!(rotated, first);
		assert!(!guard.validate(Scope::Site, first.expose()).await);
		assert!(guard.validate(Scope::Site, rotated.expose()).await);
	}

	#[tokio::test]
	async fn validation_rejects_empty_missing_and_foreign_tokens() {
		let (guard, _) = guard();

		assert!(!guard.validate(Scope::Site, "anything").await);

		let site = guard.issue(Scope::Site).await.expect("Issue should succeed.");
		let network = guard.issue(Scope::Network).await.expect("Issue should succeed.");

		assert!(!guard.validate(Scope::Site, "").await);
		assert!(!guard.validate(Scope::Network, site.expose()).await);
		assert!(guard.validate(Scope::Network, network.expose()).await);
	}

	#[tokio::test]
	async fn undecodable_token_fails_closed() {
		let (guard, backend) = guard();

		backend
			.save(&TransitGuard::key(Scope::Site), serde_json::json!({ "unexpected": true }))
			.await
			.expect("Direct write should succeed.");

		assert!(!guard.validate(Scope::Site, "token").await);
	}
}
