//! Password checks with coalesced verification
//!
//! Verifying a password means re-deriving an iterated SHA-256 digest, which
//! is deliberately slow. Identical concurrent checks (same user, same
//! presented password) share one derivation through a `KeyedCoalescer`.
//! Outcomes are not remembered once the check completes.

use crate::coalesce::KeyedCoalescer;
use crate::error::{HerdError, HerdResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Stored salted digest for one user
#[derive(Debug, Clone)]
struct StoredCredential {
    salt: String,
    digest: String,
}

/// Verifies user passwords against salted, iterated digests
pub struct CredentialVerifier {
    users: Arc<RwLock<HashMap<String, StoredCredential>>>,
    coalescer: KeyedCoalescer<bool>,
    rounds: u32,
    /// Derivations run on behalf of `verify`
    derivations: Arc<AtomicU64>,
}

impl CredentialVerifier {
    /// Create a verifier deriving digests with `rounds` SHA-256 iterations
    pub fn new(coalescer: KeyedCoalescer<bool>, rounds: u32) -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            coalescer,
            rounds: rounds.max(1),
            derivations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register or replace the password for `user`
    pub async fn register(&self, user: &str, password: &str) -> HerdResult<()> {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = derive_blocking(salt.clone(), password.to_string(), self.rounds).await?;

        self.users
            .write()
            .await
            .insert(user.to_string(), StoredCredential { salt, digest });
        debug!("Registered credentials for {}", user);
        Ok(())
    }

    /// Check `password` for `user`
    ///
    /// Returns `NotFound` for an unknown user and `Ok(false)` for a wrong
    /// password.
    pub async fn verify(&self, user: &str, password: &str) -> HerdResult<bool> {
        // The key must not reveal the password, only tell attempts apart.
        let key = format!("{}:{}", user, hex::encode(Sha256::digest(password.as_bytes())));

        let users = Arc::clone(&self.users);
        let user = user.to_string();
        let password = password.to_string();
        let rounds = self.rounds;
        let derivations = Arc::clone(&self.derivations);

        self.coalescer
            .run(&key, move || async move {
                let stored = users
                    .read()
                    .await
                    .get(&user)
                    .cloned()
                    .ok_or_else(|| HerdError::not_found(user.clone()))?;

                derivations.fetch_add(1, Ordering::Relaxed);
                let presented = derive_blocking(stored.salt, password, rounds).await?;
                Ok::<_, HerdError>(constant_time_eq(
                    presented.as_bytes(),
                    stored.digest.as_bytes(),
                ))
            })
            .await
    }

    /// Number of digest derivations `verify` has started
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }

    pub fn coalescer(&self) -> &KeyedCoalescer<bool> {
        &self.coalescer
    }
}

/// Run the digest derivation off the async worker threads
async fn derive_blocking(salt: String, password: String, rounds: u32) -> HerdResult<String> {
    tokio::task::spawn_blocking(move || derive(&salt, &password, rounds))
        .await
        .map_err(|e| HerdError::Internal(format!("Digest task failed: {}", e)))
}

fn derive(salt: &str, password: &str, rounds: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut digest = hasher.finalize();

    for _ in 1..rounds {
        let mut hasher = Sha256::new();
        hasher.update(digest);
        hasher.update(salt.as_bytes());
        digest = hasher.finalize();
    }

    hex::encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
