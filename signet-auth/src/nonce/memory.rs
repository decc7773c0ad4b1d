use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{ChallengeNonce, NonceError, NonceStore};

/// How long a client has to answer a challenge.
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(120);

struct PendingChallenge {
    nonce: ChallengeNonce,
    issued_at: Instant,
}

/// In-process nonce store.
///
/// # Concurrency
///
/// Backed by a `DashMap`: `issue` is an insert and `consume` a remove, each
/// performed under the identity's shard lock. No lock is held once `consume`
/// returns, so signature checks never block other identities.
///
/// # Memory
///
/// Abandoned challenges linger until `consume` or `cleanup_expired` sees
/// them. Callers should reap periodically.
pub struct MemoryNonceStore {
    pending: DashMap<String, PendingChallenge>,
    ttl: Duration,
}

impl MemoryNonceStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every expired challenge. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| pending.issued_at.elapsed() < self.ttl);
        before.saturating_sub(self.pending.len())
    }

    /// Number of outstanding challenges, expired ones included.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_TTL)
    }
}

impl NonceStore for MemoryNonceStore {
    fn issue(&self, identity: &str) -> ChallengeNonce {
        let nonce = ChallengeNonce::generate();
        self.pending.insert(
            identity.to_owned(),
            PendingChallenge {
                nonce: nonce.clone(),
                issued_at: Instant::now(),
            },
        );
        nonce
    }

    fn consume(&self, identity: &str) -> Result<ChallengeNonce, NonceError> {
        let (_, pending) = self.pending.remove(identity).ok_or(NonceError::NotFound)?;
        if pending.issued_at.elapsed() >= self.ttl {
            return Err(NonceError::Expired);
        }
        Ok(pending.nonce)
    }
}
