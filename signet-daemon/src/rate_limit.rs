//! Rate limiting for the unauthenticated `/auth` routes.
//!
//! Budgets are kept per client IP so one noisy peer cannot lock everyone
//! else out of login. Requests without a known peer address share one
//! bucket.

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::api::ApiError;

const FALLBACK_PER_SECOND: NonZeroU32 = match NonZeroU32::new(2) {
    Some(n) => n,
    None => unreachable!(),
};
const FALLBACK_BURST: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => unreachable!(),
};

/// Bucket for requests whose peer address is unknown.
const UNKNOWN_PEER: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

type PeerLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Per-peer limiter for `/auth` requests. Clones share state.
#[derive(Clone)]
pub struct AuthRateLimiter {
    peers: Arc<PeerLimiter>,
}

impl AuthRateLimiter {
    /// `per_second` sustained and `burst` at once, per peer. Zero selects
    /// the defaults (2 and 10).
    pub fn new(per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(FALLBACK_PER_SECOND))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(FALLBACK_BURST));
        Self {
            peers: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Spend one unit of `peer`'s budget.
    pub fn check(&self, peer: Option<IpAddr>) -> Result<(), ApiError> {
        let peer = peer.unwrap_or(UNKNOWN_PEER);
        self.peers.check_key(&peer).map_err(|_| {
            tracing::warn!(%peer, "Auth rate limit exceeded");
            ApiError::RateLimited
        })
    }

    /// Forget peers whose budget has fully refilled.
    pub fn prune(&self) {
        self.peers.retain_recent();
        self.peers.shrink_to_fit();
    }

    /// Number of peers currently tracked.
    pub fn tracked_peers(&self) -> usize {
        self.peers.len()
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new(0, 0)
    }
}
