//! Identity allocation: fresh user ids and auto-generated display names.
//!
//! Draws are random, but each candidate is checked against the live session
//! registry and redrawn on collision. The retry loop is bounded so an
//! exhausted namespace surfaces as an error instead of spinning forever.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::chat::registry::SessionRegistry;
use crate::error::ChatError;

/// Prefix of every auto-generated display name.
pub const NAME_PREFIX: &str = "User";

/// Number of random uppercase letters after the prefix.
pub const NAME_SUFFIX_LEN: usize = 6;

/// Default retry budget for a single allocation.
pub const DEFAULT_MAX_ATTEMPTS: usize = 64;

pub struct IdentityAllocator {
    rng: StdRng,
    max_attempts: usize,
}

impl IdentityAllocator {
    /// Allocator seeded from the operating system.
    pub fn new(max_attempts: usize) -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            max_attempts,
        }
    }

    /// Deterministic allocator for tests.
    pub fn seeded(seed: u64, max_attempts: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_attempts,
        }
    }

    /// Produce a random UUID not held by any active session.
    pub fn new_id(&mut self, registry: &SessionRegistry) -> Result<String, ChatError> {
        for _ in 0..self.max_attempts {
            let bytes: [u8; 16] = self.rng.random();
            let candidate = uuid::Builder::from_random_bytes(bytes)
                .into_uuid()
                .to_string();
            if !registry.is_id_active(&candidate) {
                return Ok(candidate);
            }
            tracing::debug!(candidate = %candidate, "Generated id collided, redrawing");
        }
        Err(ChatError::NamespaceExhausted {
            kind: "id",
            attempts: self.max_attempts,
        })
    }

    /// Produce a `User` + six uppercase letters name not held by any active session.
    pub fn new_display_name(&mut self, registry: &SessionRegistry) -> Result<String, ChatError> {
        for _ in 0..self.max_attempts {
            let candidate = self.random_name();
            if !registry.is_name_active(&candidate) {
                return Ok(candidate);
            }
            tracing::debug!(candidate = %candidate, "Generated name collided, redrawing");
        }
        Err(ChatError::NamespaceExhausted {
            kind: "display name",
            attempts: self.max_attempts,
        })
    }

    fn random_name(&mut self) -> String {
        let mut name = String::with_capacity(NAME_PREFIX.len() + NAME_SUFFIX_LEN);
        name.push_str(NAME_PREFIX);
        for _ in 0..NAME_SUFFIX_LEN {
            name.push(char::from(b'A' + self.rng.random_range(0..26u8)));
        }
        name
    }
}
