//! Random identifiers and passwords.

use rand::distributions::{Alphanumeric, DistString};

/// Source of fixed-length random strings.
pub trait SecretSource: Send + Sync {
    /// Returns `length` characters drawn from `[A-Za-z0-9]`.
    fn generate(&self, length: usize) -> String;
}

/// Thread-local CSPRNG backed generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSecretGenerator;

impl SecretSource for RandomSecretGenerator {
    fn generate(&self, length: usize) -> String {
        Alphanumeric.sample_string(&mut rand::thread_rng(), length)
    }
}
