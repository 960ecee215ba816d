//! Optimistic concurrency primitives for records mutated by read-modify-write.

use crate::error::{DomainError, DomainResult};

/// A record whose durable writes are tracked by a monotonically increasing version.
///
/// Every successful save bumps the version by one, so a writer that read version `n`
/// can make its write conditional on the stored record still being at `n`.
pub trait Versioned {
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a conditional write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (seeding, migrations).
    Any,
    /// Require the stored record to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn of<V: Versioned>(record: &V) -> Self {
        ExpectedVersion::Exact(record.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
