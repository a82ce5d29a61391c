//! Identifier and validated scalar types for the release domain.

use super::TaskDomainError;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable, unique identity of a deployment task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskKey(String);

impl TaskKey {
    /// Creates a task key from an existing value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Creates a new random task key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for TaskKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-based position of a task within its release sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DeployOrder(u32);

impl DeployOrder {
    /// Creates a validated deploy order.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidDeployOrder`] when the value is zero.
    pub fn new(value: u32) -> Result<Self, TaskDomainError> {
        if value == 0 {
            return Err(TaskDomainError::InvalidDeployOrder(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Builds the order for a one-based rank.
    pub(crate) fn from_rank(rank: usize) -> Self {
        Self(u32::try_from(rank).unwrap_or(u32::MAX).max(1))
    }

    /// Parses operator input.
    ///
    /// Returns `Ok(None)` when the trimmed input is empty.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidDeployOrder`] when the input is not
    /// an integer greater than or equal to one.
    pub fn parse(input: &str) -> Result<Option<Self>, TaskDomainError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let is_digits = trimmed.chars().all(|ch| ch.is_ascii_digit());
        let value = trimmed
            .parse::<u32>()
            .ok()
            .filter(|_| is_digits)
            .ok_or_else(|| TaskDomainError::InvalidDeployOrder(trimmed.to_owned()))?;
        Self::new(value)
            .map(Some)
            .map_err(|_| TaskDomainError::InvalidDeployOrder(trimmed.to_owned()))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for DeployOrder {
    type Error = TaskDomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeployOrder> for u32 {
    fn from(order: DeployOrder) -> Self {
        order.0
    }
}

impl fmt::Display for DeployOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by every member of a release batch.
///
/// The legacy sentinel `"0"` (and the empty string) denote the ungrouped
/// pseudo-batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchKey(String);

impl BatchKey {
    const UNGROUPED: &'static str = "0";
    const SUFFIX_LEN: usize = 9;
    const SUFFIX_ALPHABET: &'static [u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    /// Creates a batch key from an existing value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the sentinel key of the ungrouped pseudo-batch.
    #[must_use]
    pub fn ungrouped() -> Self {
        Self(Self::UNGROUPED.to_owned())
    }

    /// Generates a key in the form `BATCH-<epoch-ms>-<random>`.
    ///
    /// Uniqueness is probabilistic: two keys collide only when they share a
    /// millisecond and a random suffix.
    #[must_use]
    pub fn generate(now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let suffix: String = (0..Self::SUFFIX_LEN)
            .filter_map(|_| {
                let index = rng.gen_range(0..Self::SUFFIX_ALPHABET.len());
                Self::SUFFIX_ALPHABET.get(index).map(|byte| char::from(*byte))
            })
            .collect();
        Self(format!("BATCH-{}-{suffix}", now.timestamp_millis()))
    }

    /// Returns `true` for the ungrouped sentinel.
    #[must_use]
    pub fn is_ungrouped(&self) -> bool {
        let trimmed = self.0.trim();
        trimmed.is_empty() || trimmed == Self::UNGROUPED
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BatchKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
