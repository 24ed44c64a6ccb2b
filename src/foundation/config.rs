use std::time::Duration;

use crate::foundation::error::{PixelsError, PixelsResult};

/// Largest payload a single `BulkData` message may carry (its size field is one byte).
pub const MAX_CHUNK_SIZE: usize = u8::MAX as usize;

/// Timing and sizing knobs for die operations.
///
/// Durations are stored as milliseconds so the struct reads naturally from JSON.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TransferOpts {
    /// Payload bytes per `BulkData` message.
    pub chunk_max: usize,
    /// Wait window for each attempt of an acknowledged message.
    pub ack_timeout_ms: u64,
    /// Attempts per acknowledged message before giving up.
    pub max_attempts: u32,
    /// Single, unretried wait for the dataset accept/reject handshake.
    pub accept_timeout_ms: u64,
    /// Wait for the die's "transfer finished" signal. `None` waits forever.
    pub finished_timeout_ms: Option<u64>,
    /// Wait for replies to identification and status queries.
    pub query_timeout_ms: u64,
}

impl Default for TransferOpts {
    fn default() -> Self {
        Self {
            chunk_max: 100,
            ack_timeout_ms: 500,
            max_attempts: 3,
            accept_timeout_ms: 3_000,
            finished_timeout_ms: Some(10_000),
            query_timeout_ms: 5_000,
        }
    }
}

impl TransferOpts {
    /// Check that the options describe a usable transfer.
    pub fn validate(&self) -> PixelsResult<()> {
        if self.chunk_max == 0 || self.chunk_max > MAX_CHUNK_SIZE {
            return Err(PixelsError::validation(format!(
                "chunk_max must be in 1..={MAX_CHUNK_SIZE}, got {}",
                self.chunk_max
            )));
        }
        if self.max_attempts == 0 {
            return Err(PixelsError::validation("max_attempts must be >= 1"));
        }
        if self.ack_timeout_ms == 0 {
            return Err(PixelsError::validation("ack_timeout_ms must be > 0"));
        }
        Ok(())
    }

    pub(crate) fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub(crate) fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub(crate) fn finished_timeout(&self) -> Option<Duration> {
        self.finished_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/config.rs"]
mod tests;
