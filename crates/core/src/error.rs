//! Error types raised at the synchronisation boundary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

use crate::models::GameId;

/// Contract violations found in an otherwise well-formed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload carried an empty data hash.
    #[error("data hash is empty")]
    EmptyHash,
    /// `fetched_at` is later than `next_refresh_at`.
    #[error("fetched_at {fetched_at} is after next_refresh_at {next_refresh_at}")]
    RefreshWindow {
        /// When the server produced the payload.
        fetched_at: DateTime<Utc>,
        /// When the server plans its next refresh.
        next_refresh_at: DateTime<Utc>,
    },
    /// A banner does not start before it ends.
    #[error("banner `{id}` starts at {start}, not before its end {end}")]
    BannerWindow {
        /// Banner id.
        id: String,
        /// Declared start.
        start: DateTime<Utc>,
        /// Declared end.
        end: DateTime<Utc>,
    },
    /// A version phase number other than 1 or 2.
    #[error("version phase `{id}` has phase number {phase}")]
    PhaseNumber {
        /// Phase id.
        id: String,
        /// The rejected phase number.
        phase: u8,
    },
    /// A version phase does not start before it ends.
    #[error("version phase `{id}` starts at {start}, not before its end {end}")]
    PhaseWindow {
        /// Phase id.
        id: String,
        /// Declared start.
        start: DateTime<Utc>,
        /// Declared end.
        end: DateTime<Utc>,
    },
    /// A versions listing contained a phase of another game.
    #[error("version phase `{id}` belongs to {found}, expected {expected}")]
    ForeignPhase {
        /// Phase id.
        id: String,
        /// Game the listing was requested for.
        expected: GameId,
        /// Game the phase claims.
        found: GameId,
    },
    /// Two phases of the same game overlap in time.
    #[error("version phases `{newer}` and `{older}` overlap")]
    PhaseOverlap {
        /// Id of the later phase.
        newer: String,
        /// Id of the earlier phase.
        older: String,
    },
}

/// Failure of a single fetch attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request could not be sent or the body could not be read.
    #[error("request to `{url}` failed")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The attempt exceeded its time budget.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// The exceeded budget.
        timeout: Duration,
    },
    /// The server answered with a non-success status.
    #[error("unexpected response status {status} from `{url}`")]
    Status {
        /// Requested URL.
        url: String,
        /// Status the server returned.
        status: StatusCode,
    },
    /// The payload could not be parsed or broke the data contract.
    #[error("malformed {origin}: {reason}")]
    Malformed {
        /// Which payload was being read, such as `banners`.
        origin: String,
        /// Parse or validation failure.
        reason: String,
    },
}

impl FetchError {
    /// Build a [`FetchError::Malformed`] for the given payload origin.
    pub fn malformed(origin: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::Malformed {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is a network-level condition rather than bad data.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Malformed { .. })
    }
}

impl From<ValidationError> for FetchError {
    fn from(err: ValidationError) -> Self {
        FetchError::malformed("payload", err)
    }
}
