//! Time utilities and constants for mockva.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{MockvaError, Result};

/// Timing constants.
pub mod constants {
    use std::time::Duration;

    /// Default bound on a whole transfer, lock waits included (10 seconds).
    pub fn default_transfer_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse an ISO `YYYY-MM-DD` birth date.
pub fn parse_birth_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| MockvaError::invalid(format!("invalid date format {value}")))
}
