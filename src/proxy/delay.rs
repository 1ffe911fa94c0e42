//! The `delay` query parameter shared by the relay and the slow upstream.

use std::fmt;
use std::time::Duration;

use crate::error::ForwardError;

/// Seconds used when `delay` is absent or empty.
pub const DEFAULT_DELAY_SECS: f64 = 1.0;

/// A validated, finite, non-negative number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Delay(f64);

impl Default for Delay {
    fn default() -> Self {
        Self(DEFAULT_DELAY_SECS)
    }
}

impl Delay {
    /// Parse the raw query value. `None` and blank strings yield the default.
    pub fn parse(raw: Option<&str>) -> Result<Self, ForwardError> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::default());
        };

        let invalid = |reason| ForwardError::InvalidParameter {
            value: raw.to_string(),
            reason,
        };

        let secs: f64 = raw.parse().map_err(|_| invalid("not a number"))?;
        if !secs.is_finite() {
            return Err(invalid("must be a finite number of seconds"));
        }
        if secs < 0.0 {
            return Err(invalid("must not be negative"));
        }
        if Duration::try_from_secs_f64(secs).is_err() {
            return Err(invalid("out of range"));
        }
        // -0 parses fine but would be echoed upstream as "-0"
        if secs == 0.0 {
            return Ok(Self(0.0));
        }
        Ok(Self(secs))
    }

    /// Extract and parse `delay` from a raw (still percent-encoded) query string.
    pub fn from_query(query: Option<&str>) -> Result<Self, ForwardError> {
        let value = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == "delay")
                .map(|(_, value)| value.into_owned())
        });
        Self::parse(value.as_deref())
    }

    #[must_use]
    pub const fn as_secs_f64(self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn as_duration(self) -> Duration {
        // Range was checked in `parse`.
        Duration::try_from_secs_f64(self.0).unwrap_or(Duration::MAX)
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
