use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fmt;

use crate::error::{Result, SatlevelError};

/// Compact acquisition timestamp used in product identifiers, e.g. `20240921T104629`
const PRODUCT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
/// Position of the acquisition timestamp among the `_`-separated tokens
const TIMESTAMP_TOKEN: usize = 2;
const ISO_SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Time interval `[start, end]` used to filter observations.
/// Renders as the ISO-8601 interval `start/end` with `Z`-suffixed seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl AcquisitionWindow {
    /// Half-width of the window derived from a product identifier
    pub fn default_half_width() -> Duration {
        Duration::hours(1)
    }

    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            AcquisitionWindow { start, end }
        } else {
            AcquisitionWindow {
                start: end,
                end: start,
            }
        }
    }

    /// `[instant - half_width, instant + half_width]`
    pub fn around(instant: DateTime<Utc>, half_width: Duration) -> Self {
        AcquisitionWindow::new(instant - half_width, instant + half_width)
    }

    /// Derive a ±1 h window from a product identifier such as
    /// `S2B_MSIL2A_20240921T104629_N0511_R051_T32UMG_20240921T135519`.
    ///
    /// Only the third token is inspected; the rest of the identifier is not validated.
    pub fn from_product_id(identifier: &str) -> Result<Self> {
        let token = identifier.split('_').nth(TIMESTAMP_TOKEN).ok_or_else(|| {
            SatlevelError::FilenameFormat {
                identifier: identifier.to_string(),
                reason: format!(
                    "expected at least {} underscore-delimited tokens",
                    TIMESTAMP_TOKEN + 1
                ),
            }
        })?;

        let acquired = NaiveDateTime::parse_from_str(token, PRODUCT_TIMESTAMP_FORMAT)
            .map_err(|e| SatlevelError::FilenameFormat {
                identifier: identifier.to_string(),
                reason: format!("`{}` is not a YYYYMMDDTHHMMSS timestamp: {}", token, e),
            })?
            .and_utc();

        Ok(AcquisitionWindow::around(
            acquired,
            AcquisitionWindow::default_half_width(),
        ))
    }

    /// Parse an explicit `start/end` interval of RFC 3339 instants
    pub fn parse(interval: &str) -> Result<Self> {
        let invalid = |reason: String| SatlevelError::TimeWindow {
            value: interval.to_string(),
            reason,
        };

        let (start, end) = interval
            .split_once('/')
            .ok_or_else(|| invalid("expected `start/end`".to_string()))?;
        let start = DateTime::parse_from_rfc3339(start.trim())
            .map_err(|e| invalid(format!("bad start: {}", e)))?;
        let end = DateTime::parse_from_rfc3339(end.trim())
            .map_err(|e| invalid(format!("bad end: {}", e)))?;

        Ok(AcquisitionWindow::new(
            start.with_timezone(&Utc),
            end.with_timezone(&Utc),
        ))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

impl fmt::Display for AcquisitionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.start.format(ISO_SECONDS_FORMAT),
            self.end.format(ISO_SECONDS_FORMAT)
        )
    }
}
