//! Bar frequency and period type definitions.
//!
//! This module defines [`DataFrequency`] for specifying the granularity of bar series
//! and [`PeriodType`] for fundamental data periods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frequency/granularity of bar series.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFrequency {
    /// One-minute bars.
    Minute,
    /// Five-minute bars.
    FiveMinute,
    /// Fifteen-minute bars.
    FifteenMinute,
    /// Thirty-minute bars.
    ThirtyMinute,
    /// Hourly bars.
    Hourly,
    /// Daily bars.
    Daily,
    /// Weekly bars.
    Weekly,
    /// Monthly bars.
    Monthly,
}

impl DataFrequency {
    /// Returns true if this is an intraday frequency (minute through hourly).
    #[must_use]
    pub const fn is_intraday(&self) -> bool {
        matches!(
            self,
            Self::Minute | Self::FiveMinute | Self::FifteenMinute | Self::ThirtyMinute | Self::Hourly
        )
    }

    /// Stable lowercase name, used in cache keys and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::FiveMinute => "five_minute",
            Self::FifteenMinute => "fifteen_minute",
            Self::ThirtyMinute => "thirty_minute",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for DataFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Period type for fundamental financial data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeriodType {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

impl PeriodType {
    /// Fourth-quarter reports are the annual report on mainland exchanges.
    #[must_use]
    pub const fn for_quarter(quarter: u8) -> Self {
        if quarter == 4 {
            Self::Annual
        } else {
            Self::Quarterly
        }
    }
}
