use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};

/// Part of total usage taken by one app, in percent.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct UsageShare(f64);

impl UsageShare {
    pub const NONE: UsageShare = UsageShare(0.);

    /// Rejects negative, NaN and infinite values.
    pub fn from_percent(percent: f64) -> Option<UsageShare> {
        (percent.is_finite() && percent >= 0.).then_some(UsageShare(percent))
    }

    /// Share of `part_ms` in `whole_ms`. Nothing used means no share.
    pub fn of(part_ms: u64, whole_ms: u64) -> UsageShare {
        if whole_ms == 0 {
            return UsageShare::NONE;
        }
        UsageShare(part_ms as f64 / whole_ms as f64 * 100.)
    }

    pub fn percent(self) -> f64 {
        self.0
    }

    /// Truncated, as shown in tables.
    pub fn whole_percent(self) -> u32 {
        self.0 as u32
    }
}

impl Display for UsageShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for UsageShare {
    type Err = anyhow::Error;

    /// Accepts `5`, `5%` and `12.5%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s.trim().trim_end_matches('%');
        let percent = number
            .parse::<f64>()
            .with_context(|| format!("{s} is not a number"))?;
        UsageShare::from_percent(percent)
            .ok_or_else(|| anyhow!("{s} is not a valid share, expected a non-negative percentage"))
    }
}
