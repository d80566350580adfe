//! Traffic-budget parsing and byte/rate display formatting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One mebibyte.
pub const MIB: u64 = 1 << 20;
/// One gibibyte.
pub const GIB: u64 = 1 << 30;
/// One tebibyte.
pub const TIB: u64 = 1 << 40;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BudgetParseError {
    #[error("budget value must be a positive number, got '{0}'")]
    InvalidValue(String),

    #[error("unknown traffic unit '{0}' (expected MB, GB or TB)")]
    InvalidUnit(String),
}

// ---------------------------------------------------------------------------
// TrafficUnit
// ---------------------------------------------------------------------------

/// Unit selector for the traffic budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrafficUnit {
    Mb,
    Gb,
    Tb,
}

impl TrafficUnit {
    /// Number of bytes in one unit.
    pub fn bytes(&self) -> u64 {
        match self {
            TrafficUnit::Mb => MIB,
            TrafficUnit::Gb => GIB,
            TrafficUnit::Tb => TIB,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrafficUnit::Mb => "MB",
            TrafficUnit::Gb => "GB",
            TrafficUnit::Tb => "TB",
        }
    }
}

impl FromStr for TrafficUnit {
    type Err = BudgetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MB" => Ok(TrafficUnit::Mb),
            "GB" => Ok(TrafficUnit::Gb),
            "TB" => Ok(TrafficUnit::Tb),
            other => Err(BudgetParseError::InvalidUnit(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// A traffic budget: positive decimal value plus a unit, e.g. "500MB".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    pub value: f64,
    pub unit: TrafficUnit,
}

impl Budget {
    /// Budget in bytes, always at least 1.
    pub fn to_bytes(&self) -> u64 {
        ((self.value * self.unit.bytes() as f64) as u64).max(1)
    }
}

impl FromStr for Budget {
    type Err = BudgetParseError;

    /// Parse strings like "500MB", "1.5 GB", "1tb".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(s.len());
        let (value_str, unit_str) = s.split_at(split);

        let value: f64 = value_str
            .parse()
            .map_err(|_| BudgetParseError::InvalidValue(s.to_string()))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(BudgetParseError::InvalidValue(s.to_string()));
        }

        let unit: TrafficUnit = unit_str.parse()?;
        Ok(Budget { value, unit })
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.label())
    }
}

// ---------------------------------------------------------------------------
// Display formatting
// ---------------------------------------------------------------------------

/// Format a byte total with an auto-scaled unit.
///
/// The display floor is MB; the unit steps up at exactly 1024 of the previous
/// one, so the shown magnitude stays below 1024 in the largest unit up to TB.
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64 / MIB as f64;
    let mut unit = "MB";
    if value >= 1024.0 {
        value /= 1024.0;
        unit = "GB";
    }
    if value >= 1024.0 {
        value /= 1024.0;
        unit = "TB";
    }
    format!("{value:.2} {unit}")
}

/// Format a throughput in MB/s (the speed display is never auto-scaled).
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{:.2} MB/s", bytes_per_sec / MIB as f64)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_exact_units() {
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
        assert_eq!(format_bytes(TIB), "1.00 TB");
    }

    #[test]
    fn test_format_bytes_step_up_boundary() {
        // 1023.99 MB stays in MB; exactly 1024.00 MB becomes 1.00 GB.
        let just_below = (1023.99 * MIB as f64) as u64;
        assert_eq!(format_bytes(just_below), "1023.99 MB");
        assert_eq!(format_bytes(1024 * MIB), "1.00 GB");

        let just_below_tb = (1023.99 * GIB as f64) as u64;
        assert_eq!(format_bytes(just_below_tb), "1023.99 GB");
        assert_eq!(format_bytes(1024 * GIB), "1.00 TB");
    }

    #[test]
    fn test_format_bytes_sub_megabyte() {
        assert_eq!(format_bytes(0), "0.00 MB");
        assert_eq!(format_bytes(524_288), "0.50 MB");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(1_048_576.0), "1.00 MB/s");
        assert_eq!(format_rate(0.0), "0.00 MB/s");
    }

    #[test]
    fn test_parse_budget_variants() {
        let b: Budget = "500MB".parse().unwrap();
        assert_eq!(b.unit, TrafficUnit::Mb);
        assert_eq!(b.to_bytes(), 500 * MIB);

        let b: Budget = "1.5 GB".parse().unwrap();
        assert_eq!(b.unit, TrafficUnit::Gb);
        assert_eq!(b.to_bytes(), (1.5 * GIB as f64) as u64);

        let b: Budget = "2tb".parse().unwrap();
        assert_eq!(b.unit, TrafficUnit::Tb);
        assert_eq!(b.to_bytes(), 2 * TIB);
    }

    #[test]
    fn test_parse_budget_rejects_non_positive() {
        assert!(matches!(
            "0MB".parse::<Budget>(),
            Err(BudgetParseError::InvalidValue(_))
        ));
        assert!(matches!(
            "-5GB".parse::<Budget>(),
            Err(BudgetParseError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_parse_budget_rejects_garbage() {
        assert!(matches!(
            "MB".parse::<Budget>(),
            Err(BudgetParseError::InvalidValue(_))
        ));
        assert!(matches!(
            "12".parse::<Budget>(),
            Err(BudgetParseError::InvalidUnit(_))
        ));
        assert!(matches!(
            "12XB".parse::<Budget>(),
            Err(BudgetParseError::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_unit_serde_names() {
        assert_eq!(serde_json::to_string(&TrafficUnit::Gb).unwrap(), "\"GB\"");
        let u: TrafficUnit = serde_json::from_str("\"TB\"").unwrap();
        assert_eq!(u, TrafficUnit::Tb);
    }
}
