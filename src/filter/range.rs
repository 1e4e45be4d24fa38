//! Single [min, max] numeric bound
//!
//! The unit every other filter check composes. An unset range (both
//! bounds absent) is the absence of a constraint, which is distinct
//! from a failing check.

use serde::{Deserialize, Serialize};

/// Optional numeric bound. `None`/`None` means "not configured".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Outcome of checking one value against one range
#[derive(Debug, Clone, PartialEq)]
pub enum RangeCheck {
    /// Range not configured, value irrelevant
    Unset,
    /// Value within bounds (boundary values pass)
    Pass,
    /// Value missing or out of bounds, with the diagnostic reason
    Fail(String),
}

impl RangeCheck {
    pub fn passed(&self) -> bool {
        !matches!(self, RangeCheck::Fail(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            RangeCheck::Fail(reason) => Some(reason),
            _ => None,
        }
    }
}

impl FilterRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// True iff at least one bound is configured
    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Check a value against this range. Pure function; the reason
    /// strings ("missing", "< {min}", "> {max}") are part of the
    /// user-facing rejection message format.
    pub fn check(&self, value: Option<f64>) -> RangeCheck {
        if !self.is_set() {
            return RangeCheck::Unset;
        }
        let Some(value) = value else {
            return RangeCheck::Fail("missing".to_string());
        };
        if let Some(min) = self.min {
            if value < min {
                return RangeCheck::Fail(format!("< {}", min));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return RangeCheck::Fail(format!("> {}", max));
            }
        }
        RangeCheck::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_always_passes() {
        let r = FilterRange::default();
        assert!(!r.is_set());
        assert_eq!(r.check(Some(42.0)), RangeCheck::Unset);
        assert_eq!(r.check(Some(-1e18)), RangeCheck::Unset);
        assert_eq!(r.check(None), RangeCheck::Unset);
    }

    #[test]
    fn test_missing_value_fails_when_set() {
        let r = FilterRange::new(Some(10.0), None);
        assert_eq!(r.check(None), RangeCheck::Fail("missing".to_string()));
    }

    #[test]
    fn test_below_min() {
        let r = FilterRange::new(Some(200.0), None);
        assert_eq!(r.check(Some(120.0)), RangeCheck::Fail("< 200".to_string()));
    }

    #[test]
    fn test_above_max() {
        let r = FilterRange::new(None, Some(0.3));
        assert_eq!(r.check(Some(0.55)), RangeCheck::Fail("> 0.3".to_string()));
    }

    #[test]
    fn test_boundary_values_pass() {
        let r = FilterRange::new(Some(10.0), Some(100.0));
        assert_eq!(r.check(Some(10.0)), RangeCheck::Pass);
        assert_eq!(r.check(Some(100.0)), RangeCheck::Pass);
        assert_eq!(r.check(Some(50.0)), RangeCheck::Pass);
    }

    #[test]
    fn test_min_only_and_max_only() {
        let min_only = FilterRange::new(Some(5.0), None);
        assert_eq!(min_only.check(Some(1e12)), RangeCheck::Pass);

        let max_only = FilterRange::new(None, Some(5.0));
        assert_eq!(max_only.check(Some(-1e12)), RangeCheck::Pass);
    }

    #[test]
    fn test_serde_roundtrip() {
        let r = FilterRange::new(Some(1.0), None);
        let json = serde_json::to_string(&r).unwrap();
        let back: FilterRange = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);

        // empty object deserializes as unset
        let empty: FilterRange = serde_json::from_str("{}").unwrap();
        assert!(!empty.is_set());
    }
}
