use serde::Serialize;
use tracing::warn;

use crate::error::{EngineError, Result};

pub const MIN_ISO_WEEK: u32 = 1;
pub const MAX_ISO_WEEK: u32 = 53;
/// Earliest year with daily weather coverage.
pub const MIN_SUPPORTED_YEAR: i32 = 2012;

/// Which dengue reporting weeks a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeekFilter {
    All,
    Single(u32),
    Range { from: u32, to: u32 },
}

impl WeekFilter {
    /// Builds a filter from the two optional request fields. They are mutually
    /// exclusive.
    pub fn from_parts(week: Option<u32>, range: Option<(u32, u32)>) -> Result<Self> {
        let filter = match (week, range) {
            (Some(_), Some(_)) => {
                warn!("both a week number and a week range were provided");
                return Err(EngineError::validation(
                    "specify either a single week number or a week range, not both",
                ));
            }
            (Some(week), None) => Self::Single(week),
            (None, Some((from, to))) => Self::Range { from, to },
            (None, None) => Self::All,
        };
        filter.validate()?;
        Ok(filter)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::All => Ok(()),
            Self::Single(week) => check_week(week),
            Self::Range { from, to } => {
                if !is_iso_week(from) || !is_iso_week(to) {
                    warn!(from, to, "week range out of bounds");
                    return Err(EngineError::validation(format!(
                        "week range boundaries must be between {MIN_ISO_WEEK} and {MAX_ISO_WEEK}"
                    )));
                }
                if from > to {
                    warn!(from, to, "week range start after end");
                    return Err(EngineError::validation(
                        "week range start must be less than or equal to the end",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Inclusive week bounds, used to build storage queries.
    pub fn bounds(&self) -> (u32, u32) {
        match *self {
            Self::All => (MIN_ISO_WEEK, MAX_ISO_WEEK),
            Self::Single(week) => (week, week),
            Self::Range { from, to } => (from, to),
        }
    }

    pub fn contains(&self, week: u32) -> bool {
        let (from, to) = self.bounds();
        (from..=to).contains(&week)
    }
}

fn is_iso_week(week: u32) -> bool {
    (MIN_ISO_WEEK..=MAX_ISO_WEEK).contains(&week)
}

fn check_week(week: u32) -> Result<()> {
    if is_iso_week(week) {
        Ok(())
    } else {
        warn!(week, "ISO week out of range");
        Err(EngineError::validation(format!(
            "ISO week must be between {MIN_ISO_WEEK} and {MAX_ISO_WEEK}, got {week}"
        )))
    }
}

/// PSGC codes are 9 digits (legacy) or 10 digits.
pub fn validate_area_code(area_code: &str) -> Result<()> {
    let valid = matches!(area_code.len(), 9 | 10) && area_code.bytes().all(|b| b.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        warn!(area_code, "malformed area code");
        Err(EngineError::validation(format!(
            "area code must be 9 or 10 digits, got {area_code:?}"
        )))
    }
}

/// Deduplicated, ascending years. An empty set is rejected.
pub fn normalize_years(years: &[i32]) -> Result<Vec<i32>> {
    if years.is_empty() {
        warn!("no years provided");
        return Err(EngineError::validation("at least one year must be provided"));
    }
    let mut years = years.to_vec();
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

/// Validated request for the snapshots of one area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub(crate) area_code: String,
    pub(crate) years: Vec<i32>,
    pub(crate) weeks: WeekFilter,
}

impl SnapshotQuery {
    pub fn new(area_code: impl Into<String>, years: &[i32], weeks: WeekFilter) -> Result<Self> {
        let area_code = area_code.into();
        validate_area_code(&area_code)?;
        weeks.validate()?;
        Ok(Self {
            area_code,
            years: normalize_years(years)?,
            weeks,
        })
    }

    pub fn area_code(&self) -> &str {
        &self.area_code
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn weeks(&self) -> WeekFilter {
        self.weeks
    }

    /// Re-checks every field, so a query assembled inside the crate without
    /// [`SnapshotQuery::new`] is still rejected before it reaches the store.
    pub fn validate(&self) -> Result<()> {
        validate_area_code(&self.area_code)?;
        self.weeks.validate()?;
        normalize_years(&self.years)?;
        Ok(())
    }
}

/// Checks for the live single-week path.
pub fn validate_single_week(area_code: &str, year: i32, week: u32) -> Result<()> {
    validate_area_code(area_code)?;
    check_week(week)?;
    if year < MIN_SUPPORTED_YEAR {
        warn!(year, "year before weather coverage");
        return Err(EngineError::validation(format!(
            "years before {MIN_SUPPORTED_YEAR} are not supported"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_and_range_are_exclusive() {
        let err = WeekFilter::from_parts(Some(3), Some((1, 10))).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn builds_each_filter_shape() {
        assert_eq!(WeekFilter::from_parts(None, None).unwrap(), WeekFilter::All);
        assert_eq!(WeekFilter::from_parts(Some(10), None).unwrap(), WeekFilter::Single(10));
        assert_eq!(
            WeekFilter::from_parts(None, Some((5, 9))).unwrap(),
            WeekFilter::Range { from: 5, to: 9 }
        );
    }

    #[test]
    fn rejects_out_of_range_weeks() {
        assert!(WeekFilter::from_parts(Some(0), None).is_err());
        assert!(WeekFilter::from_parts(Some(54), None).is_err());
        assert!(WeekFilter::from_parts(None, Some((0, 4))).is_err());
        assert!(WeekFilter::from_parts(None, Some((10, 4))).is_err());
    }

    #[test]
    fn bounds_and_contains() {
        assert_eq!(WeekFilter::All.bounds(), (1, 53));
        assert!(WeekFilter::Single(7).contains(7));
        assert!(!WeekFilter::Single(7).contains(8));
        assert!(WeekFilter::Range { from: 2, to: 4 }.contains(4));
    }

    #[test]
    fn area_codes_must_be_psgc_digits() {
        assert!(validate_area_code("097332001").is_ok());
        assert!(validate_area_code("0973320010").is_ok());
        assert!(validate_area_code("").is_err());
        assert!(validate_area_code("09733200A").is_err());
        assert!(validate_area_code("12345").is_err());
    }

    #[test]
    fn years_are_deduplicated_and_sorted() {
        assert_eq!(normalize_years(&[2023, 2021, 2023]).unwrap(), vec![2021, 2023]);
        assert!(normalize_years(&[]).is_err());
    }

    #[test]
    fn query_rejects_empty_years() {
        assert!(SnapshotQuery::new("097332001", &[], WeekFilter::All).is_err());
    }

    #[test]
    fn validate_catches_unchecked_fields() {
        let query = SnapshotQuery::new("097332001", &[2023, 2021], WeekFilter::Single(10)).unwrap();
        assert!(query.validate().is_ok());
        assert_eq!(query.years(), &[2021, 2023]);
        assert_eq!(query.area_code(), "097332001");
        assert_eq!(query.weeks(), WeekFilter::Single(10));

        let bypassed = SnapshotQuery {
            area_code: "not-a-code".to_string(),
            years: Vec::new(),
            weeks: WeekFilter::Single(99),
        };
        assert!(matches!(bypassed.validate(), Err(EngineError::Validation(_))));
    }

    #[test]
    fn single_week_checks_year_floor() {
        assert!(validate_single_week("097332001", 2023, 10).is_ok());
        assert!(validate_single_week("097332001", 2011, 10).is_err());
        assert!(validate_single_week("097332001", 2023, 54).is_err());
    }
}
