use crate::error::{EngineError, Result};
use crate::models::WeeklyStatistic;

/// One reading per day, one week at most.
pub const MAX_DAYS_PER_WEEK: usize = 7;

fn validate(values: &[f64], parameter: &str) -> Result<()> {
    if values.is_empty() {
        return Err(EngineError::invalid_input(
            parameter,
            "weekly data must contain at least one value",
        ));
    }

    if values.len() > MAX_DAYS_PER_WEEK {
        return Err(EngineError::invalid_input(
            parameter,
            format!(
                "weekly data must contain {MAX_DAYS_PER_WEEK} or fewer values, got {}",
                values.len()
            ),
        ));
    }

    if values.iter().any(|v| v.is_nan()) {
        return Err(EngineError::invalid_input(
            parameter,
            "weekly data cannot contain NaN values",
        ));
    }

    if values.iter().any(|v| v.is_infinite()) {
        return Err(EngineError::invalid_input(
            parameter,
            "weekly data cannot contain infinite values",
        ));
    }

    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Mean and max over a single daily reading per day.
pub fn calculate(values: &[f64], parameter: &str) -> Result<WeeklyStatistic> {
    validate(values, parameter)?;
    Ok(WeeklyStatistic {
        mean: mean(values),
        max: max(values),
    })
}

/// Mean of the daily midpoints and max of the daily maxima, for sources that
/// report a min/max pair per day.
pub fn calculate_paired(
    minimums: &[f64],
    maximums: &[f64],
    parameter: &str,
) -> Result<WeeklyStatistic> {
    validate(minimums, parameter)?;
    validate(maximums, parameter)?;

    if minimums.len() != maximums.len() {
        return Err(EngineError::invalid_input(
            parameter,
            format!(
                "daily minimum and maximum series differ in length ({} vs {})",
                minimums.len(),
                maximums.len()
            ),
        ));
    }

    let midpoints: Vec<f64> = minimums
        .iter()
        .zip(maximums)
        .map(|(low, high)| (low + high) / 2.0)
        .collect();

    Ok(WeeklyStatistic {
        mean: mean(&midpoints),
        max: max(maximums),
    })
}
