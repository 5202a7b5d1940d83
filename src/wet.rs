use crate::category::{contains_any, normalize, HIGH_PRIORITY_TERMS, SECONDARY_PRIORITY_TERMS};

/// Weekly precipitation total, in millimetres, that makes a week wet by itself.
pub const WET_WEEK_PRECIPITATION_MM: f64 = 50.0;
/// Days of drizzle or showers that make a week wet.
pub const WET_WEEK_DRIZZLE_DAYS: usize = 4;

/// Whether the week counts as wet. Without precipitation readings a week is
/// never wet, whatever the descriptions say.
pub fn is_wet_week<S: AsRef<str>>(precipitation: &[f64], descriptions: &[S]) -> bool {
    if precipitation.is_empty() {
        return false;
    }

    if precipitation.iter().sum::<f64>() >= WET_WEEK_PRECIPITATION_MM {
        return true;
    }

    let normalized: Vec<String> = descriptions
        .iter()
        .filter_map(|d| normalize(d.as_ref()))
        .collect();

    if normalized
        .iter()
        .any(|d| contains_any(d, &HIGH_PRIORITY_TERMS))
    {
        return true;
    }

    let drizzle_days = normalized
        .iter()
        .filter(|d| contains_any(d, &SECONDARY_PRIORITY_TERMS))
        .count();
    drizzle_days >= WET_WEEK_DRIZZLE_DAYS
}
