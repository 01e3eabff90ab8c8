use crate::error::GradingError;
use crate::scale::{college_scale_table, shs_descriptor, transmute_shs_grade, NumericScale};

/// Half-up rounding, the `Int(10^n * x + 0.5) / 10^n` rule gradebooks use.
pub fn round_off(x: f64, places: usize) -> f64 {
    let factor = 10_f64.powi(places as i32);
    ((factor * x) + 0.5).floor() / factor
}

/// Renders a value already expressed in scale units.
pub fn format_scale_value(value: f64, scale: &NumericScale) -> String {
    // Rounds the binary value: at 2+ places a tie like 1.005 is stored just
    // below the midpoint and renders as "1.00". Band values render as written.
    let decimals = college_scale_table(scale).decimals;
    format!("{:.*}", decimals, round_off(value, decimals))
}

/// Converts a 0-100 percentage into the scale's display form.
///
/// Does not clamp: anything outside `[0, 100]` is reported as invalid input.
pub fn format_college(raw: f64, scale: &NumericScale) -> Result<String, GradingError> {
    if !raw.is_finite() || !(0.0..=100.0).contains(&raw) {
        return Err(GradingError::invalid(format!(
            "percentage {raw} is outside [0, 100]"
        )));
    }
    let value = college_scale_table(scale).scale_value(raw);
    Ok(format_scale_value(value, scale))
}

/// `"92 (Outstanding)"` from a raw initial grade.
pub fn format_shs(initial_grade: f64) -> String {
    let transmuted = transmute_shs_grade(initial_grade);
    format!("{} ({})", transmuted, shs_descriptor(transmuted))
}
