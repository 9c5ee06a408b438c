//! Gain handling in decibels
//!
//! The controller stores a gain in `[-40, 40]` dB and pushes it to the
//! device's gain control, clamped again to whatever range that control
//! supports.

use cadence_core::GainControl;

/// Lowest storable gain
pub const MIN_GAIN_DB: f32 = -40.0;

/// Highest storable gain
pub const MAX_GAIN_DB: f32 = 40.0;

/// Clamp a requested gain to the storable range
///
/// NaN maps to unity gain.
pub fn clamp_gain_db(db: f32) -> f32 {
    if db.is_nan() {
        return 0.0;
    }
    db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
}

/// Apply `db` to `control`, clamped to the control's own range
///
/// Returns the value actually set.
pub fn apply_gain(control: &dyn GainControl, db: f32) -> f32 {
    let (min, max) = (control.min_db(), control.max_db());
    let applied = if min <= max { db.clamp(min, max) } else { db };
    control.set_gain_db(applied);
    applied
}
