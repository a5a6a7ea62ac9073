//! Per-band exponential smoothing and gravity fall.

/// `current = current * smoothing + raw * (1 - smoothing)`, clamped to [0, 1].
///
/// Only the overlapping prefix of the two slices is touched.
pub fn smooth_in_place(current: &mut [f32], raw: &[f32], smoothing: f32) {
    let keep = smoothing.clamp(0.0, 1.0);
    let take = 1.0 - keep;
    for (value, &target) in current.iter_mut().zip(raw) {
        *value = (*value * keep + target * take).clamp(0.0, 1.0);
    }
}

/// Lower every value by `amount`, flooring at zero
pub fn fall(current: &mut [f32], amount: f32) {
    for value in current {
        *value = (*value - amount).max(0.0);
    }
}
