// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

/// Linear interpolation
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Sine of an angle in degrees, exact at multiples of 90
pub fn sin_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    match wrapped {
        w if w == 0.0 || w == 180.0 => 0.0,
        w if w == 90.0 => 1.0,
        w if w == 270.0 => -1.0,
        w => w.to_radians().sin(),
    }
}

/// Cosine of an angle in degrees, exact at multiples of 90
pub fn cos_degrees(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    match wrapped {
        w if w == 90.0 || w == 270.0 => 0.0,
        w if w == 0.0 => 1.0,
        w if w == 180.0 => -1.0,
        w => w.to_radians().cos(),
    }
}

/// Number of segments used to approximate a circle of radius `r`.
///
/// A positive `fn_` wins outright (at least 3). Otherwise the count follows
/// from the minimum angle `fa` (degrees) and minimum segment length `fs`,
/// never below 5. Both limits are clamped to at least 0.01, which caps the
/// count at 36000.
pub fn fragments(r: f64, fn_: u32, fa: f64, fs: f64) -> u32 {
    const GRID_FINE: f64 = 0.000_000_95;
    if r < GRID_FINE || !r.is_finite() {
        return 3;
    }
    if fn_ > 0 {
        return fn_.max(3);
    }
    const MIN_LIMIT: f64 = 0.01;
    let by_angle = 360.0 / fa.max(MIN_LIMIT);
    let by_size = r * 2.0 * std::f64::consts::PI / fs.max(MIN_LIMIT);
    by_angle.min(by_size).max(5.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lerp() {
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
        assert_eq!(lerp(0.0, 10.0, 0.0), 0.0);
        assert_eq!(lerp(0.0, 10.0, 1.0), 10.0);
    }

    #[test]
    fn test_exact_quadrant_angles() {
        assert_eq!(sin_degrees(90.0), 1.0);
        assert_eq!(cos_degrees(90.0), 0.0);
        assert_eq!(sin_degrees(-90.0), -1.0);
        assert_eq!(cos_degrees(540.0), -1.0);
        assert_relative_eq!(sin_degrees(30.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_fragments() {
        assert_eq!(fragments(10.0, 16, 12.0, 2.0), 16);
        assert_eq!(fragments(10.0, 1, 12.0, 2.0), 3);
        // 2*pi*10/2 = 31.4 and 360/12 = 30
        assert_eq!(fragments(10.0, 0, 12.0, 2.0), 30);
        assert_eq!(fragments(0.5, 0, 12.0, 2.0), 5);
        assert_eq!(fragments(0.0, 0, 12.0, 2.0), 3);
    }

    #[test]
    fn test_fragments_with_zero_limits() {
        // 2*pi/0.01 = 628.3
        assert_eq!(fragments(1.0, 0, 0.0, 0.0), 629);
        assert_eq!(fragments(1.0e6, 0, 0.0, 0.0), 36_000);
        assert_eq!(fragments(1.0, 0, f64::NAN, -2.0), 629);
    }
}
