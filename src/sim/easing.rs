//! Easing curves and remapping primitives

const BACK_C1: f32 = 1.70158;
const BACK_C3: f32 = BACK_C1 + 1.0;

/// 1 - (1 - x)³
#[inline]
pub fn ease_out_cubic(x: f32) -> f32 {
    1.0 - (1.0 - x).powi(3)
}

#[inline]
pub fn ease_in_out_cubic(x: f32) -> f32 {
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}

/// Overshoots past 1 before settling
#[inline]
pub fn ease_out_back(x: f32) -> f32 {
    1.0 + BACK_C3 * (x - 1.0).powi(3) + BACK_C1 * (x - 1.0).powi(2)
}

/// Contrast remap mirrored around 0.5; `k > 1` steepens the middle
#[inline]
pub fn gain(x: f32, k: f32) -> f32 {
    let a = 0.5 * (2.0 * if x < 0.5 { x } else { 1.0 - x }).powf(k);
    if x < 0.5 { a } else { 1.0 - a }
}

/// Smooth bump of half-width `w` centered at `c`; 1 at the center, 0 at and
/// beyond `|x - c| >= w`
#[inline]
pub fn cubic_pulse(c: f32, w: f32, x: f32) -> f32 {
    let x = (x - c).abs();
    if x >= w {
        return 0.0;
    }
    let x = x / w;
    1.0 - x * x * (3.0 - 2.0 * x)
}
