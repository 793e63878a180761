//! Grain amplitude windows.

use std::f32::consts::PI;

// -------------------------------------------------------------------------------------------------

/// Evaluate an asymmetric Tukey (tapered cosine) window at the normalized grain
/// position `position` (0.0 = grain start, 1.0 = grain end).
///
/// `sides` is the total fraction of the grain covered by cosine tapers (0.0 = rectangular,
/// 1.0 = no flat top). `tilt` moves taper width from the release to the attack side:
/// at -1.0 the whole taper is spent on the release, at 1.0 on the attack, at 0.0 both
/// sides get `sides / 2`, which makes `sides = 1, tilt = 0` a Hann window.
///
/// Out of range arguments are clamped, so the result always is in range `0.0..=1.0`.
#[inline]
pub fn tukey_window(position: f32, sides: f32, tilt: f32) -> f32 {
    let position = position.clamp(0.0, 1.0);
    let sides = sides.clamp(0.0, 1.0);
    let tilt = tilt.clamp(-1.0, 1.0);

    let attack = sides * (1.0 + tilt) * 0.5;
    let release = sides - attack;

    if position < attack {
        0.5 * (1.0 - (PI * position / attack).cos())
    } else if position > 1.0 - release {
        0.5 * (1.0 - (PI * (1.0 - position) / release).cos())
    } else {
        1.0
    }
}

// -------------------------------------------------------------------------------------------------
