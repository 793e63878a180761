//! Sample interpolation helpers.

use assume::assume;

// -------------------------------------------------------------------------------------------------

/// Linear interpolation between `a` and `b`. Returns `a` exactly when `fraction` is 0.
#[inline(always)]
pub fn lerp(a: f32, b: f32, fraction: f32) -> f32 {
    a + (b - a) * fraction
}

// -------------------------------------------------------------------------------------------------

/// Read a sample at the fractional position `position` from a circular buffer, linearly
/// interpolating between `floor(position)` and the following sample. Both indices wrap
/// around the buffer's length, so the last frame interpolates towards the first one.
///
/// `position` is expected to be in range `0.0..buffer.len()`.
#[inline]
pub fn read_linear_wrapped(buffer: &[f32], position: f32) -> f32 {
    let len = buffer.len();
    debug_assert!(len > 0, "Need a non empty buffer");
    debug_assert!(
        position >= 0.0 && position < len as f32,
        "Position {position} out of range 0..{len}"
    );
    let index = position as usize % len;
    let next_index = if index + 1 < len { index + 1 } else { 0 };
    let fraction = position - position.floor();

    assume!(unsafe: index < len);
    let current = buffer[index];
    assume!(unsafe: next_index < len);
    let next = buffer[next_index];

    lerp(current, next, fraction)
}

// -------------------------------------------------------------------------------------------------
