//! Grain cloud control values.

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// User facing parameters of the grain cloud, as read by the
/// [`GrainScheduler`](crate::GrainScheduler) once at the start of every audio block.
///
/// Values usually come from the parameter binding layer, pre-clamped to the ranges of the
/// [`GranularProcessor`](crate::GranularProcessor) parameters. The scheduler nevertheless
/// only ever uses a [`sanitized`](Self::sanitized) copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainControls {
    /// Playback rate of new grains. 1.0 = original speed, negative values play backwards.
    pub speed: f32,
    /// Transposition of new grains in octaves, applied on top of `speed`.
    pub pitch: f32,
    /// Number of new grains triggered per second.
    pub density: f32,
    /// Grain duration in seconds.
    pub length: f32,
    /// Random start position jitter of new grains in seconds (+/- spray).
    pub spray: f32,
    /// Total width of the window tapers (0.0 = rectangular, 1.0 = no sustain).
    pub sides: f32,
    /// Attack/release asymmetry of the window tapers (-1.0..=1.0).
    pub tilt: f32,
    /// Normalized read position in the source buffer (0.0..1.0).
    pub play_head_pos: f32,
    /// Host sample rate in Hz.
    pub sample_rate: f32,
}

impl Default for GrainControls {
    fn default() -> Self {
        Self {
            speed: 1.0,
            pitch: 0.0,
            density: 10.0,
            length: 0.1,
            spray: 0.01,
            sides: 1.0,
            tilt: 0.0,
            play_head_pos: 0.0,
            sample_rate: 44100.0,
        }
    }
}

impl GrainControls {
    /// Lowest grain trigger rate.
    pub const MIN_DENSITY: f32 = 0.01;
    /// Highest grain trigger rate.
    pub const MAX_DENSITY: f32 = 10000.0;
    /// Longest possible grain duration.
    pub const MAX_LENGTH: f32 = 10.0;
    /// Largest spray range.
    pub const MAX_SPRAY: f32 = 10.0;
    /// Slowest possible (absolute) grain playback speed.
    pub const MIN_SPEED: f32 = 1.0 / 64.0;
    /// Fastest possible (absolute) grain playback speed.
    pub const MAX_SPEED: f32 = 64.0;
    /// Pitch range in octaves.
    pub const MAX_PITCH: f32 = 4.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Validate all controls. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        let check = |name: &str, value: f32, valid: bool| {
            if valid && value.is_finite() {
                Ok(())
            } else {
                Err(Error::ParameterError(format!(
                    "grain control '{name}' value is '{value}'"
                )))
            }
        };
        check(
            "speed",
            self.speed,
            (Self::MIN_SPEED..=Self::MAX_SPEED).contains(&self.speed.abs()),
        )?;
        check(
            "pitch",
            self.pitch,
            (-Self::MAX_PITCH..=Self::MAX_PITCH).contains(&self.pitch),
        )?;
        check(
            "density",
            self.density,
            (Self::MIN_DENSITY..=Self::MAX_DENSITY).contains(&self.density),
        )?;
        check(
            "length",
            self.length,
            self.length > 0.0 && self.length <= Self::MAX_LENGTH,
        )?;
        check(
            "spray",
            self.spray,
            (0.0..=Self::MAX_SPRAY).contains(&self.spray),
        )?;
        check("sides", self.sides, (0.0..=1.0).contains(&self.sides))?;
        check("tilt", self.tilt, (-1.0..=1.0).contains(&self.tilt))?;
        check(
            "play_head_pos",
            self.play_head_pos,
            (0.0..=1.0).contains(&self.play_head_pos),
        )?;
        check("sample_rate", self.sample_rate, self.sample_rate > 0.0)?;
        Ok(())
    }

    /// A copy of the controls with every value forced into a finite, valid range.
    ///
    /// Non finite values fall back to the defaults. This guarantees that grain lifetimes
    /// and trigger intervals are finite and strictly positive.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f32, default: f32| if value.is_finite() { value } else { default };

        let sample_rate = finite_or(self.sample_rate, defaults.sample_rate);
        let sample_rate = if sample_rate > 0.0 {
            sample_rate
        } else {
            defaults.sample_rate
        };

        let speed = finite_or(self.speed, defaults.speed);
        let speed_magnitude = speed.abs().clamp(Self::MIN_SPEED, Self::MAX_SPEED);
        let speed = if speed < 0.0 {
            -speed_magnitude
        } else {
            speed_magnitude
        };

        // at least one frame long
        let min_length = 1.0 / sample_rate;
        let length = finite_or(self.length, defaults.length).clamp(min_length, Self::MAX_LENGTH);

        Self {
            speed,
            pitch: finite_or(self.pitch, 0.0).clamp(-Self::MAX_PITCH, Self::MAX_PITCH),
            density: finite_or(self.density, defaults.density)
                .clamp(Self::MIN_DENSITY, Self::MAX_DENSITY),
            length,
            spray: finite_or(self.spray, 0.0).clamp(0.0, Self::MAX_SPRAY),
            sides: finite_or(self.sides, defaults.sides).clamp(0.0, 1.0),
            tilt: finite_or(self.tilt, defaults.tilt).clamp(-1.0, 1.0),
            play_head_pos: finite_or(self.play_head_pos, 0.0).rem_euclid(1.0),
            sample_rate,
        }
    }

    /// Signed per frame playback increment of new grains: `speed * 2^pitch`.
    pub fn effective_speed(&self) -> f32 {
        self.speed * self.pitch.exp2()
    }

    /// Grain lifetime in frames.
    pub fn length_frames(&self) -> f32 {
        self.length * self.sample_rate
    }

    /// Maximum start position jitter in frames.
    pub fn spray_frames(&self) -> f32 {
        self.spray * self.sample_rate
    }

    /// Fractional number of frames between two grain triggers. Always >= 1.
    pub fn trigger_interval(&self) -> f64 {
        let interval = self.sample_rate as f64 / self.density as f64;
        if interval.is_finite() {
            interval.max(1.0)
        } else {
            1.0
        }
    }
}

// -------------------------------------------------------------------------------------------------
