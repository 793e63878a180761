//! Fixed size grain pool and grain trigger clock.

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    buffer::SourceBuffer,
    control::GrainControls,
    grain::{wrap_read_cursor, Grain, WindowShape},
    meter::GrainMeter,
};

// -------------------------------------------------------------------------------------------------

/// Maximum number of concurrently playing grains.
pub const MAX_GRAINS: usize = 128;

// -------------------------------------------------------------------------------------------------

/// Spawns and mixes up to [`MAX_GRAINS`] concurrent grains.
///
/// New grains are triggered at a rate of [`GrainControls::density`] grains per second. Each new
/// grain reads the [`SourceBuffer`] from [`GrainControls::play_head_pos`], randomly offset by up
/// to +/- [`GrainControls::spray`] seconds, and copies the current speed, length and window
/// shape. Changing the controls only affects grains which get triggered afterwards.
///
/// The pool reuses inactive [`Grain`] slots, so generating audio never allocates, locks or
/// blocks. When all slots are busy, new triggers are silently dropped.
pub struct GrainScheduler {
    /// Pool of reusable grain instances.
    grains: [Grain; MAX_GRAINS],
    /// Current user controls. Copied and sanitized once per block.
    controls: GrainControls,
    /// Frames until the next grain is due, relative to the start of the next block.
    next_trigger_countdown: f64,
    /// Number of triggers so far, including dropped ones.
    trigger_count: u64,
    /// Number of active grains after the last generate or add call.
    active_grain_count: usize,
    /// Shared active grain count for displays.
    meter: GrainMeter,
    /// Random number generator for spray variations.
    rng: SmallRng,
}

impl GrainScheduler {
    /// Create a new scheduler with the given initial controls.
    pub fn new(controls: GrainControls) -> Self {
        Self::with_rng(controls, SmallRng::from_os_rng())
    }

    /// Create a new scheduler which uses a fixed random seed for spray offsets, in order to
    /// get reproducible output.
    pub fn with_seed(controls: GrainControls, seed: u64) -> Self {
        Self::with_rng(controls, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(controls: GrainControls, rng: SmallRng) -> Self {
        debug_assert!(
            controls.validate().is_ok(),
            "Invalid initial grain controls: {controls:?}"
        );
        let grains = [Grain::new(); MAX_GRAINS];
        let next_trigger_countdown = controls.sanitized().trigger_interval();
        let trigger_count = 0;
        let active_grain_count = 0;
        let meter = GrainMeter::new();
        log::debug!(
            "Creating new grain scheduler: first grain after {next_trigger_countdown} frames"
        );
        Self {
            grains,
            controls,
            next_trigger_countdown,
            trigger_count,
            active_grain_count,
            meter,
            rng,
        }
    }

    /// Current controls.
    pub fn controls(&self) -> &GrainControls {
        &self.controls
    }

    /// Mutable access to the controls. Changes apply to the next generated block.
    pub fn controls_mut(&mut self) -> &mut GrainControls {
        &mut self.controls
    }

    /// Replace all controls. Changes apply to the next generated block.
    pub fn set_controls(&mut self, controls: GrainControls) {
        self.controls = controls;
    }

    /// Frames until the next grain trigger, relative to the start of the next block.
    pub fn next_trigger_countdown(&self) -> f64 {
        self.next_trigger_countdown
    }

    /// Total number of triggered grains, including triggers which got dropped because the
    /// pool was exhausted.
    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    /// Number of currently active grains.
    pub fn active_grain_count(&self) -> usize {
        self.active_grain_count
    }

    /// Pool indices of all currently active grains, in pool order.
    pub fn active_grain_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.grains
            .iter()
            .enumerate()
            .filter_map(|(index, grain)| grain.is_active().then_some(index))
    }

    /// Access to the whole grain pool.
    pub fn grains(&self) -> &[Grain] {
        &self.grains
    }

    /// A handle to the shared active grain count, which can be polled from other threads.
    pub fn meter(&self) -> GrainMeter {
        self.meter.clone()
    }

    /// Stop all grains immediately and re-arm the trigger clock.
    pub fn reset(&mut self) {
        for grain in &mut self.grains {
            grain.deactivate();
        }
        self.next_trigger_countdown = self.controls.sanitized().trigger_interval();
        self.active_grain_count = 0;
        self.meter.set_active_grains(0);
    }

    /// Manually trigger a new grain with the current controls, starting `start_delay` frames
    /// into the next generated block.
    ///
    /// Returns the pool index of the new grain, or None when all grains are busy.
    pub fn add_grain(&mut self, source: &SourceBuffer, start_delay: usize) -> Option<usize> {
        let controls = self.controls.sanitized();
        let index = self.activate_grain(&controls, source, start_delay);
        if index.is_some() {
            self.active_grain_count += 1;
            self.meter.set_active_grains(self.active_grain_count);
        }
        index
    }

    /// Generate one block of grain output and add it to the given stereo buffers.
    ///
    /// The buffers should be cleared by the caller: the scheduler only accumulates.
    pub fn generate(&mut self, left: &mut [f32], right: &mut [f32], source: &SourceBuffer) {
        debug_assert_eq!(left.len(), right.len(), "Channel buffer lengths must match");
        let frames = left.len().min(right.len());
        if frames == 0 {
            return;
        }

        // read controls only once per block
        let controls = self.controls.sanitized();

        // trigger new grains
        // fractional countdown: start delays are the whole frames it overshot
        self.next_trigger_countdown -= frames as f64;
        while self.next_trigger_countdown <= 0.0 {
            let start_delay = ((-self.next_trigger_countdown).floor() as usize).min(frames - 1);
            self.trigger_count += 1;
            self.activate_grain(&controls, source, start_delay);
            self.next_trigger_countdown += controls.trigger_interval();
        }

        // run all active grains and recycle the expired ones
        let mut active_grain_count = 0;
        for grain in self.grains.iter_mut().filter(|grain| grain.is_active()) {
            grain.process(left, right, source, 0, frames);
            if grain.is_expired() {
                grain.deactivate();
            } else {
                active_grain_count += 1;
            }
        }
        self.active_grain_count = active_grain_count;
        self.meter.set_active_grains(active_grain_count);
    }

    /// Activate the first free grain slot with the given controls.
    /// Returns Some(index) if a grain was activated, None if no free grains are available.
    fn activate_grain(
        &mut self,
        controls: &GrainControls,
        source: &SourceBuffer,
        start_delay: usize,
    ) -> Option<usize> {
        let index = self.grains.iter().position(|grain| !grain.is_active())?;

        let source_len = source.frame_count() as f32;
        let spray_offset = if controls.spray > 0.0 {
            controls.spray_frames() * (self.rng.random::<f32>() * 2.0 - 1.0)
        } else {
            0.0
        };
        let read_cursor =
            wrap_read_cursor(controls.play_head_pos * source_len + spray_offset, source_len);
        let window = WindowShape {
            sides: controls.sides,
            tilt: controls.tilt,
        };

        self.grains[index].activate(
            controls.length_frames(),
            read_cursor,
            controls.effective_speed(),
            window,
            start_delay,
        );
        Some(index)
    }
}

// -------------------------------------------------------------------------------------------------
