//! A single granular playback voice.

use crate::{
    buffer::SourceBuffer,
    utils::dsp::{interpolation::read_linear_wrapped, window::tukey_window},
};

// -------------------------------------------------------------------------------------------------

/// Amplitude envelope shape of a grain. See [`tukey_window`] for details.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowShape {
    /// Total fraction of the grain covered by tapers (0.0..=1.0).
    pub sides: f32,
    /// Attack/release taper asymmetry (-1.0..=1.0).
    pub tilt: f32,
}

impl Default for WindowShape {
    fn default() -> Self {
        Self {
            sides: 1.0,
            tilt: 0.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Represents a single grain of audio.
///
/// A grain replays a windowed segment of a [`SourceBuffer`] at its own speed, starting at its
/// own read position. Grains are pre-allocated in the [`GrainScheduler`](crate::GrainScheduler)'s
/// pool and get recycled: activating and deactivating a grain never allocates.
#[derive(Debug, Clone, Copy)]
pub struct Grain {
    /// Is this grain currently active?
    active: bool,
    /// Frames to wait before the grain starts sounding. May span multiple blocks.
    start_delay: usize,
    /// Total lifetime in frames at unity speed.
    length: f32,
    /// Number of output frames the grain lives: `ceil(length / |speed|)`.
    total_frames: u64,
    /// Output frames left until the grain expires.
    remaining_frames: u64,
    /// Fractional read position in the source buffer, always in `0..source_frames`.
    read_cursor: f32,
    /// Signed read position increment per frame.
    speed: f32,
    /// Envelope shape, fixed while the grain is active.
    window: WindowShape,
}

impl Default for Grain {
    fn default() -> Self {
        Self::new()
    }
}

impl Grain {
    /// Create a new inactive grain.
    pub const fn new() -> Self {
        Self {
            active: false,
            start_delay: 0,
            length: 0.0,
            total_frames: 0,
            remaining_frames: 0,
            read_cursor: 0.0,
            speed: 1.0,
            window: WindowShape {
                sides: 1.0,
                tilt: 0.0,
            },
        }
    }

    /// Check if this grain is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True when the grain's lifetime elapsed and the slot can be recycled.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.remaining_frames == 0
    }

    /// Pending start offset in frames, relative to the next processed block.
    pub fn start_delay(&self) -> usize {
        self.start_delay
    }

    /// Total lifetime in frames.
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Remaining lifetime in frames at unity speed.
    pub fn age(&self) -> f32 {
        (self.remaining_frames as f64 * self.speed.abs() as f64) as f32
    }

    /// Number of output frames left until the grain expires.
    pub fn remaining_frames(&self) -> u64 {
        self.remaining_frames
    }

    /// Current fractional read position in the source buffer.
    pub fn read_cursor(&self) -> f32 {
        self.read_cursor
    }

    /// Signed playback speed.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Envelope shape.
    pub fn window(&self) -> WindowShape {
        self.window
    }

    /// Normalized lifetime position: 0.0 at the grain's start, approaching 1.0 at its end.
    #[inline]
    pub fn window_phase(&self) -> f32 {
        let elapsed = self.total_frames - self.remaining_frames;
        (elapsed as f64 * self.speed.abs() as f64 / self.length as f64) as f32
    }

    /// Activate this grain with the given parameters.
    ///
    /// `read_cursor` must already be wrapped into the source buffer's range, `length` and
    /// `speed` must be finite and non zero.
    pub fn activate(
        &mut self,
        length: f32,
        read_cursor: f32,
        speed: f32,
        window: WindowShape,
        start_delay: usize,
    ) {
        debug_assert!(
            length.is_finite() && length > 0.0,
            "Invalid grain length: {length}"
        );
        debug_assert!(
            speed.is_finite() && speed != 0.0,
            "Invalid grain speed: {speed}"
        );
        debug_assert!(read_cursor >= 0.0, "Invalid read cursor: {read_cursor}");
        self.active = true;
        self.start_delay = start_delay;
        self.length = length;
        self.total_frames = ((length as f64 / speed.abs() as f64).ceil() as u64).max(1);
        self.remaining_frames = self.total_frames;
        self.read_cursor = read_cursor;
        self.speed = speed;
        self.window = window;
    }

    /// Deactivate this grain immediately.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.start_delay = 0;
        self.remaining_frames = 0;
    }

    /// Synthesize up to `frames` frames of this grain and mix them into the given output
    /// buffers, starting at frame `block_offset` plus the grain's pending start delay.
    /// When the start delay exceeds the block, the grain stays silent and the rest of the
    /// delay carries over to the next call.
    ///
    /// Output is added to the existing buffer content. The grain never writes past the end
    /// of its lifetime. It does not deactivate itself: callers should check
    /// [`Self::is_expired`] afterwards and recycle the grain.
    ///
    /// Returns the number of frames that got written.
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        source: &SourceBuffer,
        block_offset: usize,
        frames: usize,
    ) -> usize {
        if !self.active {
            return 0;
        }

        // wait for the start delay, which may span multiple blocks
        if self.start_delay >= frames {
            self.start_delay -= frames;
            return 0;
        }
        let offset = block_offset + self.start_delay;
        let frames = frames - self.start_delay;
        self.start_delay = 0;

        // do not output past the grain's lifetime
        let output_len = left.len().min(right.len());
        let frames = (frames as u64)
            .min(self.remaining_frames)
            .min(output_len.saturating_sub(offset) as u64) as usize;
        if frames == 0 {
            return 0;
        }

        let source_left = source.left();
        let source_right = source.right();
        let source_len = source.frame_count() as f32;

        let phase_step = self.speed.abs() as f64 / self.length as f64;
        let mut elapsed = self.total_frames - self.remaining_frames;
        let mut read_cursor = self.read_cursor;
        for (out_left, out_right) in left[offset..offset + frames]
            .iter_mut()
            .zip(right[offset..offset + frames].iter_mut())
        {
            let phase = (elapsed as f64 * phase_step) as f32;
            let amplitude = tukey_window(phase, self.window.sides, self.window.tilt);

            *out_left += read_linear_wrapped(source_left, read_cursor) * amplitude;
            *out_right += read_linear_wrapped(source_right, read_cursor) * amplitude;

            read_cursor += self.speed;
            if !(0.0..source_len).contains(&read_cursor) {
                read_cursor = wrap_read_cursor(read_cursor, source_len);
            }
            elapsed += 1;
        }
        self.read_cursor = read_cursor;
        self.remaining_frames -= frames as u64;

        frames
    }
}

// -------------------------------------------------------------------------------------------------

/// Wrap a read position into `0.0..len`.
#[inline]
pub(crate) fn wrap_read_cursor(position: f32, len: f32) -> f32 {
    let wrapped = position.rem_euclid(len);
    // rem_euclid rounds tiny negative positions up to `len`
    if wrapped < len {
        wrapped
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::f32::consts::PI;

    fn sine_buffer(frame_count: usize, period: usize) -> SourceBuffer {
        let samples = (0..frame_count)
            .map(|i| (2.0 * PI * i as f32 / period as f32).sin())
            .collect::<Vec<_>>();
        let inverted = samples.iter().map(|s| -s).collect::<Vec<_>>();
        SourceBuffer::from_channels(samples, inverted).unwrap()
    }

    const RECTANGULAR: WindowShape = WindowShape {
        sides: 0.0,
        tilt: 0.0,
    };

    #[test]
    fn wrap_cursor() {
        assert_eq!(wrap_read_cursor(0.0, 10.0), 0.0);
        assert_eq!(wrap_read_cursor(10.0, 10.0), 0.0);
        assert_eq!(wrap_read_cursor(12.5, 10.0), 2.5);
        assert_eq!(wrap_read_cursor(-2.5, 10.0), 7.5);
        assert_eq!(wrap_read_cursor(-35.0, 10.0), 5.0);
        assert!(wrap_read_cursor(-1e-9, 10.0) < 10.0);
    }

    #[test]
    fn inactive_grains_are_silent() {
        let source = sine_buffer(64, 16);
        let mut grain = Grain::new();
        let mut left = [0.0; 32];
        let mut right = [0.0; 32];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 32), 0);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
    }

    #[test]
    fn sine_round_trip() {
        let source = sine_buffer(1000, 100);
        let mut grain = Grain::new();
        grain.activate(300.0, 200.0, 1.0, RECTANGULAR, 0);

        let mut left = [0.0; 256];
        let mut right = [0.0; 256];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 256), 256);
        for frame in 0..256 {
            assert_eq!(left[frame], source.left()[200 + frame]);
            assert_eq!(right[frame], source.right()[200 + frame]);
        }

        // with a window applied, samples get scaled by the envelope only
        let mut grain = Grain::new();
        let window = WindowShape {
            sides: 1.0,
            tilt: 0.0,
        };
        grain.activate(256.0, 0.0, 1.0, window, 0);
        let mut left = [0.0; 256];
        let mut right = [0.0; 256];
        grain.process(&mut left, &mut right, &source, 0, 256);
        for frame in 0..256 {
            let envelope = tukey_window(frame as f32 / 256.0, 1.0, 0.0);
            let expected = source.left()[frame] * envelope;
            assert!((left[frame] - expected).abs() < 1e-6);
        }
        assert!(grain.is_expired());
    }

    #[test]
    fn start_delay_and_accumulation() {
        let source = SourceBuffer::from_mono(vec![0.5; 128]).unwrap();
        let mut grain = Grain::new();
        grain.activate(1000.0, 0.0, 1.0, RECTANGULAR, 10);

        let mut left = [1.0; 64];
        let mut right = [1.0; 64];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 64), 54);
        assert_eq!(grain.start_delay(), 0);
        assert!(left[..10].iter().all(|s| *s == 1.0));
        assert!(left[10..].iter().all(|s| *s == 1.5));
        assert!(right[10..].iter().all(|s| *s == 1.5));
        assert_eq!(grain.age(), 1000.0 - 54.0);

        // next block starts right away
        let mut left = [0.0; 64];
        let mut right = [0.0; 64];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 64), 64);
        assert!(left.iter().all(|s| *s == 0.5));

        // block offsets shift the output
        let mut left = [0.0; 64];
        let mut right = [0.0; 64];
        assert_eq!(grain.process(&mut left, &mut right, &source, 32, 32), 32);
        assert!(left[..32].iter().all(|s| *s == 0.0));
        assert!(left[32..].iter().all(|s| *s == 0.5));
    }

    #[test]
    fn start_delay_spans_blocks() {
        let source = SourceBuffer::from_mono(vec![1.0; 128]).unwrap();
        let mut grain = Grain::new();
        grain.activate(100.0, 0.0, 1.0, RECTANGULAR, 600);

        let mut left = [0.0; 512];
        let mut right = [0.0; 512];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 512), 0);
        assert!(left.iter().all(|s| *s == 0.0));
        assert_eq!(grain.start_delay(), 88);
        assert!(!grain.is_expired());

        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 512), 100);
        assert!(left[..88].iter().all(|s| *s == 0.0));
        assert!(left[88..188].iter().all(|s| *s == 1.0));
        assert!(left[188..].iter().all(|s| *s == 0.0));
        assert!(grain.is_expired());
    }

    #[test]
    fn slow_grains_age() {
        let source = SourceBuffer::from_mono(vec![0.5; 1000]).unwrap();
        let mut grain = Grain::new();
        grain.activate(441000.0, 0.0, 1.0 / 256.0, RECTANGULAR, 0);
        assert_eq!(grain.remaining_frames(), 441000 * 256);

        let mut left = vec![0.0; 4096];
        let mut right = vec![0.0; 4096];
        for _ in 0..100 {
            assert_eq!(grain.process(&mut left, &mut right, &source, 0, 4096), 4096);
        }
        assert_eq!(grain.remaining_frames(), 441000 * 256 - 409600);
        assert!((grain.age() - (441000.0 - 1600.0)).abs() < 1e-3);
        assert!((grain.window_phase() - 1600.0 / 441000.0).abs() < 1e-6);
    }

    #[test]
    fn expires_mid_block() {
        let source = SourceBuffer::from_mono(vec![1.0; 128]).unwrap();
        let mut grain = Grain::new();
        grain.activate(10.0, 5.0, 1.0, RECTANGULAR, 3);

        let mut left = [0.0; 64];
        let mut right = [0.0; 64];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 64), 10);
        assert!(grain.is_expired());
        assert!(left[..3].iter().all(|s| *s == 0.0));
        assert!(left[3..13].iter().all(|s| *s == 1.0));
        assert!(left[13..].iter().all(|s| *s == 0.0));

        // faster grains end sooner
        let mut grain = Grain::new();
        grain.activate(10.0, 0.0, 4.0, RECTANGULAR, 0);
        let mut left = [0.0; 64];
        let mut right = [0.0; 64];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 64), 3);
        assert!(grain.is_expired());
    }

    #[test]
    fn read_cursor_stays_in_range() {
        let source = sine_buffer(100, 25);
        for speed in [1.0, -1.0, 0.37, -0.37, 2.5, -2.5, 7.3, -63.0, 250.0, -1000.5] {
            let mut grain = Grain::new();
            grain.activate(5000.0, 99.5, speed, WindowShape::default(), 0);
            let mut left = [0.0; 1];
            let mut right = [0.0; 1];
            while !grain.is_expired() {
                grain.process(&mut left, &mut right, &source, 0, 1);
                let cursor = grain.read_cursor();
                assert!(
                    (0.0..100.0).contains(&cursor),
                    "cursor {cursor} escaped buffer at speed {speed}"
                );
            }
            assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
        }
    }

    #[test]
    fn reverse_playback() {
        let ramp = (0..16).map(|i| i as f32).collect::<Vec<_>>();
        let source = SourceBuffer::from_mono(ramp).unwrap();
        let mut grain = Grain::new();
        grain.activate(4.0, 2.0, -1.0, RECTANGULAR, 0);
        let mut left = [0.0; 8];
        let mut right = [0.0; 8];
        assert_eq!(grain.process(&mut left, &mut right, &source, 0, 8), 4);
        assert_eq!(left[..4], [2.0, 1.0, 0.0, 15.0]);
        assert_eq!(grain.read_cursor(), 14.0);
        assert!(grain.is_expired());
    }

    #[test]
    fn envelope_fades_at_both_ends() {
        let source = SourceBuffer::from_mono(vec![1.0; 4096]).unwrap();
        let mut grain = Grain::new();
        grain.activate(2048.0, 0.0, 1.0, WindowShape::default(), 0);
        let mut left = vec![0.0; 2048];
        let mut right = vec![0.0; 2048];
        grain.process(&mut left, &mut right, &source, 0, 2048);
        assert!(left[0].abs() < 1e-6);
        assert!(left[2047] < 1e-4);
        assert!((left[1024] - 1.0).abs() < 1e-6);
    }
}
