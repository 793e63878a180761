//! Circular stereo recording buffer which grains read from.

use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A fixed-length, circular stereo sample buffer.
///
/// The buffer is written by a recorder (see [`SourceBuffer::record`]) and read by grains.
/// Its length never changes after creation, so readers can safely wrap indices modulo
/// [`SourceBuffer::frame_count`].
///
/// The buffer does no synchronization on its own: writes and grain reads must either happen
/// on the same thread, between audio blocks (as done by the
/// [`GranularProcessor`](crate::GranularProcessor)), or be guarded externally.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    left: Box<[f32]>,
    right: Box<[f32]>,
    write_position: usize,
    recording: bool,
}

impl SourceBuffer {
    /// Create a new silent buffer with the given number of frames per channel.
    pub fn new(frame_count: usize) -> Result<Self, Error> {
        if frame_count == 0 {
            return Err(Error::BufferError(
                "source buffer needs at least one frame".to_string(),
            ));
        }
        log::debug!("Creating new source buffer with {frame_count} frames");
        Ok(Self {
            left: vec![0.0; frame_count].into_boxed_slice(),
            right: vec![0.0; frame_count].into_boxed_slice(),
            write_position: 0,
            recording: false,
        })
    }

    /// Create a buffer from existing left and right channel contents.
    pub fn from_channels(left: Vec<f32>, right: Vec<f32>) -> Result<Self, Error> {
        if left.is_empty() {
            return Err(Error::BufferError(
                "source buffer needs at least one frame".to_string(),
            ));
        }
        if left.len() != right.len() {
            return Err(Error::BufferError(format!(
                "channel lengths differ: left has {} frames, right has {} frames",
                left.len(),
                right.len()
            )));
        }
        Ok(Self {
            left: left.into_boxed_slice(),
            right: right.into_boxed_slice(),
            write_position: 0,
            recording: false,
        })
    }

    /// Create a buffer with the same content on both channels.
    pub fn from_mono(samples: Vec<f32>) -> Result<Self, Error> {
        let right = samples.clone();
        Self::from_channels(samples, right)
    }

    /// Number of frames per channel. Always > 0.
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.left.len()
    }

    /// Left channel samples.
    #[inline]
    pub fn left(&self) -> &[f32] {
        &self.left
    }

    /// Right channel samples.
    #[inline]
    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Frame index the recorder writes to next.
    pub fn write_position(&self) -> usize {
        self.write_position
    }

    /// Is the recorder currently capturing input?
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Start or stop capturing input in [`Self::record`].
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Record the given stereo input when recording is enabled. Returns the number of
    /// frames that got written.
    pub fn record(&mut self, left: &[f32], right: &[f32]) -> usize {
        if self.recording {
            self.write(left, right)
        } else {
            0
        }
    }

    /// Unconditionally write the given stereo frames at the write position, wrapping around
    /// the buffer end. Returns the number of frames written.
    pub fn write(&mut self, left: &[f32], right: &[f32]) -> usize {
        debug_assert_eq!(left.len(), right.len(), "Channel lengths must match");
        let frame_count = left.len().min(right.len());
        let buffer_len = self.frame_count();

        let mut written = 0;
        while written < frame_count {
            let chunk_len = (frame_count - written).min(buffer_len - self.write_position);
            let target = self.write_position..self.write_position + chunk_len;
            let source = written..written + chunk_len;
            self.left[target.clone()].copy_from_slice(&left[source.clone()]);
            self.right[target].copy_from_slice(&right[source]);
            written += chunk_len;
            self.write_position = (self.write_position + chunk_len) % buffer_len;
        }
        written
    }

    /// Silence the whole buffer and move the write position back to the start.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.write_position = 0;
    }
}

// -------------------------------------------------------------------------------------------------
