//! Stereo granular processor: recorder, grain cloud and dry/wet mixer behind a parameter
//! interface, plus a thread-safe handle to control it.

use std::{sync::Arc, time::Duration};

use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;

use crate::{
    buffer::SourceBuffer,
    control::GrainControls,
    meter::GrainMeter,
    parameter::{
        BooleanParameter, BooleanParameterValue, ClonableParameter, FloatParameter,
        FloatParameterValue, Parameter, ParameterScaling, ParameterValueUpdate,
    },
    scheduler::GrainScheduler,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Messages which get sent from a [`GranularProcessorHandle`] to the processor in audio time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GranularProcessorMessage {
    /// Update a single parameter value.
    SetParameter(FourCC, ParameterValueUpdate),
    /// Stop all playing grains.
    Reset,
    /// Silence the recorded source buffer.
    ClearBuffer,
}

// -------------------------------------------------------------------------------------------------

/// A granular delay/looper: records stereo input into a circular [`SourceBuffer`], plays a
/// cloud of grains from it and mixes the grains with the dry input signal.
///
/// All controls are exposed as [`Parameter`]s. They can be changed directly via
/// [`set_parameter`](Self::set_parameter) or, from other threads, via a
/// [`GranularProcessorHandle`]. Pending handle messages get applied at the start of each
/// [`process`](Self::process) call.
pub struct GranularProcessor {
    sample_rate: u32,
    max_block_frames: usize,
    source: SourceBuffer,
    scheduler: GrainScheduler,
    // parameters
    speed: FloatParameterValue,
    pitch: FloatParameterValue,
    density: FloatParameterValue,
    length: FloatParameterValue,
    spray: FloatParameterValue,
    sides: FloatParameterValue,
    tilt: FloatParameterValue,
    position: FloatParameterValue,
    mix: FloatParameterValue,
    record: BooleanParameterValue,
    // preallocated wet signal buffers
    wet_left: Vec<f32>,
    wet_right: Vec<f32>,
    message_queue: Arc<ArrayQueue<GranularProcessorMessage>>,
}

impl GranularProcessor {
    pub const SPEED: FloatParameter =
        FloatParameter::new(FourCC(*b"FSPD"), "Speed", -5.0..=5.0, 1.0).with_unit("x");
    pub const PITCH: FloatParameter =
        FloatParameter::new(FourCC(*b"FPIT"), "Pitch", -2.0..=2.0, 0.0).with_unit("Oct");
    pub const DENSITY: FloatParameter =
        FloatParameter::new(FourCC(*b"FDEN"), "Density", 0.1..=500.0, 10.0)
            .with_scaling(ParameterScaling::Exponential(2.0))
            .with_unit("Hz");
    pub const LENGTH: FloatParameter =
        FloatParameter::new(FourCC(*b"FLEN"), "Length", 1.0..=10000.0, 100.0)
            .with_scaling(ParameterScaling::Exponential(3.0))
            .with_unit("ms");
    pub const SPRAY: FloatParameter =
        FloatParameter::new(FourCC(*b"FSPR"), "Spray", 0.0..=10000.0, 10.0)
            .with_scaling(ParameterScaling::Exponential(3.0))
            .with_unit("ms");
    pub const SIDES: FloatParameter =
        FloatParameter::new(FourCC(*b"FSID"), "Sides", 0.0..=1.0, 1.0);
    pub const TILT: FloatParameter = FloatParameter::new(FourCC(*b"FTLT"), "Tilt", -1.0..=1.0, 0.0);
    pub const POSITION: FloatParameter =
        FloatParameter::new(FourCC(*b"FPOS"), "Position", 0.0..=1.0, 0.0);
    pub const MIX: FloatParameter =
        FloatParameter::new(FourCC(*b"FMIX"), "Mix", -100.0..=100.0, 100.0).with_unit("%");
    pub const RECORD: BooleanParameter =
        BooleanParameter::new(FourCC(*b"FREC"), "Record", false);

    const PARAMETER_IDS: [FourCC; 10] = [
        Self::SPEED.id(),
        Self::PITCH.id(),
        Self::DENSITY.id(),
        Self::LENGTH.id(),
        Self::SPRAY.id(),
        Self::SIDES.id(),
        Self::TILT.id(),
        Self::POSITION.id(),
        Self::MIX.id(),
        Self::RECORD.id(),
    ];

    /// Create a new processor with an empty (silent) source buffer of the given duration.
    ///
    /// `max_block_frames` is the largest block size [`generate`](GrainScheduler::generate) gets
    /// called with. Larger host buffers are processed in multiple chunks.
    pub fn new(
        sample_rate: u32,
        buffer_duration: Duration,
        max_block_frames: usize,
    ) -> Result<Self, Error> {
        let frame_count = (buffer_duration.as_secs_f64() * sample_rate as f64).round() as usize;
        let source = SourceBuffer::new(frame_count)?;
        Self::with_source(source, sample_rate, max_block_frames)
    }

    /// Create a new processor which plays grains from the given, possibly prefilled,
    /// source buffer.
    pub fn with_source(
        source: SourceBuffer,
        sample_rate: u32,
        max_block_frames: usize,
    ) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "sample rate must be greater than zero".to_string(),
            ));
        }
        if max_block_frames == 0 {
            return Err(Error::ParameterError(
                "max block size must be greater than zero".to_string(),
            ));
        }
        log::info!(
            "Creating granular processor: {} Hz, {} source frames, max block size {}",
            sample_rate,
            source.frame_count(),
            max_block_frames
        );

        let controls = GrainControls {
            sample_rate: sample_rate as f32,
            ..GrainControls::default()
        };
        const MESSAGE_QUEUE_SIZE: usize = 128;

        let mut processor = Self {
            sample_rate,
            max_block_frames,
            source,
            scheduler: GrainScheduler::new(controls),
            speed: FloatParameterValue::from_description(Self::SPEED),
            pitch: FloatParameterValue::from_description(Self::PITCH),
            density: FloatParameterValue::from_description(Self::DENSITY),
            length: FloatParameterValue::from_description(Self::LENGTH),
            spray: FloatParameterValue::from_description(Self::SPRAY),
            sides: FloatParameterValue::from_description(Self::SIDES),
            tilt: FloatParameterValue::from_description(Self::TILT),
            position: FloatParameterValue::from_description(Self::POSITION),
            mix: FloatParameterValue::from_description(Self::MIX),
            record: BooleanParameterValue::from_description(Self::RECORD),
            wet_left: vec![0.0; max_block_frames],
            wet_right: vec![0.0; max_block_frames],
            message_queue: Arc::new(ArrayQueue::new(MESSAGE_QUEUE_SIZE)),
        };
        processor.scheduler.set_controls(processor.controls());
        Ok(processor)
    }

    /// Use a fixed random seed for grain spray offsets, to get reproducible output.
    ///
    /// Replaces the grain scheduler, so call this before fetching a [`GrainMeter`] or handle.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.scheduler = GrainScheduler::with_seed(self.controls(), seed);
        self
    }

    /// Descriptors of all parameters of the processor.
    pub fn parameters() -> Vec<Box<dyn Parameter>> {
        vec![
            Self::SPEED.dyn_clone(),
            Self::PITCH.dyn_clone(),
            Self::DENSITY.dyn_clone(),
            Self::LENGTH.dyn_clone(),
            Self::SPRAY.dyn_clone(),
            Self::SIDES.dyn_clone(),
            Self::TILT.dyn_clone(),
            Self::POSITION.dyn_clone(),
            Self::MIX.dyn_clone(),
            Self::RECORD.dyn_clone(),
        ]
    }

    /// The sample rate the processor runs at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The largest chunk size the processor renders grains with.
    pub fn max_block_frames(&self) -> usize {
        self.max_block_frames
    }

    /// Access to the recorded source buffer.
    pub fn source(&self) -> &SourceBuffer {
        &self.source
    }

    /// Mutable access to the source buffer, e.g. to load a sample into it.
    pub fn source_mut(&mut self) -> &mut SourceBuffer {
        &mut self.source
    }

    /// Access to the grain scheduler.
    pub fn scheduler(&self) -> &GrainScheduler {
        &self.scheduler
    }

    /// A handle to the shared active grain count.
    pub fn meter(&self) -> GrainMeter {
        self.scheduler.meter()
    }

    /// Create a new thread-safe handle to control the processor.
    pub fn handle(&self) -> GranularProcessorHandle {
        GranularProcessorHandle {
            message_queue: Arc::clone(&self.message_queue),
            meter: self.scheduler.meter(),
        }
    }

    /// Current plain value of a float parameter, or 0.0/1.0 for the boolean record toggle.
    pub fn parameter_value(&self, id: FourCC) -> Result<f32, Error> {
        match id {
            _ if id == Self::RECORD.id() => {
                Ok(Self::RECORD.normalize_value(self.record.value()))
            }
            _ => self
                .float_parameter(id)
                .map(FloatParameterValue::value)
                .ok_or(Error::ParameterNotFoundError(id)),
        }
    }

    /// Apply a parameter update immediately.
    pub fn set_parameter(
        &mut self,
        (id, update): (FourCC, ParameterValueUpdate),
    ) -> Result<(), Error> {
        if id == Self::RECORD.id() {
            self.record.apply_update(update);
            return Ok(());
        }
        self.float_parameter_mut(id)
            .ok_or(Error::ParameterNotFoundError(id))?
            .apply_update(update);
        Ok(())
    }

    /// Grain controls from the current parameter values.
    pub fn controls(&self) -> GrainControls {
        GrainControls {
            speed: self.speed.value(),
            pitch: self.pitch.value(),
            density: self.density.value(),
            length: self.length.value() / 1000.0,
            spray: self.spray.value() / 1000.0,
            sides: self.sides.value(),
            tilt: self.tilt.value(),
            play_head_pos: self.position.value(),
            sample_rate: self.sample_rate as f32,
        }
    }

    /// Stop all playing grains.
    pub fn reset(&mut self) {
        self.scheduler.reset();
    }

    /// Record the given input, when recording is enabled, and write the mix of the input and
    /// the grain cloud into the given output buffers.
    ///
    /// Never allocates, locks or blocks. Input and output buffers should have the same length;
    /// output frames which have no input counterpart are silenced.
    pub fn process(
        &mut self,
        input_left: &[f32],
        input_right: &[f32],
        output_left: &mut [f32],
        output_right: &mut [f32],
    ) {
        debug_assert!(
            input_left.len() == input_right.len()
                && input_left.len() == output_left.len()
                && output_left.len() == output_right.len(),
            "Input and output buffer lengths must match"
        );
        Self::assert_no_alloc(|| {
            self.process_unguarded(input_left, input_right, output_left, output_right)
        });
    }

    fn process_unguarded(
        &mut self,
        input_left: &[f32],
        input_right: &[f32],
        output_left: &mut [f32],
        output_right: &mut [f32],
    ) {
        self.process_messages();

        self.scheduler.set_controls(self.controls());
        self.source.set_recording(self.record.value());

        let wet_amount = (self.mix.value() + 100.0) / 200.0;
        let dry_amount = 1.0 - wet_amount;

        let frame_count = input_left
            .len()
            .min(input_right.len())
            .min(output_left.len())
            .min(output_right.len());

        let mut offset = 0;
        while offset < frame_count {
            let chunk_len = (frame_count - offset).min(self.max_block_frames);
            let range = offset..offset + chunk_len;

            let input_left = &input_left[range.clone()];
            let input_right = &input_right[range.clone()];
            self.source.record(input_left, input_right);

            let wet_left = &mut self.wet_left[..chunk_len];
            let wet_right = &mut self.wet_right[..chunk_len];
            wet_left.fill(0.0);
            wet_right.fill(0.0);
            self.scheduler.generate(wet_left, wet_right, &self.source);

            for ((output, input), wet) in output_left[range.clone()]
                .iter_mut()
                .zip(input_left)
                .zip(wet_left.iter())
            {
                *output = input * dry_amount + wet * wet_amount;
            }
            for ((output, input), wet) in output_right[range]
                .iter_mut()
                .zip(input_right)
                .zip(wet_right.iter())
            {
                *output = input * dry_amount + wet * wet_amount;
            }
            offset += chunk_len;
        }

        output_left[frame_count..].fill(0.0);
        output_right[frame_count..].fill(0.0);
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            match message {
                GranularProcessorMessage::SetParameter(id, update) => {
                    if let Err(err) = self.set_parameter((id, update)) {
                        Self::permit_alloc(|| {
                            log::warn!("Failed to apply parameter update: {err}");
                        });
                    }
                }
                GranularProcessorMessage::Reset => {
                    self.scheduler.set_controls(self.controls());
                    self.scheduler.reset();
                }
                GranularProcessorMessage::ClearBuffer => {
                    self.source.clear();
                }
            }
        }
    }

    fn float_parameter(&self, id: FourCC) -> Option<&FloatParameterValue> {
        match id {
            _ if id == Self::SPEED.id() => Some(&self.speed),
            _ if id == Self::PITCH.id() => Some(&self.pitch),
            _ if id == Self::DENSITY.id() => Some(&self.density),
            _ if id == Self::LENGTH.id() => Some(&self.length),
            _ if id == Self::SPRAY.id() => Some(&self.spray),
            _ if id == Self::SIDES.id() => Some(&self.sides),
            _ if id == Self::TILT.id() => Some(&self.tilt),
            _ if id == Self::POSITION.id() => Some(&self.position),
            _ if id == Self::MIX.id() => Some(&self.mix),
            _ => None,
        }
    }

    fn float_parameter_mut(&mut self, id: FourCC) -> Option<&mut FloatParameterValue> {
        match id {
            _ if id == Self::SPEED.id() => Some(&mut self.speed),
            _ if id == Self::PITCH.id() => Some(&mut self.pitch),
            _ if id == Self::DENSITY.id() => Some(&mut self.density),
            _ if id == Self::LENGTH.id() => Some(&mut self.length),
            _ if id == Self::SPRAY.id() => Some(&mut self.spray),
            _ if id == Self::SIDES.id() => Some(&mut self.sides),
            _ if id == Self::TILT.id() => Some(&mut self.tilt),
            _ if id == Self::POSITION.id() => Some(&mut self.position),
            _ if id == Self::MIX.id() => Some(&mut self.mix),
            _ => None,
        }
    }

    fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::assert_no_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }

    #[inline]
    fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
        #[cfg(feature = "assert-allocs")]
        return assert_no_alloc::permit_alloc::<T, F>(func);

        #[cfg(not(feature = "assert-allocs"))]
        return func();
    }
}

// -------------------------------------------------------------------------------------------------

/// Thread-safe, cloneable handle to a [`GranularProcessor`].
///
/// Messages are passed via a lock-free queue and get applied at the start of the next
/// processed block.
#[derive(Clone)]
pub struct GranularProcessorHandle {
    message_queue: Arc<ArrayQueue<GranularProcessorMessage>>,
    meter: GrainMeter,
}

impl GranularProcessorHandle {
    /// Queue a parameter update. Fails when the parameter is unknown or when the message
    /// queue is full.
    pub fn set_parameter(
        &self,
        (id, update): (FourCC, ParameterValueUpdate),
    ) -> Result<(), Error> {
        if !GranularProcessor::PARAMETER_IDS.contains(&id) {
            return Err(Error::ParameterNotFoundError(id));
        }
        self.send(GranularProcessorMessage::SetParameter(id, update))
    }

    /// Start or stop recording input into the source buffer.
    pub fn set_recording(&self, recording: bool) -> Result<(), Error> {
        self.set_parameter(GranularProcessor::RECORD.value_update(recording))
    }

    /// Stop all playing grains.
    pub fn reset(&self) -> Result<(), Error> {
        self.send(GranularProcessorMessage::Reset)
    }

    /// Silence the recorded source buffer.
    pub fn clear_buffer(&self) -> Result<(), Error> {
        self.send(GranularProcessorMessage::ClearBuffer)
    }

    /// Number of grains which were active at the end of the last processed block.
    pub fn active_grains(&self) -> usize {
        self.meter.active_grains()
    }

    /// A handle to the shared active grain count.
    pub fn meter(&self) -> GrainMeter {
        self.meter.clone()
    }

    fn send(&self, message: GranularProcessorMessage) -> Result<(), Error> {
        self.message_queue.push(message).map_err(|message| {
            log::warn!("Granular processor's message queue is full. Dropping {message:?}");
            Error::SendError("message queue is full".to_string())
        })
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;
    const BLOCK_SIZE: usize = 256;

    fn test_processor() -> GranularProcessor {
        GranularProcessor::new(SAMPLE_RATE, Duration::from_secs(1), BLOCK_SIZE)
            .unwrap()
            .with_seed(0x5eed)
    }

    fn process_blocks(processor: &mut GranularProcessor, input: f32, blocks: usize) -> Vec<f32> {
        let input = vec![input; BLOCK_SIZE];
        let mut output_left = vec![0.0; BLOCK_SIZE];
        let mut output_right = vec![0.0; BLOCK_SIZE];
        let mut rendered = Vec::new();
        for _ in 0..blocks {
            processor.process(&input, &input, &mut output_left, &mut output_right);
            rendered.extend_from_slice(&output_left);
        }
        rendered
    }

    #[test]
    fn creation() {
        assert!(GranularProcessor::new(0, Duration::from_secs(1), BLOCK_SIZE).is_err());
        assert!(GranularProcessor::new(SAMPLE_RATE, Duration::ZERO, BLOCK_SIZE).is_err());
        assert!(GranularProcessor::new(SAMPLE_RATE, Duration::from_secs(1), 0).is_err());

        let processor = test_processor();
        assert_eq!(processor.source().frame_count(), 44100);
        assert_eq!(processor.controls().sample_rate, 44100.0);
        assert_eq!(processor.controls().length, 0.1);
        assert_eq!(processor.controls().spray, 0.01);
        assert_eq!(*processor.scheduler().controls(), processor.controls());
    }

    #[test]
    fn parameter_descriptors() {
        let parameters = GranularProcessor::parameters();
        assert_eq!(parameters.len(), GranularProcessor::PARAMETER_IDS.len());
        for (parameter, id) in parameters.iter().zip(GranularProcessor::PARAMETER_IDS) {
            assert_eq!(parameter.id(), id);
            let normalized = parameter.default_normalized_value();
            assert!((0.0..=1.0).contains(&normalized), "{}", parameter.name());
        }
        let mut ids = GranularProcessor::PARAMETER_IDS.to_vec();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), GranularProcessor::PARAMETER_IDS.len());
    }

    #[test]
    fn parameter_updates() {
        let mut processor = test_processor();
        processor
            .set_parameter(GranularProcessor::LENGTH.value_update(250.0))
            .unwrap();
        processor
            .set_parameter((
                GranularProcessor::DENSITY.id(),
                ParameterValueUpdate::Normalized(1.0),
            ))
            .unwrap();
        processor
            .set_parameter(GranularProcessor::SPEED.value_update(-20.0))
            .unwrap();
        let controls = processor.controls();
        assert_eq!(controls.length, 0.25);
        assert_eq!(controls.density, 500.0);
        assert_eq!(controls.speed, -5.0);
        assert_eq!(
            processor.parameter_value(GranularProcessor::SPEED.id()).unwrap(),
            -5.0
        );
        assert_eq!(
            processor.parameter_value(GranularProcessor::RECORD.id()).unwrap(),
            0.0
        );

        let unknown = FourCC(*b"NOPE");
        assert!(matches!(
            processor.set_parameter((unknown, ParameterValueUpdate::Plain(1.0))),
            Err(Error::ParameterNotFoundError(id)) if id == unknown
        ));
        assert!(processor.parameter_value(unknown).is_err());
    }

    #[test]
    fn handle_messages() {
        let mut processor = test_processor();
        let handle = processor.handle();
        handle
            .set_parameter(GranularProcessor::PITCH.value_update(1.0))
            .unwrap();
        handle.set_recording(true).unwrap();
        assert!(handle
            .set_parameter((FourCC(*b"NOPE"), ParameterValueUpdate::Plain(1.0)))
            .is_err());

        // applied in audio time only
        assert_eq!(processor.controls().pitch, 0.0);
        process_blocks(&mut processor, 0.0, 1);
        assert_eq!(processor.controls().pitch, 1.0);
        assert_eq!(processor.scheduler().controls().pitch, 1.0);
        assert!(processor.source().is_recording());
    }

    #[test]
    fn full_message_queue() {
        let processor = test_processor();
        let handle = processor.handle();
        let mut results = Vec::new();
        for _ in 0..200 {
            results.push(handle.set_parameter(GranularProcessor::MIX.value_update(0.0)));
        }
        assert!(results.iter().take(128).all(Result::is_ok));
        assert!(matches!(results.last(), Some(Err(Error::SendError(_)))));
    }

    #[test]
    fn dry_signal_passes_through() {
        let mut processor = test_processor();
        processor
            .set_parameter(GranularProcessor::MIX.value_update(-100.0))
            .unwrap();
        let output = process_blocks(&mut processor, 0.5, 8);
        assert!(output.iter().all(|sample| *sample == 0.5));
    }

    #[test]
    fn records_and_plays_grains() {
        let mut processor = test_processor();
        let handle = processor.handle();
        processor
            .set_parameter(GranularProcessor::RECORD.value_update(true))
            .unwrap();
        processor
            .set_parameter(GranularProcessor::SPRAY.value_update(0.0))
            .unwrap();
        processor
            .set_parameter(GranularProcessor::DENSITY.value_update(100.0))
            .unwrap();

        // fully wet, grains play back the recorded constant input
        let output = process_blocks(&mut processor, 0.25, 16);
        assert_eq!(processor.source().write_position(), 16 * BLOCK_SIZE);
        assert!(processor.source().left()[..16 * BLOCK_SIZE]
            .iter()
            .all(|sample| *sample == 0.25));
        assert!(output.iter().any(|sample| *sample > 0.0));
        assert!(output.iter().all(|sample| sample.is_finite()));
        assert!(handle.active_grains() > 0);

        // stopping the recorder keeps the buffer content
        processor
            .set_parameter(GranularProcessor::RECORD.value_update(false))
            .unwrap();
        process_blocks(&mut processor, 1.0, 4);
        assert_eq!(processor.source().write_position(), 16 * BLOCK_SIZE);

        handle.reset().unwrap();
        handle.clear_buffer().unwrap();
        processor
            .set_parameter(GranularProcessor::DENSITY.value_update(0.1))
            .unwrap();
        let output = process_blocks(&mut processor, 0.0, 1);
        assert!(output.iter().all(|sample| *sample == 0.0));
        assert_eq!(processor.source().write_position(), 0);
    }

    #[test]
    fn large_host_blocks_are_chunked() {
        let mut processor =
            GranularProcessor::new(SAMPLE_RATE, Duration::from_millis(500), 64).unwrap();
        processor
            .set_parameter(GranularProcessor::RECORD.value_update(true))
            .unwrap();
        let input = vec![0.5; 1000];
        let mut output_left = vec![1.0; 1000];
        let mut output_right = vec![1.0; 1000];
        processor.process(&input, &input, &mut output_left, &mut output_right);
        assert_eq!(processor.source().write_position(), 1000);
        assert!(output_left.iter().all(|sample| sample.is_finite()));
        assert_eq!(processor.scheduler().trigger_count(), 0);
    }

    #[test]
    #[cfg(feature = "assert-allocs")]
    fn process_does_not_allocate() {
        let mut processor = test_processor();
        let handle = processor.handle();
        handle
            .set_parameter(GranularProcessor::DENSITY.value_update(500.0))
            .unwrap();
        handle.set_recording(true).unwrap();

        assert_no_alloc::reset_violation_count();
        process_blocks(&mut processor, 0.1, 32);
        assert_eq!(assert_no_alloc::violation_count(), 0);
    }
}
