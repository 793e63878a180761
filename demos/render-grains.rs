//! Renders a grain cloud from a synthesized chord into a wave file.

use std::{f32::consts::TAU, path::PathBuf};

use arg::{parse_args, Args};
use hound::{SampleFormat, WavSpec, WavWriter};

use fabric::{Error, GranularProcessor, SourceBuffer};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 44100;
const BLOCK_SIZE: usize = 512;

/// Source chord frequencies and amplitudes.
const PARTIALS: [(f32, f32); 4] = [(220.0, 0.4), (277.18, 0.25), (329.63, 0.25), (440.0, 0.1)];

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

// -------------------------------------------------------------------------------------------------

/// Program arguments.
#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Write the rendered grains into the given wav file. By default \"grains.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
    #[arg(short = "d", long = "density")]
    /// Grains per second. By default 40.
    density: Option<f32>,
    #[arg(short = "g", long = "grain-length")]
    /// Grain length in milliseconds. By default 80.
    grain_length: Option<f32>,
    #[arg(short = "s", long = "seconds")]
    /// Length of the rendered file in seconds. By default 10.
    seconds: Option<f32>,
    #[arg(long = "seed")]
    /// Fixed random seed for reproducible renderings.
    seed: Option<u64>,
}

// -------------------------------------------------------------------------------------------------

fn create_logger(log_level: Option<log::Level>) {
    simple_logger::SimpleLogger::new()
        .with_level(log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");
}

fn chord(seconds: f32) -> Result<SourceBuffer, Error> {
    let frame_count = (seconds * SAMPLE_RATE as f32) as usize;
    let mut left = Vec::with_capacity(frame_count);
    let mut right = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let time = frame as f32 / SAMPLE_RATE as f32;
        let (mut l, mut r) = (0.0, 0.0);
        for (index, (frequency, amplitude)) in PARTIALS.iter().enumerate() {
            // slightly detune the channels
            let detune = 1.0 + 0.002 * index as f32;
            l += amplitude * (TAU * frequency * time).sin();
            r += amplitude * (TAU * frequency * detune * time).sin();
        }
        left.push(l);
        right.push(r);
    }
    SourceBuffer::from_channels(left, right)
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<Arguments>();
    create_logger(args.log_level);

    let output_path = args
        .output_path
        .unwrap_or_else(|| PathBuf::from("grains.wav"));
    let seconds = args.seconds.unwrap_or(10.0).max(0.0);

    // Create a processor which plays grains from a two seconds long chord
    let mut processor = GranularProcessor::with_source(chord(2.0)?, SAMPLE_RATE, BLOCK_SIZE)?;
    if let Some(seed) = args.seed {
        processor = processor.with_seed(seed);
    }

    // Configure the grain cloud via a handle, as a UI thread would do
    let handle = processor.handle();
    handle.set_parameter(GranularProcessor::DENSITY.value_update(args.density.unwrap_or(40.0)))?;
    handle.set_parameter(
        GranularProcessor::LENGTH.value_update(args.grain_length.unwrap_or(80.0)),
    )?;
    handle.set_parameter(GranularProcessor::SPRAY.value_update(30.0))?;
    handle.set_parameter(GranularProcessor::SIDES.value_update(0.8))?;
    handle.set_parameter(GranularProcessor::TILT.value_update(-0.5))?;
    handle.set_parameter(GranularProcessor::MIX.value_update(100.0))?;

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output_path, spec)
        .map_err(|err| Error::OutputError(Box::new(err)))?;

    let total_frames = (seconds * SAMPLE_RATE as f32) as usize;
    let silence = vec![0.0; BLOCK_SIZE];
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];

    log::info!(
        "Rendering {seconds} seconds of grains into '{}'...",
        output_path.display()
    );
    let mut rendered = 0;
    let mut block_index = 0;
    while rendered < total_frames {
        let frames = (total_frames - rendered).min(BLOCK_SIZE);

        // slowly sweep the play head and pitch
        let time = rendered as f32 / SAMPLE_RATE as f32;
        handle.set_parameter(GranularProcessor::POSITION.value_update(time * 0.05 % 1.0))?;
        handle.set_parameter(
            GranularProcessor::PITCH.value_update((TAU * 0.1 * time).sin() * 0.5),
        )?;

        processor.process(
            &silence[..frames],
            &silence[..frames],
            &mut left[..frames],
            &mut right[..frames],
        );
        for (l, r) in left[..frames].iter().zip(&right[..frames]) {
            writer
                .write_sample(*l)
                .map_err(|err| Error::OutputError(Box::new(err)))?;
            writer
                .write_sample(*r)
                .map_err(|err| Error::OutputError(Box::new(err)))?;
        }

        if block_index % 86 == 0 {
            log::debug!(
                "{:.1}s: {} active grains ({:.0}% load)",
                time,
                handle.active_grains(),
                handle.meter().load() * 100.0
            );
        }
        rendered += frames;
        block_index += 1;
    }

    writer
        .finalize()
        .map_err(|err| Error::OutputError(Box::new(err)))?;
    log::info!("Done.");
    Ok(())
}
