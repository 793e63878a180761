#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod buffer;
mod control;
mod error;
mod grain;
mod meter;
mod parameter;
mod processor;
mod scheduler;

// public, flat re-exports
pub use error::Error;

pub use buffer::SourceBuffer;
pub use control::GrainControls;
pub use grain::{Grain, WindowShape};
pub use meter::GrainMeter;
pub use processor::{GranularProcessor, GranularProcessorHandle, GranularProcessorMessage};
pub use scheduler::{GrainScheduler, MAX_GRAINS};

// public mods
pub mod utils;

pub mod parameters {
    //! Parameter descriptors of the [`GranularProcessor`](super::GranularProcessor).

    pub use super::parameter::{
        BooleanParameter, BooleanParameterValue, ClonableParameter, FloatParameter,
        FloatParameterValue, Parameter, ParameterScaling, ParameterType, ParameterValueUpdate,
    };
}

// -------------------------------------------------------------------------------------------------

#[cfg(all(test, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;
