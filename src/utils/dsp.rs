//! Common, shared DSP tools for grains.

pub mod interpolation;
pub mod window;
