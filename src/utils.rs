//! Stateless helpers shared by the grain engine.

pub mod dsp;
