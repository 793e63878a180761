// -------------------------------------------------------------------------------------------------

/// Scaling for float parameters, applied to convert normalized UI or automation values to
/// the internal values.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub enum ParameterScaling {
    #[default]
    /// Linear scaling: `y = x` (no transformation applied)
    Linear,

    /// Exponential scaling: `y = x^factor`
    /// Factor must be > 0.0.
    ///
    /// Values > 1.0 spend more of the normalized range on small values, which suits
    /// rates and durations such as grain density or length.
    Exponential(f32),
}

impl ParameterScaling {
    /// Apply scaling to a normalized f32 value.
    pub fn scale(&self, value: f32) -> f32 {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "Expecting a normalized value here"
        );
        match self {
            ParameterScaling::Linear => value,
            ParameterScaling::Exponential(factor) => value.powf(*factor),
        }
    }

    /// Apply inverse scaling to a normalized f32 value.
    pub fn unscale(&self, value: f32) -> f32 {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "Expecting a normalized value here"
        );
        match self {
            ParameterScaling::Linear => value,
            ParameterScaling::Exponential(factor) => value.powf(1.0 / *factor),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling() {
        let linear = ParameterScaling::Linear;
        assert_eq!(linear.scale(0.25), 0.25);
        assert_eq!(linear.unscale(0.25), 0.25);

        let exponential = ParameterScaling::Exponential(2.0);
        assert_eq!(exponential.scale(0.0), 0.0);
        assert_eq!(exponential.scale(0.5), 0.25);
        assert_eq!(exponential.scale(1.0), 1.0);
        assert!((exponential.unscale(0.25) - 0.5).abs() < 1e-6);
        for value in [0.0, 0.1, 0.33, 0.8, 1.0] {
            assert!((exponential.unscale(exponential.scale(value)) - value).abs() < 1e-5);
        }
    }
}
