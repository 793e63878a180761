use std::fmt::Display;

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// A boolean parameter descriptor.
#[derive(Debug, Clone)]
pub struct BooleanParameter {
    id: FourCC,
    name: &'static str,
    default: bool,
}

impl BooleanParameter {
    /// Create a new boolean parameter descriptor.
    pub const fn new(id: FourCC, name: &'static str, default: bool) -> Self {
        Self { id, name, default }
    }

    /// Create a plain value update for this parameter.
    #[must_use]
    pub fn value_update(&self, value: bool) -> (FourCC, ParameterValueUpdate) {
        (
            self.id,
            ParameterValueUpdate::Plain(self.normalize_value(value)),
        )
    }

    /// The parameter's identifier.
    pub const fn id(&self) -> FourCC {
        self.id
    }

    /// The parameter's default value.
    pub const fn default_value(&self) -> bool {
        self.default
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub const fn normalize_value(&self, value: bool) -> f32 {
        if value {
            1.0
        } else {
            0.0
        }
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> bool {
        normalized >= 0.5
    }

    /// Convert the given plain value to a string.
    pub fn value_to_string(&self, value: bool) -> String {
        if value {
            "ON".to_string()
        } else {
            "OFF".to_string()
        }
    }

    /// Convert the given string to a plain value.
    pub fn string_to_value(&self, string: &str) -> Option<bool> {
        let string = string.trim();
        if string.eq_ignore_ascii_case("ON") {
            Some(true)
        } else if string.eq_ignore_ascii_case("OFF") {
            Some(false)
        } else {
            string.parse::<bool>().ok()
        }
    }
}

impl Parameter for BooleanParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Boolean {
            default: self.default,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.value_to_string(self.denormalize_value(normalized))
    }

    fn string_to_normalized_value(&self, string: String) -> Option<f32> {
        let value = self.string_to_value(&string)?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

/// Holds a boolean parameter value and its description.
#[derive(Debug, Clone)]
pub struct BooleanParameterValue {
    description: BooleanParameter,
    value: bool,
}

impl BooleanParameterValue {
    /// Create a new parameter value, initialized to the parameter's default value.
    pub fn from_description(description: BooleanParameter) -> Self {
        let value = description.default_value();
        Self { value, description }
    }

    /// Access the parameter value's description.
    pub fn description(&self) -> &BooleanParameter {
        &self.description
    }

    /// Access to the current value.
    #[inline(always)]
    pub fn value(&self) -> bool {
        self.value
    }

    /// Set a new value.
    pub fn set_value(&mut self, value: bool) {
        self.value = value;
    }

    /// Applies a parameter update. Plain and normalized values >= 0.5 are true.
    pub fn apply_update(&mut self, update: ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Plain(value) | ParameterValueUpdate::Normalized(value) => {
                if !value.is_nan() {
                    self.value = self.description.denormalize_value(value);
                }
            }
        }
    }
}

impl Display for BooleanParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description.value_to_string(self.value))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: BooleanParameter = BooleanParameter::new(FourCC(*b"TREC"), "Record", false);

    #[test]
    fn conversions() {
        assert_eq!(RECORD.string_to_value(" on "), Some(true));
        assert_eq!(RECORD.string_to_value("OFF"), Some(false));
        assert_eq!(RECORD.string_to_value("true"), Some(true));
        assert_eq!(RECORD.string_to_value("maybe"), None);
        assert_eq!(RECORD.normalized_value_to_string(0.7, false), "ON");
        assert_eq!(RECORD.default_normalized_value(), 0.0);
    }

    #[test]
    fn value_updates() {
        let mut value = BooleanParameterValue::from_description(RECORD);
        assert!(!value.value());
        value.apply_update(RECORD.value_update(true).1);
        assert!(value.value());
        value.apply_update(ParameterValueUpdate::Normalized(0.2));
        assert!(!value.value());
        value.apply_update(ParameterValueUpdate::Plain(1.0));
        assert_eq!(value.to_string(), "ON");
    }
}
