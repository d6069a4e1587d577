use std::fmt;

/// A categorical value supplied at the boundary that is not one of the allowed variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEnumValue {
    pub field: &'static str,
    pub value: String,
    pub allowed: &'static [&'static str],
}

impl InvalidEnumValue {
    pub fn new(field: &'static str, value: &str, allowed: &'static [&'static str]) -> Self {
        Self {
            field,
            value: value.to_string(),
            allowed,
        }
    }
}

impl fmt::Display for InvalidEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}: {:?} (must be one of {})",
            self.field,
            self.value,
            self.allowed.join(", ")
        )
    }
}

impl std::error::Error for InvalidEnumValue {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_field_value_and_allowed_set() {
        let err = InvalidEnumValue::new("stance", "maybe", &["buy", "hold"]);
        assert_eq!(
            err.to_string(),
            "invalid stance: \"maybe\" (must be one of buy, hold)"
        );
    }
}
