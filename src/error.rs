//! Error types for variant normalization, rendering and counting.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VariantError>;

/// Errors raised while building or traversing a variant node.
#[derive(Debug, Error)]
pub enum VariantError {
    /// A variant key is not a scalar (string, bool or number).
    #[error("invalid variant key: expected a scalar, found {found}")]
    InvalidVariantKey {
        /// Shape of the offending key.
        found: &'static str,
    },

    /// An option-map key is not a scalar.
    #[error("invalid option key in group '{key}': expected a scalar, found {found}")]
    InvalidOptionKey {
        /// Variant key of the group.
        key: String,
        /// Shape of the offending option key.
        found: &'static str,
    },

    /// A group value is neither a fragment nor an option-map.
    #[error("invalid variant group '{key}': expected a string or a mapping, found {found}")]
    InvalidGroup {
        /// Variant key of the group.
        key: String,
        /// Shape of the offending value.
        found: &'static str,
    },

    /// An option entry is neither a fragment nor a nested node.
    #[error("malformed option '{key}: {option}': expected a fragment or nested variants, found {found}")]
    MalformedOption {
        /// Variant key of the group.
        key: String,
        /// Option value within the group.
        option: String,
        /// Shape of the offending entry.
        found: &'static str,
    },

    /// The combination count does not fit in a `u64`.
    #[error("possibilities overflow while counting group '{key}'")]
    PossibilitiesOverflow {
        /// Group being counted when the overflow happened.
        key: String,
    },

    /// A registry lookup named a component that was never registered.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// A component's declared combination count differs from the computed one.
    #[error("component '{component}' declares {expected} possibilities but renders {actual}")]
    PossibilitiesMismatch {
        /// Component name.
        component: String,
        /// Count declared in configuration.
        expected: u64,
        /// Count computed from the normalized variants.
        actual: u64,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VariantError {
    /// Stable error code for this error type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidVariantKey { .. } => "INVALID_VARIANT_KEY",
            Self::InvalidOptionKey { .. } => "INVALID_OPTION_KEY",
            Self::InvalidGroup { .. } => "INVALID_GROUP",
            Self::MalformedOption { .. } => "MALFORMED_OPTION",
            Self::PossibilitiesOverflow { .. } => "POSSIBILITIES_OVERFLOW",
            Self::UnknownComponent(_) => "UNKNOWN_COMPONENT",
            Self::PossibilitiesMismatch { .. } => "POSSIBILITIES_MISMATCH",
            Self::Yaml(_) => "YAML",
            Self::Json(_) => "JSON",
        }
    }

    /// Check if this error was raised while building a node, as opposed to
    /// while traversing one that was already built.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVariantKey { .. }
                | Self::InvalidOptionKey { .. }
                | Self::InvalidGroup { .. }
                | Self::Yaml(_)
                | Self::Json(_)
        )
    }
}

/// Short shape name of a YAML value, used in error messages.
pub(crate) fn shape_of(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
