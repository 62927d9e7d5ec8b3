//! Parameter schema model.
//!
//! A [`ParameterSpec`] is a closed tagged-variant description of one SQL
//! parameter. Both the argument validator and the input-schema synthesis in
//! the tool registry are driven from this value; there is no separate schema
//! library in the loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Logical parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Array,
}

/// Element type for array parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
}

impl ScalarType {
    /// JSON-schema type keyword for this scalar.
    pub fn json_type(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Float => "number",
            ScalarType::Boolean => "boolean",
        }
    }
}

impl ParamType {
    /// JSON-schema type keyword for this type.
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
        }
    }
}

/// Declarative description of one SQL parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    /// Parameter name; matches `:name` placeholders in the statement.
    pub name: String,

    /// Logical type.
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Human description, surfaced to the agent in the input schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Default value, used when the argument is absent. A default satisfies
    /// requiredness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Explicit requiredness. Absent means required unless a default exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Element type. Mandatory for arrays, forbidden otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ScalarType>,

    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Minimum length (string chars or array elements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length (string chars or array elements).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regex the value must match. Strings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Enumeration of allowed values. Scalar types only, never booleans.
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<Value>>,
}

impl ParameterSpec {
    /// Minimal spec of the given type, for programmatic construction.
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            default: None,
            required: None,
            item_type: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
            allowed_values: None,
        }
    }

    /// Whether an argument must be supplied (or defaulted) at call time.
    ///
    /// `required: false` with no default makes the parameter optional; any
    /// other combination is effectively required, and a default satisfies
    /// the requirement.
    pub fn is_required(&self) -> bool {
        match self.required {
            Some(false) => false,
            _ => true,
        }
    }

    /// Validate the spec's own invariants.
    pub fn validate(&self, tool: &str) -> Result<(), ConfigError> {
        let at = |msg: String| ConfigError::invalid(format!("tool '{tool}': {msg}"));

        if self.name.trim().is_empty() {
            return Err(at("parameter with empty name".into()));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(at(format!(
                "parameter '{}': name must be alphanumeric/underscore",
                self.name
            )));
        }

        match self.param_type {
            ParamType::Array => {
                if self.item_type.is_none() {
                    return Err(at(format!(
                        "array parameter '{}' requires itemType",
                        self.name
                    )));
                }
            }
            _ => {
                if self.item_type.is_some() {
                    return Err(at(format!(
                        "parameter '{}': itemType is only valid for arrays",
                        self.name
                    )));
                }
            }
        }

        if self.pattern.is_some() && self.param_type != ParamType::String {
            return Err(at(format!(
                "parameter '{}': pattern is only valid for strings",
                self.name
            )));
        }
        if let Some(pattern) = &self.pattern {
            regex::Regex::new(pattern).map_err(|e| {
                at(format!(
                    "parameter '{}': invalid pattern: {e}",
                    self.name
                ))
            })?;
        }

        if self.allowed_values.is_some()
            && matches!(self.param_type, ParamType::Boolean | ParamType::Array)
        {
            return Err(at(format!(
                "parameter '{}': enum is only valid for scalar string/numeric types",
                self.name
            )));
        }
        if let Some(values) = &self.allowed_values {
            if values.is_empty() {
                return Err(at(format!(
                    "parameter '{}': enum must not be empty",
                    self.name
                )));
            }
        }

        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(at(format!(
                    "parameter '{}': min {min} exceeds max {max}",
                    self.name
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(at(format!(
                    "parameter '{}': minLength {min} exceeds maxLength {max}",
                    self.name
                )));
            }
        }

        Ok(())
    }
}
