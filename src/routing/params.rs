//! Parameter codecs.
//!
//! # Responsibilities
//! - Declare per-parameter required/default/serialize/deserialize contracts
//! - Turn raw captured strings (path + query) into typed values
//! - Turn typed values back into raw strings for pathname construction
//!
//! # Design Decisions
//! - Typed values are `serde_json::Value`, so trees stay dynamically typed and
//!   resolved routes serialize as-is
//! - Failures are returned as `ParamError`; the resolver treats them as a
//!   non-matching branch
//! - The flag codec is lossy on purpose: `false` and "absent" serialize the same

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// Raw parameter strings as captured from a pathname or query.
pub type RawParams = BTreeMap<String, String>;

/// Typed parameter values.
pub type Params = BTreeMap<String, Value>;

type SerializeFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type DeserializeFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Parameter codec failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("missing required parameter '{0}'")]
    MissingRequiredParam(String),

    #[error("invalid value '{value}' for parameter '{name}': {reason}")]
    Invalid {
        name: String,
        value: String,
        reason: String,
    },
}

/// Contract for one named parameter.
#[derive(Clone)]
pub struct ParamSpec {
    name: String,
    required: bool,
    default: Option<Value>,
    serialize: SerializeFn,
    deserialize: DeserializeFn,
}

impl ParamSpec {
    /// A parameter with caller-supplied codec functions.
    pub fn custom<S, D>(name: impl Into<String>, serialize: S, deserialize: D) -> Self
    where
        S: Fn(&Value) -> Option<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            required: false,
            default: None,
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }

    /// Plain string parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::custom(name, |v| Some(value_to_raw(v)), |s| Ok(Value::String(s.to_string())))
    }

    /// Numeric parameter. Integers deserialize to integers, anything else
    /// parseable as a finite float to a float.
    pub fn number(name: impl Into<String>) -> Self {
        Self::custom(
            name,
            |v| Some(value_to_raw(v)),
            |s| {
                if let Ok(i) = s.parse::<i64>() {
                    return Ok(Value::from(i));
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| "not a number".to_string())
            },
        )
    }

    /// Presence flag.
    ///
    /// Lossy by contract: `true` serializes to the empty string, while `false`
    /// and absence both serialize to "absent"; any present value (even
    /// `"false"`) deserializes to `true`. Callers depend on this asymmetry.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::custom(
            name,
            |v| match v {
                Value::Bool(true) => Some(String::new()),
                _ => None,
            },
            |_| Ok(Value::Bool(true)),
        )
    }

    /// Replace the codec functions, keeping name, required flag and default.
    pub fn with_codec<S, D>(mut self, serialize: S, deserialize: D) -> Self
    where
        S: Fn(&Value) -> Option<String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.serialize = Arc::new(serialize);
        self.deserialize = Arc::new(deserialize);
        self
    }

    /// Mark the parameter as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when the parameter is absent.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Decode one raw value.
    pub fn deserialize(&self, raw: &str) -> Result<Value, ParamError> {
        (self.deserialize)(raw).map_err(|reason| ParamError::Invalid {
            name: self.name.clone(),
            value: raw.to_string(),
            reason,
        })
    }

    /// Encode one typed value; `None` means "leave the parameter out".
    pub fn serialize(&self, value: &Value) -> Option<String> {
        (self.serialize)(value)
    }
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("name", &self.name)
            .field("required", &self.required)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Decode `raw` with `specs`. Parameters no spec mentions pass through as strings.
pub fn deserialize_all(specs: &[ParamSpec], raw: &RawParams) -> Result<Params, ParamError> {
    let mut typed: Params = raw
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    for spec in specs {
        match raw.get(&spec.name) {
            Some(value) => {
                typed.insert(spec.name.clone(), spec.deserialize(value)?);
            }
            None => match &spec.default {
                Some(default) => {
                    typed.insert(spec.name.clone(), default.clone());
                }
                None if spec.required => {
                    return Err(ParamError::MissingRequiredParam(spec.name.clone()));
                }
                None => {}
            },
        }
    }

    Ok(typed)
}

/// Encode `typed` with `specs`. Inverse of [`deserialize_all`].
pub fn serialize_all(specs: &[ParamSpec], typed: &Params) -> Result<RawParams, ParamError> {
    let mut raw = RawParams::new();

    for (name, value) in typed {
        let encoded = match specs.iter().find(|s| &s.name == name) {
            Some(spec) => spec.serialize(value),
            None => Some(value_to_raw(value)),
        };
        if let Some(encoded) = encoded {
            raw.insert(name.clone(), encoded);
        }
    }

    for spec in specs {
        if spec.required && spec.default.is_none() && !typed.contains_key(&spec.name) {
            return Err(ParamError::MissingRequiredParam(spec.name.clone()));
        }
    }

    Ok(raw)
}

fn value_to_raw(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
