//! State specs and their validity predicates.

use serde::{Deserialize, Serialize};

use kiln_core::{KilnError, KilnResult};

use crate::value::StateValue;

/// Tolerance used when matching numbers against discrete options and steps.
const NUMBER_TOLERANCE: f64 = 1e-9;

/// The allowed values of a discrete number spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiscreteSpec {
    /// An explicit list of allowed numbers.
    Options {
        /// The allowed numbers.
        options: Vec<f64>,
    },
    /// Every `min + k * step` within `[min, max]`.
    Step {
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
        /// Increment; must be positive.
        step: f64,
    },
}

/// Declared shape of a state cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StateSpec {
    /// Any boolean.
    #[serde(rename = "bool")]
    Bool,
    /// One of a fixed set of strings.
    #[serde(rename = "enum")]
    Enum {
        /// The allowed strings.
        options: Vec<String>,
    },
    /// Any string.
    #[serde(rename = "string")]
    String,
    /// A number within `[min, max]`. With `clamp`, out-of-range values are
    /// pulled into range instead of rejected.
    #[serde(rename = "number.range")]
    NumberRange {
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
        /// Clamp instead of rejecting.
        #[serde(default)]
        clamp: bool,
    },
    /// A number from a discrete set.
    #[serde(rename = "number.discrete")]
    NumberDiscrete(DiscreteSpec),
}

impl StateSpec {
    /// Shorthand for an enum spec.
    #[must_use]
    pub fn enumeration<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    /// Shorthand for a range spec.
    #[must_use]
    pub fn range(min: f64, max: f64, clamp: bool) -> Self {
        Self::NumberRange { min, max, clamp }
    }

    /// Shorthand for a discrete spec with explicit options.
    #[must_use]
    pub fn options(options: Vec<f64>) -> Self {
        Self::NumberDiscrete(DiscreteSpec::Options { options })
    }

    /// Shorthand for a stepped discrete spec.
    #[must_use]
    pub fn stepped(min: f64, max: f64, step: f64) -> Self {
        Self::NumberDiscrete(DiscreteSpec::Step { min, max, step })
    }

    /// Spec kind name as it appears in `STATE_SPEC_VIOLATION` errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Enum { .. } => "enum",
            Self::String => "string",
            Self::NumberRange { .. } => "number.range",
            Self::NumberDiscrete(_) => "number.discrete",
        }
    }

    fn violation(&self, detail: impl Into<String>) -> KilnError {
        KilnError::state_spec(self.kind(), detail)
    }

    /// Validate `value`, returning the value to store.
    ///
    /// The returned value differs from the input only for clamping range
    /// specs.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::StateSpecViolation`] if the value does not satisfy
    /// the spec.
    pub fn validate(&self, value: StateValue) -> KilnResult<StateValue> {
        match (self, value) {
            (Self::Bool, value @ StateValue::Bool(_)) => Ok(value),
            (Self::String, value @ StateValue::String(_)) => Ok(value),
            (Self::Enum { options }, StateValue::String(s)) => {
                if options.iter().any(|o| *o == s) {
                    Ok(StateValue::String(s))
                } else {
                    Err(self.violation(format!(
                        "{s:?} is not one of [{}]",
                        options.join(", ")
                    )))
                }
            },
            (Self::NumberRange { min, max, clamp }, StateValue::Number(n)) => {
                validate_range(*min, *max, *clamp, n)
                    .map(StateValue::Number)
                    .map_err(|detail| self.violation(detail))
            },
            (Self::NumberDiscrete(discrete), StateValue::Number(n)) => {
                validate_discrete(discrete, n)
                    .map(StateValue::Number)
                    .map_err(|detail| self.violation(detail))
            },
            (_, other) => Err(self.violation(format!(
                "expected a {} value, got {} {other}",
                self.expected_type(),
                other.type_name()
            ))),
        }
    }

    fn expected_type(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Enum { .. } | Self::String => "string",
            Self::NumberRange { .. } | Self::NumberDiscrete(_) => "number",
        }
    }
}

fn validate_range(min: f64, max: f64, clamp: bool, n: f64) -> Result<f64, String> {
    if n.is_nan() {
        return Err("NaN is not a valid number".to_owned());
    }
    if (min..=max).contains(&n) {
        return Ok(n);
    }
    if clamp {
        Ok(n.clamp(min, max))
    } else {
        Err(format!("{n} is outside [{min}, {max}]"))
    }
}

fn validate_discrete(spec: &DiscreteSpec, n: f64) -> Result<f64, String> {
    if !n.is_finite() {
        return Err(format!("{n} is not a finite number"));
    }
    match spec {
        DiscreteSpec::Options { options } => {
            if options.iter().any(|o| (o - n).abs() <= NUMBER_TOLERANCE) {
                Ok(n)
            } else {
                Err(format!("{n} is not one of {options:?}"))
            }
        },
        DiscreteSpec::Step { min, max, step } => {
            if *step <= 0.0 {
                return Err(format!("step {step} must be positive"));
            }
            if !(*min..=*max).contains(&n) {
                return Err(format!("{n} is outside [{min}, {max}]"));
            }
            let steps = (n - min) / step;
            if (steps - steps.round()).abs() <= NUMBER_TOLERANCE {
                Ok(n)
            } else {
                Err(format!("{n} is not on a {step} step from {min}"))
            }
        },
    }
}
