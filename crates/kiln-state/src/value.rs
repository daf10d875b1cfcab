//! Dynamically typed state values and the Rust types that map onto them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value stored in a state cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// `bool` specs.
    Bool(bool),
    /// Numeric specs.
    Number(f64),
    /// `string` and `enum` specs.
    String(String),
}

impl StateValue {
    /// Short name of the value's type, used in violation messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<StateValue> for serde_json::Value {
    fn from(value: StateValue) -> Self {
        match value {
            StateValue::Bool(b) => Self::Bool(b),
            StateValue::Number(n) => {
                serde_json::Number::from_f64(n).map_or(Self::Null, Self::Number)
            },
            StateValue::String(s) => Self::String(s),
        }
    }
}

/// A Rust type that can live in a state cell.
pub trait StateType: Clone + Send + Sync + 'static {
    /// Convert into the stored representation.
    fn into_value(self) -> StateValue;

    /// Convert back from the stored representation.
    fn from_value(value: &StateValue) -> Option<Self>;
}

impl StateType for bool {
    fn into_value(self) -> StateValue {
        StateValue::Bool(self)
    }

    fn from_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl StateType for f64 {
    fn into_value(self) -> StateValue {
        StateValue::Number(self)
    }

    fn from_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl StateType for String {
    fn into_value(self) -> StateValue {
        StateValue::String(self)
    }

    fn from_value(value: &StateValue) -> Option<Self> {
        match value {
            StateValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl StateType for StateValue {
    fn into_value(self) -> StateValue {
        self
    }

    fn from_value(value: &StateValue) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_conversion() {
        assert_eq!(
            serde_json::Value::from(StateValue::Number(1.5)),
            serde_json::json!(1.5)
        );
        assert_eq!(
            serde_json::Value::from(StateValue::Number(f64::NAN)),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_string(&StateValue::String("on".into())).unwrap(),
            "\"on\""
        );
    }

    #[test]
    fn test_typed_round_trip_rejects_other_types() {
        assert_eq!(bool::from_value(&true.into_value()), Some(true));
        assert_eq!(f64::from_value(&StateValue::Bool(true)), None);
        assert_eq!(String::from_value(&StateValue::Number(2.0)), None);
    }
}
