//! Scalar type definitions.

use graphplan_proto::Value;
use serde::{Deserialize, Serialize};

/// Scalar data types a member can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point.
    Float64,
    /// Fixed-precision decimal.
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Number of digits after decimal point.
        scale: u8,
    },
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarType::Int32 | ScalarType::Int64 | ScalarType::Float64 | ScalarType::Decimal { .. }
        )
    }

    /// Check whether a runtime value is acceptable for this type.
    ///
    /// Null is accepted by every type; integers are accepted by wider
    /// numeric types.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ScalarType::Bool, Value::Bool(_)) => true,
            (ScalarType::Int32, Value::Int32(_)) => true,
            (ScalarType::Int64, Value::Int32(_) | Value::Int64(_)) => true,
            (
                ScalarType::Float64 | ScalarType::Decimal { .. },
                Value::Int32(_) | Value::Int64(_) | Value::Float64(_),
            ) => true,
            (ScalarType::String, Value::String(_)) => true,
            (ScalarType::Bytes, Value::Bytes(_)) => true,
            (ScalarType::Timestamp, Value::Timestamp(_) | Value::Int64(_)) => true,
            (ScalarType::Uuid, Value::Uuid(_)) => true,
            _ => false,
        }
    }
}
