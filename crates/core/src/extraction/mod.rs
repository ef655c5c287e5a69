//! Turning raw payloads into values
//!
//! - `jsonpath`: JSON-path selection
//! - `expression`: the expression language used by bare-string paths
//! - `aggregators`: named operators used by `{"$op": args}` paths
//! - `variables`: `[NAME]` placeholder substitution and identifier evaluation
//! - `extractor`: dispatch from an extraction path definition to the above

pub mod aggregators;
pub mod expression;
pub mod extractor;
pub mod jsonpath;
pub mod variables;

pub use aggregators::{AggregateError, AggregatorRegistry, PathAggregator};
pub use expression::{Expression, ExpressionError};
pub use extractor::{ExtractionError, FieldExtractor};
pub use jsonpath::{CompiledPath, PathError};
pub use variables::{VariableContext, VariableEvaluator, VariableLookup};

use serde_json::Value;

/// Largest float that still maps exactly onto an integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// JSON number for `n`; integral values become JSON integers.
pub(crate) fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < MAX_EXACT_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
}

/// Textual form of a scalar, without quotes and without exponent notation.
pub(crate) fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => f.to_string(),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
