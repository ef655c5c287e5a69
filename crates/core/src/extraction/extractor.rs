//! Field extraction dispatch

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use conduit_domain::ExtractionPath;
use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::aggregators::{AggregateError, AggregatorRegistry};
use super::expression::{Expression, ExpressionError};

/// Failures that make a field unusable (as opposed to "no value")
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("failed to compile expression `{source_text}`: {error}")]
    Compile { source_text: String, error: ExpressionError },

    #[error("aggregator `{operator}` failed: {error}")]
    Aggregate { operator: String, error: AggregateError },
}

/// Evaluates extraction paths, caching compiled expressions.
pub struct FieldExtractor {
    aggregators: AggregatorRegistry,
    compiled: RwLock<HashMap<String, Arc<Expression>>>,
}

impl FieldExtractor {
    #[must_use]
    pub fn new(aggregators: AggregatorRegistry) -> Self {
        Self { aggregators, compiled: RwLock::new(HashMap::new()) }
    }

    /// Extract a value.
    ///
    /// - expression: compile errors are errors, evaluation errors are "no
    ///   value"
    /// - aggregator: unknown operators are reported and yield "no value"
    /// - a JSON `null` result is "no value"
    pub fn extract(
        &self,
        path: &ExtractionPath,
        data: &Value,
        now: &DateTime<Tz>,
    ) -> Result<Option<Value>, ExtractionError> {
        let value = match path {
            ExtractionPath::Expression(source) => {
                let expression = self.compile(source)?;
                match expression.evaluate(data) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        debug!(expression = %source, error = %err, "Expression produced no value");
                        None
                    }
                }
            }
            ExtractionPath::Aggregate { operator, args } => {
                let Some(aggregator) = self.aggregators.get(operator) else {
                    warn!(operator = %operator, "Unknown aggregator");
                    return Ok(None);
                };
                aggregator
                    .evaluate(args, data, now)
                    .map_err(|error| ExtractionError::Aggregate { operator: operator.clone(), error })?
            }
        };

        Ok(value.filter(|v| !v.is_null()))
    }

    fn compile(&self, source: &str) -> Result<Arc<Expression>, ExtractionError> {
        if let Some(expression) = self.compiled.read().get(source) {
            return Ok(Arc::clone(expression));
        }

        let expression = Expression::compile(source)
            .map(Arc::new)
            .map_err(|error| ExtractionError::Compile { source_text: source.to_string(), error })?;
        self.compiled.write().insert(source.to_string(), Arc::clone(&expression));
        Ok(expression)
    }

    /// Number of distinct expressions compiled so far.
    #[must_use]
    pub fn cached_expressions(&self) -> usize {
        self.compiled.read().len()
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new(AggregatorRegistry::with_defaults())
    }
}
