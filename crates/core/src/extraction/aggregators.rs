//! Path aggregators
//!
//! Aggregators compute a value from a payload using operator-specific
//! arguments, e.g. `{"$sum": "$.laps[*].distance"}` or
//! `{"$date_time_merge": ["$.day", "$.start"]}`. Date parsing happens in the
//! user's time zone and results are epoch milliseconds.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use thiserror::Error;

use super::jsonpath::{self, PathError};
use super::number_value;

/// Aggregator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("failed to parse `{value}` as {layout}")]
    Parse { value: String, layout: &'static str },

    #[error("{value} does not exist in time zone {zone}")]
    NonexistentLocalTime { value: String, zone: String },

    #[error("invalid aggregator arguments: {0}")]
    InvalidArguments(String),
}

/// A named aggregation over a JSON payload
pub trait PathAggregator: Send + Sync {
    /// `Ok(None)` means "no value" and is not an error.
    fn evaluate(&self, args: &Value, data: &Value, now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError>;
}

/// Aggregators by operator name (without the `$` prefix)
#[derive(Clone)]
pub struct AggregatorRegistry {
    aggregators: HashMap<String, Arc<dyn PathAggregator>>,
}

impl AggregatorRegistry {
    /// Registry with no operators.
    #[must_use]
    pub fn empty() -> Self {
        Self { aggregators: HashMap::new() }
    }

    /// Registry with every built-in operator.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("sum", Sum);
        registry.register("mean", Mean);
        registry.register("len", Len);
        registry.register("div", Div);
        registry.register("date", LocalDate { layout: DATE_LAYOUT });
        registry.register("date_time", Rfc3339);
        registry.register("date_time_notz", LocalDate { layout: DATE_TIME_NOTZ_LAYOUT });
        registry.register("date_time_merge", DateTimeMerge);
        registry.register("current_time", CurrentTime);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, aggregator: impl PathAggregator + 'static) {
        self.aggregators.insert(name.into(), Arc::new(aggregator));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn PathAggregator>> {
        self.aggregators.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.aggregators.contains_key(name)
    }
}

impl Default for AggregatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

const DATE_LAYOUT: &str = "%Y-%m-%d";
const DATE_TIME_NOTZ_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const MERGED_LAYOUT: &str = "%Y-%m-%d %H:%M";

/// Array at the JSON-path in `args`; anything that is not an array is empty.
fn fetch_array(args: &Value, data: &Value) -> Result<Vec<Value>, AggregateError> {
    let Value::String(path) = args else {
        return Ok(Vec::new());
    };
    match jsonpath::select(path, data)? {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn numbers(items: &[Value]) -> impl Iterator<Item = f64> + '_ {
    items.iter().filter_map(Value::as_f64)
}

struct Sum;

impl PathAggregator for Sum {
    fn evaluate(&self, args: &Value, data: &Value, _now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let items = fetch_array(args, data)?;
        Ok(Some(number_value(numbers(&items).sum())))
    }
}

struct Mean;

impl PathAggregator for Mean {
    fn evaluate(&self, args: &Value, data: &Value, _now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let items = fetch_array(args, data)?;
        let (total, count) = numbers(&items).fold((0.0, 0_u32), |(total, count), n| (total + n, count + 1));
        if count == 0 {
            return Ok(Some(Value::from(0)));
        }
        Ok(Some(number_value(total / f64::from(count))))
    }
}

struct Len;

impl PathAggregator for Len {
    fn evaluate(&self, args: &Value, data: &Value, _now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        Ok(Some(Value::from(fetch_array(args, data)?.len())))
    }
}

/// `[path, divisor]`; a zero divisor yields `0`.
struct Div;

impl PathAggregator for Div {
    fn evaluate(&self, args: &Value, data: &Value, _now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let Some([path, divisor]) = args.as_array().map(Vec::as_slice).and_then(|a| <&[Value; 2]>::try_from(a).ok())
        else {
            return Ok(None);
        };
        let Some(divisor) = divisor.as_f64() else {
            return Ok(None);
        };
        if divisor == 0.0 {
            return Ok(Some(Value::from(0)));
        }
        let Value::String(path) = path else {
            return Ok(None);
        };
        Ok(jsonpath::select(path, data)?.as_f64().map(|n| number_value(n / divisor)))
    }
}

/// Local date or date-time string interpreted in the user's zone.
struct LocalDate {
    layout: &'static str,
}

impl PathAggregator for LocalDate {
    fn evaluate(&self, args: &Value, data: &Value, now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let Some(text) = string_at(args, data)? else {
            return Ok(None);
        };
        let naive = if self.layout == DATE_LAYOUT {
            NaiveDate::parse_from_str(&text, self.layout).map(|date| date.and_time(chrono::NaiveTime::MIN))
        } else {
            NaiveDateTime::parse_from_str(&text, self.layout)
        }
        .map_err(|_| AggregateError::Parse { value: text.clone(), layout: self.layout })?;

        local_millis(&naive, now.timezone(), &text).map(Some)
    }
}

/// RFC 3339 timestamp; the embedded offset wins over the user's zone.
struct Rfc3339;

impl PathAggregator for Rfc3339 {
    fn evaluate(&self, args: &Value, data: &Value, _now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let Some(text) = string_at(args, data)? else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&text)
            .map_err(|_| AggregateError::Parse { value: text.clone(), layout: "RFC 3339" })?;
        Ok(Some(Value::from(parsed.timestamp_millis())))
    }
}

/// `[datePath, timePath]` joined as `"YYYY-MM-DD HH:MM"`.
struct DateTimeMerge;

impl PathAggregator for DateTimeMerge {
    fn evaluate(&self, args: &Value, data: &Value, now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        let Some([date_path, time_path]) =
            args.as_array().map(Vec::as_slice).and_then(|a| <&[Value; 2]>::try_from(a).ok())
        else {
            return Err(AggregateError::InvalidArguments("expected [datePath, timePath]".to_string()));
        };
        let (Some(date), Some(time)) = (string_at(date_path, data)?, string_at(time_path, data)?) else {
            return Err(AggregateError::InvalidArguments("date and time must both be strings".to_string()));
        };

        let merged = format!("{date} {time}");
        let naive = NaiveDateTime::parse_from_str(&merged, MERGED_LAYOUT)
            .map_err(|_| AggregateError::Parse { value: merged.clone(), layout: MERGED_LAYOUT })?;
        local_millis(&naive, now.timezone(), &merged).map(Some)
    }
}

struct CurrentTime;

impl PathAggregator for CurrentTime {
    fn evaluate(&self, _args: &Value, _data: &Value, now: &DateTime<Tz>) -> Result<Option<Value>, AggregateError> {
        Ok(Some(Value::from(now.timestamp_millis())))
    }
}

/// String selected by the JSON-path in `args`; non-string values yield `None`.
fn string_at(args: &Value, data: &Value) -> Result<Option<String>, AggregateError> {
    let Value::String(path) = args else {
        return Ok(None);
    };
    Ok(match jsonpath::select(path, data)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

fn local_millis(naive: &NaiveDateTime, zone: Tz, original: &str) -> Result<Value, AggregateError> {
    zone.from_local_datetime(naive)
        .earliest()
        .map(|local| Value::from(local.timestamp_millis()))
        .ok_or_else(|| AggregateError::NonexistentLocalTime { value: original.to_string(), zone: zone.to_string() })
}
