//! URL/identifier templating
//!
//! Templates contain `[NAME]` placeholders. Built-in names resolve to dates
//! relative to the user's "now"; integration options with the same name take
//! precedence. Substituted values are query-escaped, unknown placeholders are
//! left untouched.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, TimeZone};
use chrono_tz::Tz;
use conduit_domain::constants::{
    VAR_DATE, VAR_DATE_TIME, VAR_DATE_TIME_MIDNIGHT, VAR_DATE_TIME_TOMORROW_MIDNIGHT, VAR_DATE_TOMORROW,
    VAR_END, VAR_START,
};
use conduit_domain::{ConduitError, Result};
use serde_json::Value;

use super::{jsonpath, plain_string};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Instants a template is evaluated against, all in the user's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableContext {
    pub now: DateTime<Tz>,
    pub range_start: DateTime<Tz>,
    pub range_end: DateTime<Tz>,
}

impl VariableContext {
    /// Context whose range collapses to `now`.
    #[must_use]
    pub const fn at(now: DateTime<Tz>) -> Self {
        Self { now, range_start: now, range_end: now }
    }

    #[must_use]
    pub const fn with_range(now: DateTime<Tz>, range_start: DateTime<Tz>, range_end: DateTime<Tz>) -> Self {
        Self { now, range_start, range_end }
    }
}

/// Computes the value of one built-in placeholder.
pub type VariableLookup = Arc<dyn Fn(&VariableContext) -> Result<String> + Send + Sync>;

/// Placeholder substitution engine
#[derive(Clone)]
pub struct VariableEvaluator {
    variables: HashMap<String, VariableLookup>,
}

impl VariableEvaluator {
    /// Evaluator without built-in variables.
    #[must_use]
    pub fn empty() -> Self {
        Self { variables: HashMap::new() }
    }

    /// Evaluator with the date variables every definition may use.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(VAR_DATE, |ctx| Ok(ctx.now.format(DATE_FORMAT).to_string()))
            .register(VAR_DATE_TIME, |ctx| Ok(rfc3339(&ctx.now)))
            .register(VAR_DATE_TIME_MIDNIGHT, |ctx| local_midnight(ctx.now.date_naive(), ctx.now.timezone()))
            .register(VAR_DATE_TIME_TOMORROW_MIDNIGHT, |ctx| local_midnight(next_day(&ctx.now)?, ctx.now.timezone()))
            .register(VAR_DATE_TOMORROW, |ctx| Ok(next_day(&ctx.now)?.format(DATE_FORMAT).to_string()))
            .register(VAR_START, |ctx| Ok(ctx.range_start.format(DATE_FORMAT).to_string()))
            .register(VAR_END, |ctx| Ok(ctx.range_end.format(DATE_FORMAT).to_string()))
    }

    #[must_use]
    pub fn register<F>(mut self, name: &str, lookup: F) -> Self
    where
        F: Fn(&VariableContext) -> Result<String> + Send + Sync + 'static,
    {
        self.variables.insert(name.to_string(), Arc::new(lookup));
        self
    }

    /// Substitute every known `[NAME]` in `template`.
    pub fn replace_variables(
        &self,
        template: &str,
        options: &HashMap<String, String>,
        context: &VariableContext,
    ) -> Result<String> {
        let mut result = template.to_string();

        for (name, lookup) in &self.variables {
            if options.contains_key(name) {
                continue;
            }
            let placeholder = format!("[{name}]");
            if result.contains(&placeholder) {
                result = result.replace(&placeholder, &query_escape(&lookup(context)?));
            }
        }
        for (name, value) in options {
            result = result.replace(&format!("[{name}]"), &query_escape(value));
        }

        Ok(result)
    }

    /// Resolve an identifier template against a payload.
    ///
    /// Placeholders are substituted first; if the result is a JSON-path it is
    /// evaluated against `data` and the selected value is rendered as plain
    /// text. Path failures are errors.
    pub fn evaluate_identifier(
        &self,
        identifier: &str,
        options: &HashMap<String, String>,
        data: &Value,
        now: &DateTime<Tz>,
    ) -> Result<String> {
        let substituted = self.replace_variables(identifier, options, &VariableContext::at(*now))?;
        if !substituted.starts_with('$') {
            return Ok(substituted);
        }

        match jsonpath::select(&substituted, data) {
            Ok(Value::Null) => {
                Err(ConduitError::Validation(format!("identifier `{substituted}` resolved to null")))
            }
            Ok(value) => Ok(plain_string(&value)),
            Err(err) => Err(ConduitError::Validation(err.to_string())),
        }
    }
}

impl Default for VariableEvaluator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Form-style query escaping: spaces become `+`, everything outside the
/// unreserved set is percent-encoded.
fn query_escape(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

fn rfc3339(instant: &DateTime<Tz>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn next_day(now: &DateTime<Tz>) -> Result<NaiveDate> {
    now.date_naive()
        .checked_add_days(Days::new(1))
        .ok_or_else(|| ConduitError::Internal(format!("no day after {now}")))
}

fn local_midnight(date: NaiveDate, zone: Tz) -> Result<String> {
    zone.from_local_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .earliest()
        .map(|midnight| rfc3339(&midnight))
        .ok_or_else(|| ConduitError::Validation(format!("midnight of {date} does not exist in {zone}")))
}
