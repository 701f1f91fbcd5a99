//! Filter input model, deserialized straight from the audience builder payload.

use sea_query::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One user-specified condition, e.g. `Average visits` `is greater than` `3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterInput {
    pub property: String,
    /// Kept as raw text so an unknown operator drops one filter instead of
    /// failing the whole payload.
    pub operator: String,
    #[serde(default)]
    pub value: Option<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,
}

impl FilterInput {
    pub fn new(
        property: impl Into<String>,
        operator: impl Into<String>,
        value: FilterValue,
    ) -> Self {
        Self {
            property: property.into(),
            operator: operator.into(),
            value: Some(value),
            time_unit: None,
        }
    }

    pub fn with_time_unit(mut self, unit: impl Into<String>) -> Self {
        self.time_unit = Some(unit.into());
        self
    }
}

/// The value half of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Multiselect choices. Listed before `Window` because serde would also
    /// accept a two element array as a struct.
    List(Vec<Scalar>),
    /// `{ "count": 3, "days": 30 }`, only meaningful for "Recent visits".
    Window(VisitWindow),
    Scalar(Scalar),
}

impl FilterValue {
    pub fn text(s: impl Into<String>) -> Self {
        FilterValue::Scalar(Scalar::Text(s.into()))
    }

    pub fn number(n: f64) -> Self {
        FilterValue::Scalar(Scalar::Number(n))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::List(items.into_iter().map(|s| Scalar::Text(s.into())).collect())
    }

    pub fn window(count: f64, days: f64) -> Self {
        FilterValue::Window(VisitWindow {
            count: Some(Scalar::Number(count)),
            days: Some(Scalar::Number(days)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitWindow {
    #[serde(default)]
    pub count: Option<Scalar>,
    #[serde(default)]
    pub days: Option<Scalar>,
}

/// A single JSON scalar. The UI sends numeric inputs as strings, so numbers
/// are parsed out of `Text` on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Scalar::Number(n) => *n,
            Scalar::Text(s) => s.trim().parse::<f64>().ok()?,
            Scalar::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        };
        n.is_finite().then_some(n)
    }

    /// `true` and `"true"` both count.
    pub fn is_true(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Text(s) => s == "true",
            Scalar::Number(_) => false,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Text(s) if s.trim().is_empty())
    }

    /// Converts into a bind parameter, keeping integral numbers integral.
    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Bool(b) => Value::Bool(Some(*b)),
            Scalar::Number(n) => number_value(*n),
            Scalar::Text(s) => Value::String(Some(Box::new(s.clone()))),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", format_number(*n)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Interval unit accepted by `DATEADD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Normalizes a UI unit (`days`, `Months`, `week`) by uppercasing and
    /// stripping one trailing `S`. A missing unit means days.
    pub fn parse(unit: Option<&str>) -> Option<TimeUnit> {
        let Some(unit) = unit else {
            return Some(TimeUnit::Day);
        };
        let upper = unit.trim().to_uppercase();
        match upper.strip_suffix('S').unwrap_or(upper.as_str()) {
            "DAY" => Some(TimeUnit::Day),
            "WEEK" => Some(TimeUnit::Week),
            "MONTH" => Some(TimeUnit::Month),
            "YEAR" => Some(TimeUnit::Year),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            TimeUnit::Day => "DAY",
            TimeUnit::Week => "WEEK",
            TimeUnit::Month => "MONTH",
            TimeUnit::Year => "YEAR",
        }
    }
}

pub(crate) fn number_value(n: f64) -> Value {
    if is_integral(n) {
        Value::BigInt(Some(n as i64))
    } else {
        Value::Double(Some(n))
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 9.0e15
}
