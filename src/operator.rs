//! Comparison operators offered by the audience builder and the SQL templates
//! they render through.

use crate::ast::TimeUnit;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The closed set of operator keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Is,
    IsNot,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
    DoesNotContain,
    Before,
    After,
    On,
    WithinLast,
    NotWithinLast,
}

/// How many values a template consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamCount {
    One,
    /// Magnitude and unit of a relative date. The magnitude fills the `?`,
    /// the unit fills `{unit}`.
    Two,
    /// One `?` per list element, expanded into `{params}`.
    Dynamic,
}

/// A SQL fragment with an `{expr}` slot and positional `?` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub sql: &'static str,
    pub params: ParamCount,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Is,
        Operator::IsNot,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThanOrEqual,
        Operator::Contains,
        Operator::DoesNotContain,
        Operator::Before,
        Operator::After,
        Operator::On,
        Operator::WithinLast,
        Operator::NotWithinLast,
    ];

    /// Plain comparisons, the operators numeric aggregates accept.
    pub const COMPARISONS: [Operator; 6] = [
        Operator::Is,
        Operator::IsNot,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThanOrEqual,
    ];

    pub const RELATIVE_DATES: [Operator; 2] = [Operator::WithinLast, Operator::NotWithinLast];

    /// Exact, case-sensitive match on the UI key.
    pub fn parse(key: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.as_str() == key)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::GreaterThan => "is greater than",
            Operator::LessThan => "is less than",
            Operator::GreaterThanOrEqual => "is greater than or equal to",
            Operator::LessThanOrEqual => "is less than or equal to",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "does not contain",
            Operator::Before => "is before",
            Operator::After => "is after",
            Operator::On => "is on",
            Operator::WithinLast => "is within last",
            Operator::NotWithinLast => "is not within last",
        }
    }

    pub fn template(&self) -> Template {
        let (sql, params) = match self {
            Operator::Is => ("{expr} = ?", ParamCount::One),
            Operator::IsNot => ("{expr} <> ?", ParamCount::One),
            Operator::GreaterThan => ("{expr} > ?", ParamCount::One),
            Operator::LessThan => ("{expr} < ?", ParamCount::One),
            Operator::GreaterThanOrEqual => ("{expr} >= ?", ParamCount::One),
            Operator::LessThanOrEqual => ("{expr} <= ?", ParamCount::One),
            // Firebird's case-insensitive substring match
            Operator::Contains => ("{expr} CONTAINING ?", ParamCount::One),
            Operator::DoesNotContain => ("NOT ({expr} CONTAINING ?)", ParamCount::One),
            Operator::Before => ("{expr} < ?", ParamCount::One),
            Operator::After => ("{expr} > ?", ParamCount::One),
            Operator::On => ("CAST({expr} AS DATE) = ?", ParamCount::One),
            Operator::WithinLast => (
                "{expr} >= DATEADD(? {unit} TO CURRENT_TIMESTAMP)",
                ParamCount::Two,
            ),
            Operator::NotWithinLast => (
                "{expr} < DATEADD(? {unit} TO CURRENT_TIMESTAMP)",
                ParamCount::Two,
            ),
        };
        Template { sql, params }
    }

    /// Multiselect rendering; only `is` and `is not` expand to a list.
    pub fn list_template(&self) -> Option<Template> {
        let sql = match self {
            Operator::Is => "{expr} IN ({params})",
            Operator::IsNot => "{expr} NOT IN ({params})",
            _ => return None,
        };
        Some(Template {
            sql,
            params: ParamCount::Dynamic,
        })
    }

    pub fn is_relative_date(&self) -> bool {
        Operator::RELATIVE_DATES.contains(self)
    }
}

impl Template {
    /// Fills the template. `args` replace the `?` slots (or the `{params}`
    /// slot for dynamic templates) in order; each arg is either `?` or an
    /// already rendered literal.
    ///
    /// `expr` is substituted last: it may be a subquery carrying its own `?`.
    pub fn render(&self, expr: &str, unit: Option<TimeUnit>, args: &[String]) -> String {
        let sql = match self.params {
            ParamCount::Dynamic => self.sql.replace("{params}", &args.join(", ")),
            ParamCount::One | ParamCount::Two => {
                let mut out = String::with_capacity(self.sql.len());
                let mut args = args.iter();
                let mut pieces = self.sql.split('?').peekable();
                while let Some(piece) = pieces.next() {
                    out.push_str(piece);
                    if pieces.peek().is_some() {
                        match args.next() {
                            Some(arg) => out.push_str(arg),
                            None => out.push('?'),
                        }
                    }
                }
                out
            }
        };
        let sql = match unit {
            Some(unit) => sql.replace("{unit}", unit.as_sql()),
            None => sql,
        };
        sql.replace("{expr}", expr)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::parse(s).ok_or_else(|| format!("unknown operator `{}`", s))
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
