//! The field dictionary: every filterable property, how the audience builder
//! presents it, and which resolver turns it into SQL.
//!
//! Resolution is chosen here and only here. A property is either a direct
//! column comparison ([`FilterKind::DirectColumn`]) or one of the specialized
//! kinds whose SQL needs aggregation or an existence check over a one-to-many
//! relation. The compiler dispatches on [`FilterKind`] alone.

use crate::operator::Operator;
use crate::schema::{View, BASE_ALIAS, BASE_VIEW};
use crate::status;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Boolean,
}

/// Where the builder lists a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Section {
    General,
    Membership,
}

/// A column reachable from the customer view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    pub view: View,
    pub alias: &'static str,
    pub column: &'static str,
    /// Joins that make `alias` available from `V_CUSTOMER c`.
    pub joins: &'static [&'static str],
}

impl ColumnRef {
    /// `alias.column`, using the base alias when the column lives on the base view.
    pub fn expr(&self) -> String {
        let table_ref = if self.view == BASE_VIEW {
            BASE_ALIAS
        } else {
            self.alias
        };
        format!("{}.{}", table_ref, self.column)
    }
}

/// Counting subqueries compared against a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitAggregate {
    /// Real visits over the last 12 months, per month.
    MonthlyAverage,
    /// Real visits within a caller-chosen number of days.
    Recent,
    /// Real visits, ever.
    Total,
    /// Declined automatic recharges over the last 7 days.
    FailedRecharges,
}

/// Existence of a related row dated inside a relative window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    LastWash,
    FirstVisit,
    LastCharge,
    Cancellation,
    JoinDate,
}

impl DateWindow {
    /// Only last wash and join date follow the filter's `timeUnit`; the other
    /// windows are always counted in days.
    pub fn uses_time_unit(&self) -> bool {
        matches!(self, DateWindow::LastWash | DateWindow::JoinDate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    DirectColumn(ColumnRef),
    VisitAggregate(VisitAggregate),
    DateWindow(DateWindow),
    /// "Is a member": any membership record at all.
    BooleanExistence,
    /// Current membership status, via the status code table.
    StatusLookup,
    /// Membership plan names, matched through the plan type relation.
    MultiselectRelation,
}

/// Choices offered for a multiselect property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choices {
    None,
    Fixed(&'static [&'static str]),
    StatusLabels,
}

impl Choices {
    pub fn to_vec(&self) -> Vec<&'static str> {
        match self {
            Choices::None => Vec::new(),
            Choices::Fixed(options) => options.to_vec(),
            Choices::StatusLabels => status::labels().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldEntry {
    pub label: &'static str,
    pub section: Section,
    pub field_type: FieldType,
    pub operators: &'static [Operator],
    pub choices: Choices,
    pub kind: FilterKind,
}

impl FieldEntry {
    pub fn supports(&self, op: Operator) -> bool {
        self.operators.contains(&op)
    }
}

const COMPARISONS: &[Operator] = &Operator::COMPARISONS;
const RELATIVE_DATES: &[Operator] = &Operator::RELATIVE_DATES;
const EQUALITY: &[Operator] = &[Operator::Is, Operator::IsNot];
const ALL_OPERATORS: &[Operator] = &Operator::ALL;

pub const PLAN_NAMES: &[&str] = &[
    "Unl Taxi Basic",
    "Unl Taxi Carnauba",
    "Unl Taxi Graphene",
    "Unl Taxi Super",
    "Unlimited Basic",
    "Unlimited Carnauba",
    "Unlimited Graphene",
    "Unlimited Super",
];

const SALE_JOINS: &[&str] = &[
    "JOIN V_CUSTOMERCODE cc ON cc.CUSTOMER = c.OBJID",
    "JOIN V_SALE sale ON sale.CUSTOMERCODE = cc.OBJID",
];

static FIELDS: &[FieldEntry] = &[
    FieldEntry {
        label: "Average visits",
        section: Section::General,
        field_type: FieldType::Number,
        operators: COMPARISONS,
        choices: Choices::None,
        kind: FilterKind::VisitAggregate(VisitAggregate::MonthlyAverage),
    },
    // older saved segments use this label
    FieldEntry {
        label: "Membership average visits",
        section: Section::General,
        field_type: FieldType::Number,
        operators: COMPARISONS,
        choices: Choices::None,
        kind: FilterKind::VisitAggregate(VisitAggregate::MonthlyAverage),
    },
    FieldEntry {
        label: "Recent visits",
        section: Section::General,
        field_type: FieldType::Number,
        operators: COMPARISONS,
        choices: Choices::None,
        kind: FilterKind::VisitAggregate(VisitAggregate::Recent),
    },
    FieldEntry {
        label: "Total visits",
        section: Section::General,
        field_type: FieldType::Number,
        operators: COMPARISONS,
        choices: Choices::None,
        kind: FilterKind::VisitAggregate(VisitAggregate::Total),
    },
    FieldEntry {
        label: "Last wash date",
        section: Section::General,
        field_type: FieldType::Date,
        operators: RELATIVE_DATES,
        choices: Choices::None,
        kind: FilterKind::DateWindow(DateWindow::LastWash),
    },
    FieldEntry {
        label: "First visit",
        section: Section::General,
        field_type: FieldType::Date,
        operators: RELATIVE_DATES,
        choices: Choices::None,
        kind: FilterKind::DateWindow(DateWindow::FirstVisit),
    },
    FieldEntry {
        label: "Is a member",
        section: Section::General,
        field_type: FieldType::Boolean,
        operators: EQUALITY,
        choices: Choices::None,
        kind: FilterKind::BooleanExistence,
    },
    FieldEntry {
        label: "Last name",
        section: Section::General,
        field_type: FieldType::Text,
        operators: ALL_OPERATORS,
        choices: Choices::None,
        kind: FilterKind::DirectColumn(ColumnRef {
            view: View::Customer,
            alias: "c",
            column: "LASTNAME",
            joins: &[],
        }),
    },
    FieldEntry {
        label: "Membership join date",
        section: Section::Membership,
        field_type: FieldType::Date,
        operators: RELATIVE_DATES,
        choices: Choices::None,
        kind: FilterKind::DateWindow(DateWindow::JoinDate),
    },
    FieldEntry {
        label: "Membership plan name",
        section: Section::Membership,
        field_type: FieldType::Text,
        operators: EQUALITY,
        choices: Choices::Fixed(PLAN_NAMES),
        kind: FilterKind::MultiselectRelation,
    },
    FieldEntry {
        label: "Membership status",
        section: Section::Membership,
        field_type: FieldType::Text,
        operators: EQUALITY,
        choices: Choices::StatusLabels,
        kind: FilterKind::StatusLookup,
    },
    FieldEntry {
        label: "Membership last charge date",
        section: Section::Membership,
        field_type: FieldType::Date,
        operators: RELATIVE_DATES,
        choices: Choices::None,
        kind: FilterKind::DateWindow(DateWindow::LastCharge),
    },
    FieldEntry {
        label: "Membership failed recharge attempts",
        section: Section::Membership,
        field_type: FieldType::Number,
        operators: COMPARISONS,
        choices: Choices::None,
        kind: FilterKind::VisitAggregate(VisitAggregate::FailedRecharges),
    },
    FieldEntry {
        label: "Membership cancellation date",
        section: Section::Membership,
        field_type: FieldType::Date,
        operators: RELATIVE_DATES,
        choices: Choices::None,
        kind: FilterKind::DateWindow(DateWindow::Cancellation),
    },
    // Joins straight onto the sales, so a customer appears once per sale.
    FieldEntry {
        label: "Membership last wash date",
        section: Section::Membership,
        field_type: FieldType::Date,
        operators: ALL_OPERATORS,
        choices: Choices::None,
        kind: FilterKind::DirectColumn(ColumnRef {
            view: View::Sale,
            alias: "sale",
            column: "LOGDATE",
            joins: SALE_JOINS,
        }),
    },
];

pub fn lookup(property: &str) -> Option<&'static FieldEntry> {
    FIELDS.iter().find(|entry| entry.label == property)
}

pub fn entries() -> &'static [FieldEntry] {
    FIELDS
}
