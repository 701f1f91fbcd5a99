//! SQL compiler that turns audience builder filters into one parameterized
//! Firebird query over the customer view.
//!
//! Each filter is resolved on its own into a [`Clause`] (WHERE fragment, bound
//! parameters, required joins) or an [`UnresolvedFilterReason`]. Resolved
//! clauses are AND-combined; unresolved filters are reported as warnings and
//! otherwise ignored, so a segment always compiles to runnable SQL.

use crate::ast::{format_number, number_value, FilterInput, FilterValue, Scalar, TimeUnit};
use crate::config::CompilerConfig;
use crate::dictionary::{self, ColumnRef, DateWindow, FilterKind, VisitAggregate};
use crate::operator::Operator;
use crate::schema::{
    customer_memberships, customer_sales, quote_literal, Subquery, View, BASE_ALIAS,
    BASE_KEY, BASE_VIEW, SALE_STATUS_RECHARGED, SALE_STATUS_RECHARGE_FAILED,
};
use crate::status;
use itertools::Itertools;
use sea_query::{Iden, Value, Values};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

const NO_JOINS: &[&str] = &[];

/// Why a filter contributed nothing to the query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnresolvedFilterReason {
    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("operator `{operator}` is not supported for `{property}`")]
    UnsupportedOperator { property: String, operator: Operator },

    #[error("no values selected")]
    EmptySelection,

    #[error("no value supplied")]
    MissingValue,

    #[error("no recognised membership status in {0:?}")]
    UnknownStatus(Vec<String>),

    #[error("value has the wrong shape for this property")]
    InvalidValue,
}

/// A filter that was dropped, with its position in the input.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("filter {index} ({property}) ignored: {reason}")]
pub struct UnresolvedFilter {
    pub index: usize,
    pub property: String,
    #[serde(serialize_with = "serialize_reason")]
    pub reason: UnresolvedFilterReason,
}

fn serialize_reason<S: serde::Serializer>(
    reason: &UnresolvedFilterReason,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(reason)
}

/// The SQL contributed by one resolved filter.
#[derive(Debug, Clone)]
pub struct Clause {
    pub sql: String,
    pub params: Vec<Value>,
    pub joins: &'static [&'static str],
}

/// Output of a compilation, ready for a parameterized executor.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub sql: String,
    /// Positional values for the `?` placeholders in `sql`.
    pub params: Values,
    pub from_view: String,
    pub warnings: Vec<UnresolvedFilter>,
}

/// Collects bind parameters for one clause, or writes numbers inline when
/// configured to.
struct Binder {
    inline_numbers: bool,
    params: Vec<Value>,
}

impl Binder {
    fn new(inline_numbers: bool) -> Self {
        Self {
            inline_numbers,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        "?".to_string()
    }

    fn number(&mut self, n: f64) -> String {
        if self.inline_numbers {
            format_number(n)
        } else {
            self.bind(number_value(n))
        }
    }

    fn integer(&mut self, n: i64) -> String {
        if self.inline_numbers {
            n.to_string()
        } else {
            self.bind(Value::BigInt(Some(n)))
        }
    }
}

/// SQL Compiler that converts segment filters to SQL queries
#[derive(Debug, Clone, Default)]
pub struct SqlCompiler {
    config: CompilerConfig,
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Compile an ordered filter list into a single query.
    pub fn compile(&self, filters: &[FilterInput]) -> BuildResult {
        let from_view = BASE_VIEW.to_string();

        if filters.is_empty() {
            return BuildResult {
                sql: format!("SELECT FIRST {} * FROM {}", self.config.default_limit, from_view),
                params: Values(Vec::new()),
                from_view,
                warnings: Vec::new(),
            };
        }

        let mut where_clauses = Vec::new();
        let mut params = Vec::new();
        let mut joins = Vec::new();
        let mut warnings = Vec::new();

        for (index, filter) in filters.iter().enumerate() {
            match self.compile_filter(filter) {
                Ok(clause) => {
                    where_clauses.push(clause.sql);
                    params.extend(clause.params);
                    joins.extend_from_slice(clause.joins);
                }
                Err(reason) => {
                    warn!(index, property = %filter.property, %reason, "ignoring filter");
                    warnings.push(UnresolvedFilter {
                        index,
                        property: filter.property.clone(),
                        reason,
                    });
                }
            }
        }

        let mut sql = format!(
            "SELECT FIRST {} * FROM {} {}",
            self.config.row_limit, from_view, BASE_ALIAS
        );
        for join in joins.into_iter().unique() {
            sql.push(' ');
            sql.push_str(join);
        }
        if !where_clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clauses.join(" AND "));
        }

        debug!(%sql, params = params.len(), ignored = warnings.len(), "compiled segment query");

        BuildResult {
            sql,
            params: Values(params),
            from_view,
            warnings,
        }
    }

    /// Resolve one filter through the field dictionary.
    pub fn compile_filter(&self, filter: &FilterInput) -> Result<Clause, UnresolvedFilterReason> {
        let entry = dictionary::lookup(&filter.property)
            .ok_or_else(|| UnresolvedFilterReason::UnknownProperty(filter.property.clone()))?;
        let operator = Operator::parse(&filter.operator)
            .ok_or_else(|| UnresolvedFilterReason::UnknownOperator(filter.operator.clone()))?;
        if !entry.supports(operator) {
            return Err(UnresolvedFilterReason::UnsupportedOperator {
                property: filter.property.clone(),
                operator,
            });
        }

        debug!(property = entry.label, %operator, kind = ?entry.kind, "resolving filter");

        let mut binder = Binder::new(self.config.inline_literals);
        let (sql, joins) = match entry.kind {
            FilterKind::DirectColumn(column) => (
                self.direct_column(&column, operator, filter, &mut binder)?,
                column.joins,
            ),
            FilterKind::VisitAggregate(aggregate) => (
                self.visit_aggregate(aggregate, operator, filter, &mut binder)?,
                NO_JOINS,
            ),
            FilterKind::DateWindow(window) => (
                self.date_window(window, operator, filter, &mut binder)?,
                NO_JOINS,
            ),
            FilterKind::BooleanExistence => (self.membership(operator, filter), NO_JOINS),
            FilterKind::StatusLookup => (
                self.membership_status(operator, filter, &mut binder)?,
                NO_JOINS,
            ),
            FilterKind::MultiselectRelation => (
                self.plan_name(operator, filter, &mut binder)?,
                NO_JOINS,
            ),
        };

        Ok(Clause {
            sql,
            params: binder.params,
            joins,
        })
    }

    /// `alias.column <op> ?`, the only kind that adds joins to the outer query.
    fn direct_column(
        &self,
        column: &ColumnRef,
        operator: Operator,
        filter: &FilterInput,
        binder: &mut Binder,
    ) -> Result<String, UnresolvedFilterReason> {
        let expr = column.expr();

        if operator.is_relative_date() {
            let unit = time_unit(filter)?;
            let lower = binder.integer(-magnitude(filter)?);
            return Ok(operator.template().render(&expr, Some(unit), &[lower]));
        }

        match &filter.value {
            None => Err(UnresolvedFilterReason::MissingValue),
            Some(FilterValue::Window(_)) => Err(UnresolvedFilterReason::InvalidValue),
            Some(FilterValue::List(items)) => {
                let Some(first) = items.first() else {
                    return Err(UnresolvedFilterReason::EmptySelection);
                };
                match operator.list_template() {
                    Some(template) => {
                        let args: Vec<_> =
                            items.iter().map(|item| binder.bind(item.to_value())).collect();
                        Ok(template.render(&expr, None, &args))
                    }
                    // Ordering operators only look at the first choice.
                    None => {
                        let arg = binder.bind(first.to_value());
                        Ok(operator.template().render(&expr, None, &[arg]))
                    }
                }
            }
            Some(FilterValue::Scalar(value)) => {
                let arg = binder.bind(value.to_value());
                Ok(operator.template().render(&expr, None, &[arg]))
            }
        }
    }

    /// A counting subquery compared against the filter's number.
    fn visit_aggregate(
        &self,
        aggregate: VisitAggregate,
        operator: Operator,
        filter: &FilterInput,
        binder: &mut Binder,
    ) -> Result<String, UnresolvedFilterReason> {
        let (subquery, target) = match aggregate {
            VisitAggregate::MonthlyAverage => {
                let target = scalar_number(filter)?;
                let visits = self
                    .visits("COUNT(*) * 1.0 / 12.0", "avg")
                    .filter("sale_avg.LOGDATE >= DATEADD(-12 MONTH TO CURRENT_TIMESTAMP)");
                (visits.scalar(), target)
            }
            VisitAggregate::Recent => {
                let Some(FilterValue::Window(window)) = &filter.value else {
                    return Err(UnresolvedFilterReason::InvalidValue);
                };
                let count = coerce_number(window.count.as_ref(), &filter.property);
                let days = coerce_number(window.days.as_ref(), &filter.property)
                    .abs()
                    .trunc() as i64;
                let lower = binder.integer(-days);
                let visits = self.visits("COUNT(*)", "recent").filter(format!(
                    "sale_recent.LOGDATE >= DATEADD({} DAY TO CURRENT_TIMESTAMP)",
                    lower
                ));
                (visits.scalar(), count)
            }
            VisitAggregate::Total => {
                let target = scalar_number(filter)?;
                (self.visits("COUNT(*)", "total").scalar(), target)
            }
            VisitAggregate::FailedRecharges => {
                let target = scalar_number(filter)?;
                let failed = self
                    .recharges("COUNT(*)", "failed")
                    .filter(format!("sale_failed.STATUS = {}", SALE_STATUS_RECHARGE_FAILED))
                    .filter("sale_failed.LOGDATE >= DATEADD(-7 DAY TO CURRENT_TIMESTAMP)");
                (failed.scalar(), target)
            }
        };

        let arg = binder.number(target);
        Ok(operator.template().render(&subquery, None, &[arg]))
    }

    /// `[NOT] EXISTS` a related row dated inside the last N units.
    fn date_window(
        &self,
        window: DateWindow,
        operator: Operator,
        filter: &FilterInput,
        binder: &mut Binder,
    ) -> Result<String, UnresolvedFilterReason> {
        let unit = if window.uses_time_unit() {
            time_unit(filter)?
        } else {
            TimeUnit::Day
        };
        let lower = binder.integer(-magnitude(filter)?);
        let within = |column: &str| {
            Operator::WithinLast
                .template()
                .render(column, Some(unit), std::slice::from_ref(&lower))
        };

        let subquery = match window {
            DateWindow::LastWash => self.visits("1", "wash").filter(within("sale_wash.LOGDATE")),
            DateWindow::FirstVisit => {
                let earliest = self.visits("MIN(sale_min.LOGDATE)", "min").scalar();
                self.visits("1", "first")
                    .filter(format!("sale_first.LOGDATE = {}", earliest))
                    .filter(within("sale_first.LOGDATE"))
            }
            DateWindow::LastCharge => self
                .recharges("1", "charge")
                .filter(format!("sale_charge.STATUS = {}", SALE_STATUS_RECHARGED))
                .filter(within("sale_charge.LOGDATE")),
            DateWindow::Cancellation => {
                let codes = status::translate_all(status::CANCELLED_LABELS)
                    .iter()
                    .map(|code| code.to_string())
                    .join(", ");
                customer_memberships("1", "cancel")
                    .filter(format!("sp_cancel.STATUS IN ({})", codes))
                    .filter(within("sale_cancel.LOGDATE"))
            }
            DateWindow::JoinDate => Subquery::select("1", View::SalePasses, "sp_join")
                .filter(format!("sp_join.CUSTOMER = {}", BASE_KEY))
                .filter(within("sp_join.MEMBERSINCE")),
        };

        Ok(existence(operator == Operator::WithinLast, &subquery))
    }

    /// "Is a member": any membership record, no date or status condition.
    fn membership(&self, operator: Operator, filter: &FilterInput) -> String {
        let wants_member =
            matches!(&filter.value, Some(FilterValue::Scalar(value)) if value.is_true());
        let memberships = Subquery::select("1", View::SalePasses, "sp_member")
            .filter(format!("sp_member.CUSTOMER = {}", BASE_KEY));
        existence(wants_member == (operator == Operator::Is), &memberships)
    }

    /// Current status only: the status must sit on the customer's most recent
    /// membership transaction.
    fn membership_status(
        &self,
        operator: Operator,
        filter: &FilterInput,
        binder: &mut Binder,
    ) -> Result<String, UnresolvedFilterReason> {
        let labels: Vec<String> = match &filter.value {
            None => return Err(UnresolvedFilterReason::MissingValue),
            Some(FilterValue::Window(_)) => return Err(UnresolvedFilterReason::InvalidValue),
            Some(FilterValue::List(items)) if items.is_empty() => {
                return Err(UnresolvedFilterReason::EmptySelection)
            }
            Some(FilterValue::List(items)) => items.iter().map(|item| item.to_string()).collect(),
            Some(FilterValue::Scalar(value)) => vec![value.to_string()],
        };

        let codes = status::translate_all(labels.iter().map(String::as_str));
        if codes.is_empty() {
            return Err(UnresolvedFilterReason::UnknownStatus(labels));
        }
        if codes.len() < labels.len() {
            warn!(?labels, "some membership status labels have no status code");
        }

        let args: Vec<_> = codes
            .into_iter()
            .map(|code| binder.bind(Value::Int(Some(code))))
            .collect();
        let in_codes = list_predicate("sp_status.STATUS", &args);
        let latest = customer_memberships("MAX(sale_max.LOGDATE)", "max").scalar();
        let current = customer_memberships("1", "status")
            .filter(in_codes)
            .filter(format!("sale_status.LOGDATE = {}", latest));

        Ok(existence(operator == Operator::Is, &current))
    }

    /// Plan names are matched inside a subquery so a customer with several
    /// membership records still appears once.
    fn plan_name(
        &self,
        operator: Operator,
        filter: &FilterInput,
        binder: &mut Binder,
    ) -> Result<String, UnresolvedFilterReason> {
        let predicate = match &filter.value {
            None => return Err(UnresolvedFilterReason::MissingValue),
            Some(FilterValue::Window(_)) => return Err(UnresolvedFilterReason::InvalidValue),
            Some(FilterValue::List(items)) if items.is_empty() => {
                return Err(UnresolvedFilterReason::EmptySelection)
            }
            Some(FilterValue::List(items)) => {
                let args: Vec<_> = items.iter().map(|item| binder.bind(item.to_value())).collect();
                list_predicate("pt2.NAME", &args)
            }
            Some(FilterValue::Scalar(value)) if value.is_blank() => {
                return Err(UnresolvedFilterReason::MissingValue)
            }
            Some(FilterValue::Scalar(value)) => {
                let arg = binder.bind(value.to_value());
                Operator::Is.template().render("pt2.NAME", None, &[arg])
            }
        };

        let plans = Subquery::select("1", View::SalePasses, "sp2")
            .join(View::PlanType, "pt2", "pt2.OBJID = sp2.PLANTYPE")
            .filter(format!("sp2.CUSTOMER = {}", BASE_KEY))
            .filter(predicate);

        Ok(existence(operator == Operator::Is, &plans))
    }

    /// The customer's real visits: sales not booked on an excluded terminal.
    fn visits(&self, select: &str, suffix: &str) -> Subquery {
        let excluded = &self.config.excluded_visit_terminals;
        let exclusion = (!excluded.is_empty()).then(|| {
            format!(
                "term_{}.NAME NOT IN ({})",
                suffix,
                excluded.iter().map(|name| quote_literal(name)).join(", ")
            )
        });
        customer_sales(select, suffix).filter_if(exclusion)
    }

    /// The customer's sales on the recharge terminal.
    fn recharges(&self, select: &str, suffix: &str) -> Subquery {
        customer_sales(select, suffix).filter(format!(
            "term_{}.NAME = {}",
            suffix,
            quote_literal(&self.config.recharge_terminal)
        ))
    }
}

/// Compile with the default configuration.
pub fn build_query(filters: &[FilterInput]) -> BuildResult {
    SqlCompiler::new().compile(filters)
}

fn existence(present: bool, subquery: &Subquery) -> String {
    if present {
        subquery.exists()
    } else {
        subquery.not_exists()
    }
}

fn list_predicate(expr: &str, args: &[String]) -> String {
    match Operator::Is.list_template() {
        Some(template) => template.render(expr, None, args),
        None => format!("{} IN ({})", expr, args.join(", ")),
    }
}

fn time_unit(filter: &FilterInput) -> Result<TimeUnit, UnresolvedFilterReason> {
    TimeUnit::parse(filter.time_unit.as_deref()).ok_or(UnresolvedFilterReason::InvalidValue)
}

/// Number of units to look back: the absolute value, truncated.
fn magnitude(filter: &FilterInput) -> Result<i64, UnresolvedFilterReason> {
    Ok(scalar_number(filter)?.abs().trunc() as i64)
}

fn scalar_number(filter: &FilterInput) -> Result<f64, UnresolvedFilterReason> {
    match &filter.value {
        None => Err(UnresolvedFilterReason::MissingValue),
        Some(FilterValue::Scalar(value)) => Ok(coerce_number(Some(value), &filter.property)),
        Some(_) => Err(UnresolvedFilterReason::InvalidValue),
    }
}

/// Unparseable numbers count as zero, as the builder always has.
fn coerce_number(value: Option<&Scalar>, property: &str) -> f64 {
    match value.and_then(Scalar::as_number) {
        Some(n) => n,
        None => {
            warn!(property, ?value, "non-numeric filter value treated as 0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn create_inline_compiler() -> SqlCompiler {
        SqlCompiler::from_config(CompilerConfig {
            inline_literals: true,
            ..Default::default()
        })
    }

    fn filter(property: &str, operator: &str, value: FilterValue) -> FilterInput {
        FilterInput::new(property, operator, value)
    }

    fn placeholders(sql: &str) -> usize {
        sql.matches('?').count()
    }

    fn text(s: &str) -> Value {
        Value::String(Some(Box::new(s.to_string())))
    }

    #[test]
    fn test_empty_input_returns_default_query() {
        let result = build_query(&[]);
        assert_eq!(result.sql, "SELECT FIRST 100 * FROM V_CUSTOMER");
        assert!(result.params.0.is_empty());
        assert_eq!(result.from_view, "V_CUSTOMER");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_unknown_property_is_dropped_with_warning() {
        let result = build_query(&[filter("Favourite colour", "is", FilterValue::text("red"))]);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
        assert!(result.params.0.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(
            result.warnings[0].reason,
            UnresolvedFilterReason::UnknownProperty("Favourite colour".to_string())
        );
    }

    #[test]
    fn test_unknown_and_unsupported_operators() {
        let result = build_query(&[
            filter("Total visits", "is roughly", FilterValue::number(3.0)),
            filter("Total visits", "contains", FilterValue::number(3.0)),
        ]);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
        assert_eq!(
            result.warnings[0].reason,
            UnresolvedFilterReason::UnknownOperator("is roughly".to_string())
        );
        assert_eq!(
            result.warnings[1].reason,
            UnresolvedFilterReason::UnsupportedOperator {
                property: "Total visits".to_string(),
                operator: Operator::Contains,
            }
        );
        assert_eq!(result.warnings[1].index, 1);
    }

    #[test]
    fn test_average_visits_binds_value() {
        let result = build_query(&[filter(
            "Average visits",
            "is greater than",
            FilterValue::text("3"),
        )]);
        assert!(result.sql.contains("SELECT COUNT(*) * 1.0 / 12.0 FROM V_CUSTOMERCODE cc_avg"));
        assert!(result.sql.contains("term_avg.NAME NOT IN ('Automatic Recharge')"));
        assert!(result.sql.contains("DATEADD(-12 MONTH TO CURRENT_TIMESTAMP)"));
        assert!(result.sql.ends_with(") > ?"));
        assert_eq!(result.params.0, vec![Value::BigInt(Some(3))]);
    }

    #[test]
    fn test_average_visits_inline() {
        let compiler = create_inline_compiler();
        let result = compiler.compile(&[filter(
            "Membership average visits",
            "is less than",
            FilterValue::number(1.5),
        )]);
        assert!(result.sql.ends_with(") < 1.5"));
        assert!(result.params.0.is_empty());
    }

    #[test]
    fn test_recent_visits_bound_in_text_order() {
        let result = build_query(&[filter(
            "Recent visits",
            "is greater than or equal to",
            FilterValue::window(3.0, 30.0),
        )]);
        assert!(result
            .sql
            .contains("sale_recent.LOGDATE >= DATEADD(? DAY TO CURRENT_TIMESTAMP)) >= ?"));
        assert_eq!(
            result.params.0,
            vec![Value::BigInt(Some(-30)), Value::BigInt(Some(3))]
        );
    }

    #[test]
    fn test_recent_visits_requires_window() {
        let result = build_query(&[filter("Recent visits", "is", FilterValue::number(3.0))]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::InvalidValue);
    }

    #[test]
    fn test_total_visits_has_no_window() {
        let result = create_inline_compiler().compile(&[filter(
            "Total visits",
            "is not",
            FilterValue::number(0.0),
        )]);
        assert!(result.sql.contains("(SELECT COUNT(*) FROM V_CUSTOMERCODE cc_total"));
        assert!(!result.sql.contains("DATEADD"));
        assert!(result.sql.ends_with(") <> 0"));
    }

    #[test]
    fn test_non_numeric_value_coerces_to_zero() {
        let result = create_inline_compiler().compile(&[filter(
            "Total visits",
            "is",
            FilterValue::text("lots"),
        )]);
        assert!(result.sql.ends_with(") = 0"));
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_failed_recharge_attempts() {
        let result = create_inline_compiler().compile(&[filter(
            "Membership failed recharge attempts",
            "is greater than",
            FilterValue::number(1.0),
        )]);
        assert!(result.sql.contains("term_failed.NAME = 'Automatic Recharge'"));
        assert!(result.sql.contains("sale_failed.STATUS = -9"));
        assert!(result.sql.contains("DATEADD(-7 DAY TO CURRENT_TIMESTAMP)"));
        assert!(result.sql.ends_with(") > 1"));
    }

    #[test]
    fn test_last_wash_date_windows() {
        let within = build_query(&[filter(
            "Last wash date",
            "is within last",
            FilterValue::text("30"),
        )]);
        assert!(within.sql.contains("WHERE EXISTS (SELECT 1 FROM V_CUSTOMERCODE cc_wash"));
        assert!(within.sql.contains("sale_wash.LOGDATE >= DATEADD(? DAY TO CURRENT_TIMESTAMP)"));
        assert_eq!(within.params.0, vec![Value::BigInt(Some(-30))]);

        let outside = build_query(&[
            filter("Last wash date", "is not within last", FilterValue::number(-2.0))
                .with_time_unit("weeks"),
        ]);
        assert!(outside.sql.contains("WHERE NOT EXISTS (SELECT 1 FROM V_CUSTOMERCODE cc_wash"));
        assert!(outside.sql.contains("DATEADD(? WEEK TO CURRENT_TIMESTAMP)"));
        assert_eq!(outside.params.0, vec![Value::BigInt(Some(-2))]);
    }

    #[test]
    fn test_first_visit_matches_earliest_real_visit() {
        let result = create_inline_compiler().compile(&[filter(
            "First visit",
            "is within last",
            FilterValue::number(60.0),
        )]);
        assert!(result.sql.contains(
            "sale_first.LOGDATE = (SELECT MIN(sale_min.LOGDATE) FROM V_CUSTOMERCODE cc_min"
        ));
        assert!(result.sql.contains("term_min.NAME NOT IN ('Automatic Recharge')"));
        assert!(result.sql.contains("term_first.NAME NOT IN ('Automatic Recharge')"));
        assert!(result.sql.contains("sale_first.LOGDATE >= DATEADD(-60 DAY TO CURRENT_TIMESTAMP)"));
    }

    #[test]
    fn test_last_charge_date_uses_successful_recharges() {
        let result = create_inline_compiler().compile(&[filter(
            "Membership last charge date",
            "is not within last",
            FilterValue::number(35.0),
        )]);
        assert!(result.sql.contains("WHERE NOT EXISTS (SELECT 1 FROM V_CUSTOMERCODE cc_charge"));
        assert!(result.sql.contains("term_charge.NAME = 'Automatic Recharge'"));
        assert!(result.sql.contains("sale_charge.STATUS = -32768"));
        assert!(result.sql.contains("DATEADD(-35 DAY TO CURRENT_TIMESTAMP)"));
    }

    #[test]
    fn test_cancellation_date_uses_cancelled_statuses() {
        let result = build_query(&[filter(
            "Membership cancellation date",
            "is within last",
            FilterValue::number(90.0),
        )]);
        assert!(result.sql.contains(
            "FROM V_SALEPASSES sp_cancel \
             JOIN V_SALE sale_cancel ON sale_cancel.OBJID = sp_cancel.SALEID"
        ));
        assert!(result.sql.contains("sp_cancel.STATUS IN (27, 29)"));
        assert_eq!(result.params.0, vec![Value::BigInt(Some(-90))]);
    }

    #[test]
    fn test_join_date_honours_time_unit() {
        let result = create_inline_compiler().compile(&[
            filter("Membership join date", "is within last", FilterValue::number(6.0))
                .with_time_unit("months"),
        ]);
        assert!(result
            .sql
            .contains("sp_join.MEMBERSINCE >= DATEADD(-6 MONTH TO CURRENT_TIMESTAMP)"));
    }

    #[test]
    fn test_unknown_time_unit_is_dropped() {
        let result = build_query(&[
            filter("Membership join date", "is within last", FilterValue::number(6.0))
                .with_time_unit("fortnights"),
        ]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::InvalidValue);
        assert!(result.params.0.is_empty());
    }

    #[test]
    fn test_is_a_member() {
        let member = build_query(&[filter("Is a member", "is", FilterValue::text("true"))]);
        assert!(member.sql.ends_with(
            "WHERE EXISTS (SELECT 1 FROM V_SALEPASSES sp_member WHERE sp_member.CUSTOMER = c.OBJID)"
        ));

        let non_member = build_query(&[filter(
            "Is a member",
            "is",
            FilterValue::Scalar(Scalar::Bool(false)),
        )]);
        assert!(non_member.sql.contains("WHERE NOT EXISTS (SELECT 1 FROM V_SALEPASSES sp_member"));

        let inverted = build_query(&[filter(
            "Is a member",
            "is not",
            FilterValue::Scalar(Scalar::Bool(true)),
        )]);
        assert!(inverted.sql.contains("WHERE NOT EXISTS"));
    }

    #[test]
    fn test_membership_status_current_only() {
        let result = build_query(&[filter(
            "Membership status",
            "is not",
            FilterValue::list(["Suspended", "Card Declined"]),
        )]);
        assert!(result.sql.contains("WHERE NOT EXISTS (SELECT 1 FROM V_SALEPASSES sp_status"));
        assert!(result.sql.contains("sp_status.STATUS IN (?, ?)"));
        assert!(result.sql.contains(
            "sale_status.LOGDATE = (SELECT MAX(sale_max.LOGDATE) FROM V_SALEPASSES sp_max"
        ));
        assert_eq!(result.params.0, vec![Value::Int(Some(40)), Value::Int(Some(120))]);
    }

    #[test]
    fn test_membership_status_unknown_labels() {
        let result = build_query(&[filter(
            "Membership status",
            "is",
            FilterValue::list(["Active"]),
        )]);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
        assert_eq!(
            result.warnings[0].reason,
            UnresolvedFilterReason::UnknownStatus(vec!["Active".to_string()])
        );

        let partial = build_query(&[filter(
            "Membership status",
            "is",
            FilterValue::list(["Active", "Joined"]),
        )]);
        assert_eq!(partial.params.0, vec![Value::Int(Some(1))]);
        assert!(partial.warnings.is_empty());
    }

    #[test]
    fn test_plan_name_single_value() {
        let result = build_query(&[filter(
            "Membership plan name",
            "is",
            FilterValue::text("Unlimited Super"),
        )]);
        assert!(result.sql.contains("AND pt2.NAME = ?)"));
        assert_eq!(result.params.0, vec![text("Unlimited Super")]);
    }

    #[test]
    fn test_plan_name_empty_selection() {
        let result = build_query(&[filter(
            "Membership plan name",
            "is",
            FilterValue::List(vec![]),
        )]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::EmptySelection);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
    }

    #[test]
    fn test_direct_column_on_base_view() {
        let result = build_query(&[filter("Last name", "contains", FilterValue::text("smith"))]);
        assert_eq!(
            result.sql,
            "SELECT FIRST 500 * FROM V_CUSTOMER c WHERE c.LASTNAME CONTAINING ?"
        );
        assert_eq!(result.params.0, vec![text("smith")]);
    }

    #[test]
    fn test_direct_column_list_values() {
        let result = build_query(&[filter(
            "Last name",
            "is not",
            FilterValue::list(["Smith", "Jones"]),
        )]);
        assert!(result.sql.ends_with("WHERE c.LASTNAME NOT IN (?, ?)"));
        assert_eq!(result.params.0, vec![text("Smith"), text("Jones")]);

        let ordered = build_query(&[filter(
            "Last name",
            "is greater than",
            FilterValue::list(["M", "Z"]),
        )]);
        assert!(ordered.sql.ends_with("WHERE c.LASTNAME > ?"));
        assert_eq!(ordered.params.0, vec![text("M")]);
    }

    #[test]
    fn test_direct_column_with_joins() {
        let result = build_query(&[filter(
            "Membership last wash date",
            "is on",
            FilterValue::text("2024-05-01"),
        )]);
        assert_eq!(
            result.sql,
            "SELECT FIRST 500 * FROM V_CUSTOMER c \
             JOIN V_CUSTOMERCODE cc ON cc.CUSTOMER = c.OBJID \
             JOIN V_SALE sale ON sale.CUSTOMERCODE = cc.OBJID \
             WHERE CAST(sale.LOGDATE AS DATE) = ?"
        );
    }

    #[test]
    fn test_dropped_direct_column_adds_no_joins() {
        let result = build_query(&[filter(
            "Membership last wash date",
            "is",
            FilterValue::List(vec![]),
        )]);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
    }

    #[test]
    fn test_missing_value() {
        let mut input = filter("Total visits", "is", FilterValue::number(1.0));
        input.value = None;
        let result = build_query(&[input]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::MissingValue);
    }

    #[test]
    fn test_custom_terminal_exclusions() {
        let compiler = SqlCompiler::from_config(CompilerConfig {
            excluded_visit_terminals: vec![
                "Automatic Recharge".to_string(),
                "Joe's Fleet".to_string(),
            ],
            row_limit: 50,
            ..Default::default()
        });
        let result = compiler.compile(&[filter(
            "Total visits",
            "is greater than",
            FilterValue::number(2.0),
        )]);
        assert!(result.sql.starts_with("SELECT FIRST 50 * FROM V_CUSTOMER c"));
        assert!(result
            .sql
            .contains("term_total.NAME NOT IN ('Automatic Recharge', 'Joe''s Fleet')"));

        let unrestricted = SqlCompiler::from_config(CompilerConfig {
            excluded_visit_terminals: vec![],
            ..Default::default()
        });
        let result = unrestricted.compile(&[filter(
            "Total visits",
            "is greater than",
            FilterValue::number(2.0),
        )]);
        assert!(!result.sql.contains("NOT IN"));
    }

    #[test]
    fn test_placeholders_match_params() {
        let filters = vec![
            filter("Recent visits", "is", FilterValue::window(2.0, 14.0)),
            filter("Membership status", "is", FilterValue::list(["Joined", "Renewed", "Resumed"])),
            filter("Membership plan name", "is not", FilterValue::list(["Unlimited Basic"])),
            filter("Last name", "is", FilterValue::text("Smith")),
            filter("Membership last wash date", "is within last", FilterValue::number(3.0)),
            filter("First visit", "is within last", FilterValue::number(10.0)),
        ];
        let result = build_query(&filters);
        assert!(result.warnings.is_empty());
        assert_eq!(placeholders(&result.sql), result.params.0.len());
        assert_eq!(result.params.0.len(), 2 + 3 + 1 + 1 + 1 + 1);
    }

    #[test]
    fn test_compile_filter_returns_clause() {
        let clause = SqlCompiler::new()
            .compile_filter(&filter(
                "Membership last wash date",
                "is before",
                FilterValue::text("2024-01-01"),
            ))
            .unwrap();
        assert_eq!(clause.sql, "sale.LOGDATE < ?");
        assert_eq!(clause.params, vec![text("2024-01-01")]);
        assert_eq!(clause.joins.len(), 2);
    }

    #[test]
    fn test_direct_column_not_within_last() {
        let result = build_query(&[filter(
            "Membership last wash date",
            "is not within last",
            FilterValue::number(4.0),
        )]);
        assert!(result
            .sql
            .ends_with("WHERE sale.LOGDATE < DATEADD(? DAY TO CURRENT_TIMESTAMP)"));
        assert_eq!(result.params.0, vec![Value::BigInt(Some(-4))]);
    }

    #[test]
    fn test_direct_column_rejects_visit_window() {
        let result = build_query(&[filter("Last name", "is", FilterValue::window(2.0, 30.0))]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::InvalidValue);
        assert_eq!(result.sql, "SELECT FIRST 500 * FROM V_CUSTOMER c");
    }

    #[test]
    fn test_plan_name_blank_value() {
        let result = build_query(&[filter("Membership plan name", "is", FilterValue::text("  "))]);
        assert_eq!(result.warnings[0].reason, UnresolvedFilterReason::MissingValue);
        assert!(result.params.0.is_empty());
    }

    #[test]
    fn test_custom_recharge_terminal() {
        let compiler = SqlCompiler::from_config(CompilerConfig {
            recharge_terminal: "Auto Pay".to_string(),
            inline_literals: true,
            ..Default::default()
        });
        let charged = compiler.compile(&[filter(
            "Membership last charge date",
            "is within last",
            FilterValue::number(30.0),
        )]);
        assert!(charged.sql.contains("term_charge.NAME = 'Auto Pay'"));

        let failed = compiler.compile(&[filter(
            "Membership failed recharge attempts",
            "is greater than",
            FilterValue::number(2.0),
        )]);
        assert!(failed.sql.contains("term_failed.NAME = 'Auto Pay'"));
        assert!(!failed.sql.contains("Automatic Recharge"));
    }

    #[test]
    fn test_first_visit_not_within_last() {
        let result = create_inline_compiler().compile(&[filter(
            "First visit",
            "is not within last",
            FilterValue::number(60.0),
        )]);
        assert!(result
            .sql
            .contains("WHERE NOT EXISTS (SELECT 1 FROM V_CUSTOMERCODE cc_first"));
        assert!(result
            .sql
            .contains("sale_first.LOGDATE >= DATEADD(-60 DAY TO CURRENT_TIMESTAMP)"));
    }

    #[test]
    fn test_cancellation_date_not_within_last() {
        let result = create_inline_compiler().compile(&[filter(
            "Membership cancellation date",
            "is not within last",
            FilterValue::number(90.0),
        )]);
        assert!(result
            .sql
            .contains("WHERE NOT EXISTS (SELECT 1 FROM V_SALEPASSES sp_cancel"));
        assert!(result.sql.contains("sp_cancel.STATUS IN (27, 29)"));
        assert!(result
            .sql
            .contains("sale_cancel.LOGDATE >= DATEADD(-90 DAY TO CURRENT_TIMESTAMP)"));
    }

    #[test]
    fn test_join_date_not_within_last() {
        let result = create_inline_compiler().compile(&[filter(
            "Membership join date",
            "is not within last",
            FilterValue::number(1.0),
        )
        .with_time_unit("years")]);
        assert_eq!(
            result.sql,
            "SELECT FIRST 500 * FROM V_CUSTOMER c WHERE NOT EXISTS \
             (SELECT 1 FROM V_SALEPASSES sp_join WHERE sp_join.CUSTOMER = c.OBJID \
             AND sp_join.MEMBERSINCE >= DATEADD(-1 YEAR TO CURRENT_TIMESTAMP))"
        );
    }

    #[test]
    fn test_day_only_windows_ignore_time_unit() {
        let compiler = create_inline_compiler();
        for property in [
            "First visit",
            "Membership last charge date",
            "Membership cancellation date",
        ] {
            let result = compiler.compile(&[
                filter(property, "is within last", FilterValue::number(14.0))
                    .with_time_unit("hours"),
            ]);
            assert!(result.warnings.is_empty(), "{}", property);
            assert!(
                result.sql.contains("DATEADD(-14 DAY TO CURRENT_TIMESTAMP)"),
                "{}",
                property
            );
        }
    }

    #[test]
    fn test_is_a_member_without_value() {
        let mut input = filter("Is a member", "is", FilterValue::text("true"));
        input.value = None;
        let result = build_query(&[input]);
        assert!(result.warnings.is_empty());
        assert_eq!(
            result.sql,
            "SELECT FIRST 500 * FROM V_CUSTOMER c WHERE NOT EXISTS \
             (SELECT 1 FROM V_SALEPASSES sp_member WHERE sp_member.CUSTOMER = c.OBJID)"
        );
    }

    #[test]
    fn test_warning_display() {
        let result = build_query(&[filter("Nope", "is", FilterValue::text("x"))]);
        assert_eq!(
            result.warnings[0].to_string(),
            "filter 0 (Nope) ignored: unknown property `Nope`"
        );
    }
}
