//! The legacy point-of-sale views the compiler targets, plus a small builder
//! for the correlated subqueries that hang off the customer row.

use sea_query::Iden;
use std::fmt::Write;

/// Read-only views exposed by the point-of-sale database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Customer,
    CustomerCode,
    Sale,
    Terminal,
    SalePasses,
    PlanType,
}

impl Iden for View {
    fn unquoted(&self, s: &mut dyn Write) {
        let name = match self {
            View::Customer => "V_CUSTOMER",
            View::CustomerCode => "V_CUSTOMERCODE",
            View::Sale => "V_SALE",
            View::Terminal => "V_TERMINAL",
            View::SalePasses => "V_SALEPASSES",
            View::PlanType => "V_PLANTYPE",
        };
        write!(s, "{}", name).unwrap();
    }
}

/// Root relation of every segment query.
pub const BASE_VIEW: View = View::Customer;
pub const BASE_ALIAS: &str = "c";

/// Column every correlated subquery ties back to.
pub const BASE_KEY: &str = "c.OBJID";

/// `V_SALE.STATUS` of a successful automatic recharge.
pub const SALE_STATUS_RECHARGED: i32 = -32768;
/// `V_SALE.STATUS` of a declined automatic recharge.
pub const SALE_STATUS_RECHARGE_FAILED: i32 = -9;

/// Quotes a compiler-owned constant as a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `SELECT <select> FROM <view> <alias> [JOIN ...] WHERE <a> AND <b> ...`
#[derive(Debug, Clone)]
pub struct Subquery {
    select: String,
    from: String,
    joins: Vec<String>,
    predicates: Vec<String>,
}

impl Subquery {
    pub fn select(select: impl Into<String>, view: View, alias: &str) -> Self {
        Self {
            select: select.into(),
            from: format!("{} {}", view.to_string(), alias),
            joins: Vec::new(),
            predicates: Vec::new(),
        }
    }

    pub fn join(mut self, view: View, alias: &str, on: impl Into<String>) -> Self {
        self.joins
            .push(format!("JOIN {} {} ON {}", view.to_string(), alias, on.into()));
        self
    }

    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    pub fn filter_if(self, predicate: Option<String>) -> Self {
        match predicate {
            Some(predicate) => self.filter(predicate),
            None => self,
        }
    }

    pub fn render(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select, self.from);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.predicates.join(" AND "));
        }
        sql
    }

    /// `(SELECT ...)`, usable as a scalar expression.
    pub fn scalar(&self) -> String {
        format!("({})", self.render())
    }

    pub fn exists(&self) -> String {
        format!("EXISTS ({})", self.render())
    }

    pub fn not_exists(&self) -> String {
        format!("NOT EXISTS ({})", self.render())
    }
}

/// Sales made with one of a customer's codes, joined to their terminal.
/// Every alias gets `suffix` appended so nested subqueries do not collide.
pub fn customer_sales(select: &str, suffix: &str) -> Subquery {
    let cc = format!("cc_{}", suffix);
    let sale = format!("sale_{}", suffix);
    let term = format!("term_{}", suffix);
    Subquery::select(select, View::CustomerCode, &cc)
        .join(View::Sale, &sale, format!("{sale}.CUSTOMERCODE = {cc}.OBJID"))
        .join(View::Terminal, &term, format!("{term}.OBJID = {sale}.TERMINAL"))
        .filter(format!("{cc}.CUSTOMER = {BASE_KEY}"))
}

/// Membership records of the customer, joined to the sale that produced them.
pub fn customer_memberships(select: &str, suffix: &str) -> Subquery {
    let sp = format!("sp_{}", suffix);
    let sale = format!("sale_{}", suffix);
    Subquery::select(select, View::SalePasses, &sp)
        .join(View::Sale, &sale, format!("{sale}.OBJID = {sp}.SALEID"))
        .filter(format!("{sp}.CUSTOMER = {BASE_KEY}"))
}
