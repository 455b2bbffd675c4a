//! Leave types: compulsory weekly offs and custom balance-tracked leave.
//!
//! [`LeaveType`] is a tagged union. Both variants answer "which dates of a
//! cycle does this type make off-days"; only [`LeaveType::Custom`] carries a
//! balance, which the [`ledger`](crate::ledger) tracks.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{Cycle, MonthDay};
use crate::error::{Result, ValidationErrors};
use crate::recurrence;

/// A weekly off-day rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WeeklyOff {
    /// The given weekdays are off every week.
    Fixed { days: Vec<Weekday> },
    /// `weekday` is off every other week; `anchor` is one such off-day.
    Alternating { weekday: Weekday, anchor: NaiveDate },
}

impl WeeklyOff {
    /// Saturday and Sunday.
    pub fn weekend() -> Self {
        WeeklyOff::Fixed {
            days: vec![Weekday::Sat, Weekday::Sun],
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match self {
            WeeklyOff::Fixed { days } => {
                if days.is_empty() {
                    errors.push("days", "at least one weekday is required");
                }
                let unique: HashSet<&Weekday> = days.iter().collect();
                if unique.len() != days.len() {
                    errors.push("days", "weekdays must not repeat");
                }
            }
            WeeklyOff::Alternating { weekday, anchor } => {
                if anchor.weekday() != *weekday {
                    errors.push(
                        "anchor",
                        format!("{} is a {}, expected {}", anchor, anchor.weekday(), weekday),
                    );
                }
            }
        }
        errors
    }
}

impl Default for WeeklyOff {
    fn default() -> Self {
        Self::weekend()
    }
}

/// Optional lower and upper bounds on leave usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLimit {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl UsageLimit {
    pub fn at_most(max: f64) -> Self {
        UsageLimit {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        UsageLimit {
            min: Some(min),
            max: None,
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (field, bound) in [("min", self.min), ("max", self.max)] {
            if let Some(v) = bound {
                if !v.is_finite() || v < 0.0 {
                    errors.push(field, format!("{} must be a non-negative number", v));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                errors.push("min", format!("{} exceeds max {}", min, max));
            }
        }
        errors
    }
}

/// Restrictions on how a custom leave may be spent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaveConstraints {
    /// Units usable over the ledger's whole lifetime.
    #[serde(default)]
    pub avail_limit: UsageLimit,
    /// Units usable within one cycle.
    #[serde(default)]
    pub avail_limit_per_cycle: UsageLimit,
    /// Weekdays on which the leave may not be taken.
    #[serde(default)]
    pub limit_weekdays: Vec<Weekday>,
}

impl LeaveConstraints {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.extend_nested("avail_limit", self.avail_limit.validate());
        errors.extend_nested("avail_limit_per_cycle", self.avail_limit_per_cycle.validate());
        errors
    }

    pub fn allows_weekday(&self, weekday: Weekday) -> bool {
        !self.limit_weekdays.contains(&weekday)
    }
}

/// A scheduled increase of a leave balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditEvent {
    pub on: MonthDay,
    pub amount: f64,
}

/// A named, balance-tracked leave with accrual, expiry and carry-forward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomLeave {
    name: String,
    max_balance: f64,
    credits: Vec<CreditEvent>,
    expiries: Vec<MonthDay>,
    carry_forward_balance: f64,
    constraints: LeaveConstraints,
}

impl CustomLeave {
    pub fn builder(name: impl Into<String>) -> CustomLeaveBuilder {
        CustomLeaveBuilder {
            name: name.into(),
            max_balance: 0.0,
            credits: Vec::new(),
            expiries: Vec::new(),
            carry_forward_balance: 0.0,
            constraints: LeaveConstraints::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upper-cased initials of the name, e.g. `"Paid Leave"` → `"PL"`.
    pub fn shortname(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }

    pub fn max_balance(&self) -> f64 {
        self.max_balance
    }

    pub fn credits(&self) -> &[CreditEvent] {
        &self.credits
    }

    pub fn expiries(&self) -> &[MonthDay] {
        &self.expiries
    }

    pub fn carry_forward_balance(&self) -> f64 {
        self.carry_forward_balance
    }

    pub fn constraints(&self) -> &LeaveConstraints {
        &self.constraints
    }

    /// Total scheduled credit on `date`, if any credit event falls on it.
    pub fn credit_on(&self, date: NaiveDate) -> Option<f64> {
        let mut hit = false;
        let mut total = 0.0;
        for event in self.credits.iter().filter(|e| e.on.matches(date)) {
            hit = true;
            total += event.amount;
        }
        hit.then_some(total)
    }

    pub fn expires_on(&self, date: NaiveDate) -> bool {
        self.expiries.iter().any(|md| md.matches(date))
    }

    /// Expiry dates falling in `[from, until)`.
    pub fn expiries_between(&self, from: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|d| *d < until)
            .filter(|d| self.expires_on(*d))
            .collect()
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.push("name", "must not be empty");
        }
        if !self.max_balance.is_finite() || self.max_balance < 0.0 {
            errors.push("max_balance", format!("{} must be non-negative", self.max_balance));
        }
        for (i, event) in self.credits.iter().enumerate() {
            errors.extend_nested(&format!("credit_schedule[{}]", i), event.on.validate());
            if !event.amount.is_finite() || event.amount < 0.0 {
                errors.push(
                    format!("credit_amounts[{}]", i),
                    format!("{} must be non-negative", event.amount),
                );
            }
        }
        for (i, md) in self.expiries.iter().enumerate() {
            errors.extend_nested(&format!("expiry_schedule[{}]", i), md.validate());
        }
        if !self.carry_forward_balance.is_finite() || self.carry_forward_balance < 0.0 {
            errors.push(
                "carry_forward_balance",
                format!("{} must be non-negative", self.carry_forward_balance),
            );
        } else if self.carry_forward_balance > self.max_balance {
            errors.push(
                "carry_forward_balance",
                format!(
                    "{} exceeds max_balance {}",
                    self.carry_forward_balance, self.max_balance
                ),
            );
        }
        errors.extend_nested("constraints", self.constraints.validate());
        errors
    }
}

/// Collects the parts of a [`CustomLeave`]; [`build`](Self::build) validates them.
#[derive(Debug, Clone)]
pub struct CustomLeaveBuilder {
    name: String,
    max_balance: f64,
    credits: Vec<CreditEvent>,
    expiries: Vec<MonthDay>,
    carry_forward_balance: f64,
    constraints: LeaveConstraints,
}

impl CustomLeaveBuilder {
    pub fn max_balance(mut self, max: f64) -> Self {
        self.max_balance = max;
        self
    }

    pub fn credit(mut self, on: impl Into<MonthDay>, amount: f64) -> Self {
        self.credits.push(CreditEvent {
            on: on.into(),
            amount,
        });
        self
    }

    pub fn expiry(mut self, on: impl Into<MonthDay>) -> Self {
        self.expiries.push(on.into());
        self
    }

    pub fn carry_forward(mut self, cap: f64) -> Self {
        self.carry_forward_balance = cap;
        self
    }

    pub fn constraints(mut self, constraints: LeaveConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn per_cycle(mut self, limit: UsageLimit) -> Self {
        self.constraints.avail_limit_per_cycle = limit;
        self
    }

    pub fn lifetime(mut self, limit: UsageLimit) -> Self {
        self.constraints.avail_limit = limit;
        self
    }

    pub fn build(self) -> Result<CustomLeave> {
        let leave = CustomLeave {
            name: self.name,
            max_balance: self.max_balance,
            credits: self.credits,
            expiries: self.expiries,
            carry_forward_balance: self.carry_forward_balance,
            constraints: self.constraints,
        };
        leave.validate().into_result()?;
        Ok(leave)
    }
}

/// Either a weekly off rule or a balance-tracked custom leave.
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveType {
    CompulsoryWeekly(WeeklyOff),
    Custom(CustomLeave),
}

impl LeaveType {
    pub fn name(&self) -> &str {
        match self {
            LeaveType::CompulsoryWeekly(_) => "Weekly Off",
            LeaveType::Custom(leave) => leave.name(),
        }
    }

    /// The balance capability; `None` for weekly offs.
    pub fn as_custom(&self) -> Option<&CustomLeave> {
        match self {
            LeaveType::Custom(leave) => Some(leave),
            LeaveType::CompulsoryWeekly(_) => None,
        }
    }

    /// Dates of `cycle` this leave type makes off-days on its own. Custom
    /// leave only makes a day off once it is spent, so it contributes none.
    pub fn off_days(&self, cycle: &Cycle) -> Result<Vec<NaiveDate>> {
        match self {
            LeaveType::CompulsoryWeekly(rule) => recurrence::expand_weekly(rule, cycle),
            LeaveType::Custom(_) => Ok(Vec::new()),
        }
    }
}

impl From<CustomLeave> for LeaveType {
    fn from(leave: CustomLeave) -> Self {
        LeaveType::Custom(leave)
    }
}

impl From<WeeklyOff> for LeaveType {
    fn from(rule: WeeklyOff) -> Self {
        LeaveType::CompulsoryWeekly(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortname_uses_initials() {
        let leave = CustomLeave::builder("paid leave").max_balance(10.0).build().unwrap();
        assert_eq!(leave.shortname(), "PL");
    }

    #[test]
    fn build_collects_every_problem() {
        let err = CustomLeave::builder("")
            .max_balance(5.0)
            .credit((4, 1), -1.0)
            .carry_forward(6.0)
            .per_cycle(UsageLimit {
                min: Some(4.0),
                max: Some(2.0),
            })
            .build()
            .unwrap_err();
        match err {
            crate::PlanError::InvalidParameter(errors) => {
                let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
                assert_eq!(
                    fields,
                    vec![
                        "name",
                        "credit_amounts[0]",
                        "carry_forward_balance",
                        "constraints.avail_limit_per_cycle.min",
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn alternating_anchor_must_match_weekday() {
        let rule = WeeklyOff::Alternating {
            weekday: Weekday::Sat,
            anchor: NaiveDate::from_ymd_opt(2025, 4, 4).unwrap(),
        };
        assert_eq!(rule.validate().len(), 1);
    }
}
