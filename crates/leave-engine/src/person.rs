//! A person whose leave is being planned.

use std::collections::HashSet;

use chrono::NaiveDate;

use crate::calendar::CycleSpec;
use crate::error::{Result, ValidationErrors};
use crate::holiday::Holiday;
use crate::leave::{CustomLeave, LeaveType, WeeklyOff};

/// The end user: a home cycle, their leave types and personal holidays.
///
/// Holidays given here are layered on top of the organization-wide set held
/// by the [`Planner`](crate::planner::Planner).
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    name: String,
    cycle: CycleSpec,
    leaves: Vec<LeaveType>,
    additional_holidays: Vec<Holiday>,
    required_leaves: Vec<NaiveDate>,
}

impl Person {
    pub fn builder(name: impl Into<String>) -> PersonBuilder {
        PersonBuilder {
            name: name.into(),
            cycle: CycleSpec::default(),
            weekly: None,
            custom: Vec::new(),
            additional_holidays: Vec::new(),
            required_leaves: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cycle(&self) -> &CycleSpec {
        &self.cycle
    }

    /// All leave types, weekly rules first, custom leave in declaration order.
    pub fn leaves(&self) -> &[LeaveType] {
        &self.leaves
    }

    pub fn custom_leaves(&self) -> impl Iterator<Item = &CustomLeave> {
        self.leaves.iter().filter_map(LeaveType::as_custom)
    }

    pub fn additional_holidays(&self) -> &[Holiday] {
        &self.additional_holidays
    }

    /// Dates the person must take off regardless of optimization.
    pub fn required_leaves(&self) -> &[NaiveDate] {
        &self.required_leaves
    }
}

#[derive(Debug, Clone)]
pub struct PersonBuilder {
    name: String,
    cycle: CycleSpec,
    weekly: Option<Vec<WeeklyOff>>,
    custom: Vec<CustomLeave>,
    additional_holidays: Vec<Holiday>,
    required_leaves: Vec<NaiveDate>,
}

impl PersonBuilder {
    pub fn cycle(mut self, cycle: CycleSpec) -> Self {
        self.cycle = cycle;
        self
    }

    /// Add a weekly off rule. Without any, Saturday and Sunday are off.
    pub fn weekly_off(mut self, rule: WeeklyOff) -> Self {
        self.weekly.get_or_insert_with(Vec::new).push(rule);
        self
    }

    /// Work every day of the week.
    pub fn no_weekly_off(mut self) -> Self {
        self.weekly = Some(Vec::new());
        self
    }

    pub fn custom_leave(mut self, leave: CustomLeave) -> Self {
        self.custom.push(leave);
        self
    }

    pub fn holiday(mut self, holiday: Holiday) -> Self {
        self.additional_holidays.push(holiday);
        self
    }

    pub fn required_leave(mut self, date: NaiveDate) -> Self {
        self.required_leaves.push(date);
        self
    }

    pub fn build(self) -> Result<Person> {
        let mut errors = ValidationErrors::new();
        if self.name.trim().is_empty() {
            errors.push("name", "must not be empty");
        }
        errors.extend_nested("cycle", self.cycle.validate());

        let weekly = self.weekly.unwrap_or_else(|| vec![WeeklyOff::weekend()]);
        for (i, rule) in weekly.iter().enumerate() {
            errors.extend_nested(&format!("weekly_off[{}]", i), rule.validate());
        }

        let mut seen = HashSet::new();
        for (i, leave) in self.custom.iter().enumerate() {
            if !seen.insert(leave.name().to_string()) {
                errors.push(
                    format!("custom_leaves[{}].name", i),
                    format!("duplicate leave type {:?}", leave.name()),
                );
            }
        }
        for (i, holiday) in self.additional_holidays.iter().enumerate() {
            errors.extend_nested(&format!("additional_holidays[{}]", i), holiday.validate());
        }
        errors.into_result()?;

        let mut required_leaves = self.required_leaves;
        required_leaves.sort();
        required_leaves.dedup();

        let leaves = weekly
            .into_iter()
            .map(LeaveType::CompulsoryWeekly)
            .chain(self.custom.into_iter().map(LeaveType::Custom))
            .collect();

        Ok(Person {
            name: self.name,
            cycle: self.cycle,
            leaves,
            additional_holidays: self.additional_holidays,
            required_leaves,
        })
    }
}
