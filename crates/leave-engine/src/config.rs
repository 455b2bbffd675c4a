//! JSON plan documents.
//!
//! A [`PlanConfig`] mirrors the domain types field for field but stays a
//! plain serde value: nothing is validated while parsing beyond the shape of
//! the document. [`PlanConfig::into_planner`] then builds the validated
//! [`Planner`], reporting every field problem at once with a dotted path.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::{CycleSpec, MonthDay};
use crate::error::{PlanError, Result, ValidationErrors};
use crate::holiday::Holiday;
use crate::leave::{CustomLeave, LeaveConstraints, WeeklyOff};
use crate::person::Person;
use crate::planner::Planner;

/// Top-level plan document: `{year, holidays, persons}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanConfig {
    /// Year in which every person's cycle starts.
    pub year: i32,
    /// Organization-wide holidays.
    #[serde(default)]
    pub holidays: Vec<Holiday>,
    #[serde(default)]
    pub persons: Vec<PersonConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonConfig {
    pub name: String,
    #[serde(default)]
    pub cycle: CycleSpec,
    /// Omitted means Saturday and Sunday; an empty list means no weekly off.
    #[serde(default)]
    pub weekly_off: Option<Vec<WeeklyOff>>,
    #[serde(default)]
    pub custom_leaves: Vec<CustomLeaveConfig>,
    #[serde(default)]
    pub additional_holidays: Vec<Holiday>,
    #[serde(default)]
    pub required_leaves: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomLeaveConfig {
    pub name: String,
    pub max_balance: f64,
    #[serde(default)]
    pub credit_schedule: Vec<MonthDay>,
    #[serde(default)]
    pub expiry_schedule: Vec<MonthDay>,
    /// One amount per `credit_schedule` entry.
    #[serde(default)]
    pub credit_amounts: Vec<f64>,
    #[serde(default)]
    pub carry_forward_balance: f64,
    #[serde(default)]
    pub constraints: LeaveConstraints,
}

impl PlanConfig {
    /// Parse a JSON document.
    ///
    /// # Errors
    /// `InvalidParameter` on the `document` field when the JSON is malformed
    /// or does not have the expected shape.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PlanError::invalid("document", e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlanError::invalid("document", e.to_string()))
    }

    /// Build the validated planner.
    ///
    /// # Errors
    /// `InvalidParameter` listing every invalid field of every person.
    pub fn into_planner(self) -> Result<Planner> {
        let mut errors = ValidationErrors::new();
        let mut persons = Vec::with_capacity(self.persons.len());
        for (i, person) in self.persons.into_iter().enumerate() {
            match person.into_person() {
                Ok(p) => persons.push(p),
                Err(PlanError::InvalidParameter(nested)) => {
                    errors.extend_nested(&format!("persons[{}]", i), nested)
                }
                Err(other) => return Err(other),
            }
        }
        errors.into_result()?;
        Planner::new(self.year, self.holidays, persons)
    }
}

impl PersonConfig {
    pub fn into_person(self) -> Result<Person> {
        let mut errors = ValidationErrors::new();
        let mut builder = Person::builder(self.name).cycle(self.cycle);
        match self.weekly_off {
            Some(rules) if rules.is_empty() => builder = builder.no_weekly_off(),
            Some(rules) => {
                for rule in rules {
                    builder = builder.weekly_off(rule);
                }
            }
            None => {}
        }
        for (i, leave) in self.custom_leaves.into_iter().enumerate() {
            match leave.into_leave() {
                Ok(leave) => builder = builder.custom_leave(leave),
                Err(PlanError::InvalidParameter(nested)) => {
                    errors.extend_nested(&format!("custom_leaves[{}]", i), nested)
                }
                Err(other) => return Err(other),
            }
        }
        for holiday in self.additional_holidays {
            builder = builder.holiday(holiday);
        }
        for date in self.required_leaves {
            builder = builder.required_leave(date);
        }

        match builder.build() {
            Ok(person) if errors.is_empty() => Ok(person),
            Ok(_) => Err(PlanError::InvalidParameter(errors)),
            Err(PlanError::InvalidParameter(nested)) => {
                for err in nested.errors() {
                    errors.push(err.field.clone(), err.message.clone());
                }
                Err(PlanError::InvalidParameter(errors))
            }
            Err(other) => Err(other),
        }
    }
}

impl CustomLeaveConfig {
    pub fn into_leave(self) -> Result<CustomLeave> {
        if self.credit_amounts.len() != self.credit_schedule.len() {
            return Err(PlanError::invalid(
                "credit_amounts",
                format!(
                    "{} amounts for {} credit dates",
                    self.credit_amounts.len(),
                    self.credit_schedule.len()
                ),
            ));
        }
        let mut builder = CustomLeave::builder(self.name)
            .max_balance(self.max_balance)
            .carry_forward(self.carry_forward_balance)
            .constraints(self.constraints);
        for (on, amount) in self.credit_schedule.into_iter().zip(self.credit_amounts) {
            builder = builder.credit(on, amount);
        }
        for on in self.expiry_schedule {
            builder = builder.expiry(on);
        }
        builder.build()
    }
}
