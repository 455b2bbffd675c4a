//! Planner facade: per-person orchestration and summary reports.
//!
//! Every person is planned independently against the organization-wide
//! holidays. A failure for one person is recorded in the report and never
//! prevents the others from being planned.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarBuilder, Cycle, OffDayCalendar, OffReason};
use crate::error::{Result, ValidationErrors};
use crate::holiday::Holiday;
use crate::ledger::{Ledger, UsageNotice};
use crate::optimizer::{self, BlockQuery, VacationBlock};
use crate::person::Person;

/// Decimal places kept in ratios.
const RATIO_DECIMALS: i32 = 5;

/// Paid-holiday count and its share of the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaidHolidays {
    pub total: usize,
    pub ratio: f64,
}

/// One vacation block as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub duration: i64,
    pub values: Option<BTreeMap<String, f64>>,
    /// Gap days that could not be converted to leave.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fillable: Vec<NaiveDate>,
}

impl From<&VacationBlock> for BlockReport {
    fn from(block: &VacationBlock) -> Self {
        BlockReport {
            start: block.start,
            end: block.end,
            duration: block.duration,
            values: block.values.clone(),
            fillable: block.fillable(),
        }
    }
}

/// Long-weekend result for one person.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongWeekends {
    pub count: usize,
    /// Keyed by block label (`VACATION #NNN`).
    pub subgroups: BTreeMap<String, BlockReport>,
    /// Balance per leave type on the last day of the cycle, after planning.
    pub remaining: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notices: Vec<UsageNotice>,
}

/// Per-person results plus the persons that could not be planned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReport<T> {
    pub results: BTreeMap<String, T>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

impl<T> PlanReport<T> {
    fn new() -> Self {
        PlanReport {
            results: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }

    fn record(&mut self, person: &str, outcome: Result<T>) {
        match outcome {
            Ok(value) => {
                self.results.insert(person.to_string(), value);
            }
            Err(e) => {
                warn!(person, error = %e, "planning failed");
                self.failures.insert(person.to_string(), e.to_string());
            }
        }
    }

    pub fn get(&self, person: &str) -> Option<&T> {
        self.results.get(person)
    }
}

/// Plans every person's leave for the cycle starting in `year`.
#[derive(Debug, Clone)]
pub struct Planner {
    year: i32,
    holidays: Vec<Holiday>,
    persons: Vec<Person>,
}

impl Planner {
    /// # Errors
    /// `InvalidParameter` for a year outside 1..=9998, invalid holidays or
    /// duplicate person names.
    pub fn new(year: i32, holidays: Vec<Holiday>, persons: Vec<Person>) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        if !(1..=9998).contains(&year) {
            errors.push("year", format!("{} is not in 1..=9998", year));
        }
        for (i, holiday) in holidays.iter().enumerate() {
            errors.extend_nested(&format!("holidays[{}]", i), holiday.validate());
        }
        let mut seen = HashSet::new();
        for (i, person) in persons.iter().enumerate() {
            if !seen.insert(person.name()) {
                errors.push(
                    format!("persons[{}].name", i),
                    format!("duplicate person {:?}", person.name()),
                );
            }
        }
        errors.into_result()?;
        Ok(Planner {
            year,
            holidays,
            persons,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn holidays(&self) -> &[Holiday] {
        &self.holidays
    }

    pub fn persons(&self) -> &[Person] {
        &self.persons
    }

    pub fn person(&self, name: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.name() == name)
    }

    /// The person's home cycle, instantiated for the planner year.
    pub fn cycle_for(&self, person: &Person) -> Result<Cycle> {
        person.cycle().instantiate(self.year)
    }

    /// Weekly offs and holidays for the person's cycle (no leave yet).
    pub fn calendar_for(&self, person: &Person) -> Result<OffDayCalendar> {
        let cycle = self.cycle_for(person)?;
        Ok(self.calendar_builder(person, cycle)?.build())
    }

    /// A fresh ledger with every credit of the person's cycle applied.
    pub fn ledger_for(&self, person: &Person) -> Result<Ledger> {
        let cycle = self.cycle_for(person)?;
        let mut ledger = Ledger::for_person(person, cycle);
        ledger.accrue(&cycle)?;
        Ok(ledger)
    }

    /// Paid-holiday days per person and their ratio to the cycle length.
    pub fn verbose_paid_holidays(&self) -> PlanReport<PaidHolidays> {
        let mut report = PlanReport::new();
        for person in &self.persons {
            let outcome = self.calendar_for(person).map(|calendar| {
                let total = calendar.count(OffReason::Holiday);
                let days = calendar.cycle().len_days();
                let ratio = if days == 0 {
                    0.0
                } else {
                    round_to(total as f64 / days as f64, RATIO_DECIMALS)
                };
                PaidHolidays { total, ratio }
            });
            report.record(person.name(), outcome);
        }
        report
    }

    /// Long weekends per person, extended with leave where balances allow.
    ///
    /// # Errors
    /// `InvalidParameter` when `tolerance < 0` or `min_count < 1`. Problems
    /// with a single person land in [`PlanReport::failures`] instead.
    pub fn long_weekends(&self, tolerance: i64, min_count: i64) -> Result<PlanReport<LongWeekends>> {
        let query = BlockQuery::new(tolerance, min_count)?;
        let mut report = PlanReport::new();
        for person in &self.persons {
            report.record(person.name(), self.plan_person(person, query));
        }
        Ok(report)
    }

    fn plan_person(&self, person: &Person, query: BlockQuery) -> Result<LongWeekends> {
        let cycle = self.cycle_for(person)?;
        let mut ledger = self.ledger_for(person)?;
        let mut builder = self.calendar_builder(person, cycle)?;
        fund_required_leaves(person, &mut ledger, &mut builder)?;
        let calendar = builder.build();
        debug!(
            person = person.name(),
            days = calendar.len(),
            off = calendar.off_days().count(),
            "calendar built"
        );

        let mut blocks = optimizer::detect_blocks(&calendar, query);
        let summary = optimizer::extend_blocks(&mut blocks, &calendar, &mut ledger)?;

        let mut remaining = BTreeMap::new();
        if let Some(last) = cycle.last_day() {
            for name in ledger.leave_names() {
                remaining.insert(name.to_string(), ledger.available(name, last)?);
            }
        }
        let notices = ledger.reconcile(&cycle);

        info!(
            person = person.name(),
            blocks = blocks.len(),
            gaps_filled = summary.gaps_filled,
            units_spent = summary.units_spent,
            "long weekends planned"
        );

        Ok(LongWeekends {
            count: blocks.len(),
            subgroups: blocks
                .iter()
                .map(|block| (block.label(), BlockReport::from(block)))
                .collect(),
            remaining,
            notices,
        })
    }

    fn calendar_builder(&self, person: &Person, cycle: Cycle) -> Result<CalendarBuilder> {
        let mut builder = CalendarBuilder::new(cycle);
        for leave in person.leaves() {
            builder.weekly_off(leave.off_days(&cycle)?);
        }
        for holiday in self.holidays.iter().chain(person.additional_holidays()) {
            builder.holiday(holiday);
        }
        Ok(builder)
    }
}

/// Spend leave for the person's required days that are not already off.
/// A day that cannot be funded stays a work-day.
fn fund_required_leaves(
    person: &Person,
    ledger: &mut Ledger,
    builder: &mut CalendarBuilder,
) -> Result<()> {
    let fixed = builder.build();
    for &date in person.required_leaves() {
        if fixed.get(date).is_none_or(|day| day.is_off()) {
            continue;
        }
        let funded = optimizer::choose_leave(ledger, date)
            .and_then(|leave| ledger.spend(&leave, date, 1.0).map(|_| leave));
        match funded {
            Ok(leave) => {
                builder.leave(date, &leave);
            }
            Err(e) if e.is_recoverable() => {
                warn!(person = person.name(), %date, error = %e, "required leave not funded");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
