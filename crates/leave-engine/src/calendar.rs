//! Planning cycles and the off-day calendar.
//!
//! A [`CycleSpec`] is the year-less definition of a planning period (e.g. the
//! Indian fiscal year, 1 April to 31 March). Instantiating it for a year gives
//! a concrete half-open [`Cycle`]. An [`OffDayCalendar`] classifies every day
//! of a cycle with exactly one [`OffReason`], merging weekly-offs, holidays
//! and leave from any number of sources.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result, ValidationErrors};
use crate::holiday::Holiday;

/// Days per month in a leap year; used to validate year-less dates.
const MAX_DAYS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A calendar date without a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Result<Self> {
        let md = MonthDay { month, day };
        md.validate().into_result()?;
        Ok(md)
    }

    /// Field checks: month in 1..=12 and the day must exist in a leap year.
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !(1..=12).contains(&self.month) {
            errors.push("month", format!("{} is not in 1..=12", self.month));
        } else if self.day < 1 || self.day > MAX_DAYS[(self.month - 1) as usize] {
            errors.push(
                "day",
                format!("{} is not a valid day of month {}", self.day, self.month),
            );
        }
        errors
    }

    /// The concrete date in `year`, or `None` for 29 February in a common year.
    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

impl From<(u32, u32)> for MonthDay {
    fn from((month, day): (u32, u32)) -> Self {
        MonthDay { month, day }
    }
}

impl std::fmt::Display for MonthDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Year-less definition of a recurring planning cycle.
///
/// `end` is the first day after the cycle (exclusive), so `start == end` is
/// the empty cycle. When `end` falls before `start` within a calendar year
/// the cycle wraps into the following year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSpec {
    pub start: MonthDay,
    pub end: MonthDay,
}

impl CycleSpec {
    /// The calendar year, January to December.
    pub fn calendar_year() -> Self {
        CycleSpec {
            start: MonthDay { month: 1, day: 1 },
            end: MonthDay { month: 12, day: 31 },
        }
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.extend_nested("start", self.start.validate());
        errors.extend_nested("end", self.end.validate());
        errors
    }

    /// Whether the end lands in the year after the start.
    pub fn wraps(&self) -> bool {
        self.end < self.start
    }

    /// Concrete cycle starting in `year`.
    pub fn instantiate(&self, year: i32) -> Result<Cycle> {
        self.validate().into_result()?;
        let start = self.start.in_year(year).ok_or_else(|| {
            PlanError::invalid("cycle.start", format!("{} does not exist in {}", self.start, year))
        })?;
        let end_year = if self.wraps() { year + 1 } else { year };
        let end = self.end.in_year(end_year).ok_or_else(|| {
            PlanError::invalid("cycle.end", format!("{} does not exist in {}", self.end, end_year))
        })?;
        Cycle::new(start, end)
    }
}

impl Default for CycleSpec {
    fn default() -> Self {
        Self::calendar_year()
    }
}

/// A concrete, half-open range of dates `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cycle {
    start: NaiveDate,
    end: NaiveDate,
}

impl Cycle {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(PlanError::invalid(
                "cycle",
                format!("end {} precedes start {}", end, start),
            ));
        }
        Ok(Cycle { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the cycle.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            None
        } else {
            self.end.pred_opt()
        }
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Every date of the cycle, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }

    /// The same cycle one year later.
    pub fn following(&self) -> Option<Cycle> {
        Some(Cycle {
            start: self.start.checked_add_months(Months::new(12))?,
            end: self.end.checked_add_months(Months::new(12))?,
        })
    }

    /// From the start up to the next yearly instance's start. Covers any days
    /// between `end` and the following start. An empty cycle spans nothing.
    pub fn span(&self) -> Cycle {
        if self.is_empty() {
            return *self;
        }
        match self.following() {
            Some(next) => Cycle {
                start: self.start,
                end: next.start.max(self.end),
            },
            None => *self,
        }
    }

    /// The same cycle one year earlier.
    pub fn preceding(&self) -> Option<Cycle> {
        Some(Cycle {
            start: self.start.checked_sub_months(Months::new(12))?,
            end: self.end.checked_sub_months(Months::new(12))?,
        })
    }

    /// The yearly instance of this cycle in force on `date`: the latest
    /// instance whose start is on or before `date`.
    pub fn instance_at(&self, date: NaiveDate) -> Option<Cycle> {
        let mut cycle = *self;
        while date < cycle.start {
            cycle = cycle.preceding()?;
        }
        loop {
            let next = cycle.following()?;
            if next.start > date {
                return Some(cycle);
            }
            cycle = next;
        }
    }
}

/// Why a date is (or is not) a day off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffReason {
    Holiday,
    WeeklyOff,
    Leave,
    Work,
}

impl OffReason {
    /// Fixed precedence: holiday > weekly-off > leave > work-day.
    pub fn rank(self) -> u8 {
        match self {
            OffReason::Holiday => 3,
            OffReason::WeeklyOff => 2,
            OffReason::Leave => 1,
            OffReason::Work => 0,
        }
    }

    pub fn is_off(self) -> bool {
        self != OffReason::Work
    }
}

/// One classified day of the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OffDay {
    pub date: NaiveDate,
    pub reason: OffReason,
    /// Holiday priority for holidays, 0 otherwise.
    pub priority: u8,
    /// Holiday name or leave type name.
    pub label: Option<String>,
}

impl OffDay {
    fn work(date: NaiveDate) -> Self {
        OffDay {
            date,
            reason: OffReason::Work,
            priority: 0,
            label: None,
        }
    }

    pub fn is_off(&self) -> bool {
        self.reason.is_off()
    }

    /// Whether `self` wins over `other` for the same date. Insertion order
    /// never matters: reason rank first, then priority, then the smaller label.
    fn outranks(&self, other: &OffDay) -> bool {
        let a = (self.reason.rank(), self.priority);
        let b = (other.reason.rank(), other.priority);
        if a != b {
            return a > b;
        }
        match (&self.label, &other.label) {
            (Some(x), Some(y)) => x < y,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Collects off-day marks from several sources before resolving each date.
#[derive(Debug, Clone)]
pub struct CalendarBuilder {
    cycle: Cycle,
    marks: BTreeMap<NaiveDate, OffDay>,
}

impl CalendarBuilder {
    pub fn new(cycle: Cycle) -> Self {
        CalendarBuilder {
            cycle,
            marks: BTreeMap::new(),
        }
    }

    /// Record a reason for `date`. Dates outside the cycle are ignored.
    pub fn mark(
        &mut self,
        date: NaiveDate,
        reason: OffReason,
        priority: u8,
        label: Option<String>,
    ) -> &mut Self {
        if !self.cycle.contains(date) || !reason.is_off() {
            return self;
        }
        let candidate = OffDay {
            date,
            reason,
            priority,
            label,
        };
        match self.marks.get(&date) {
            Some(current) if !candidate.outranks(current) => {}
            _ => {
                self.marks.insert(date, candidate);
            }
        }
        self
    }

    pub fn weekly_off<I>(&mut self, dates: I) -> &mut Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        for date in dates {
            self.mark(date, OffReason::WeeklyOff, 0, None);
        }
        self
    }

    pub fn holiday(&mut self, holiday: &Holiday) -> &mut Self {
        self.mark(
            holiday.date,
            OffReason::Holiday,
            holiday.priority,
            Some(holiday.name.clone()),
        )
    }

    pub fn leave(&mut self, date: NaiveDate, leave: &str) -> &mut Self {
        self.mark(date, OffReason::Leave, 0, Some(leave.to_string()))
    }

    pub fn build(&self) -> OffDayCalendar {
        let days = self
            .cycle
            .days()
            .map(|date| {
                self.marks
                    .get(&date)
                    .cloned()
                    .unwrap_or_else(|| OffDay::work(date))
            })
            .collect();
        OffDayCalendar {
            cycle: self.cycle,
            days,
        }
    }
}

/// Every day of one cycle with its winning off-day reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffDayCalendar {
    cycle: Cycle,
    days: Vec<OffDay>,
}

impl OffDayCalendar {
    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn days(&self) -> &[OffDay] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&OffDay> {
        if !self.cycle.contains(date) {
            return None;
        }
        let idx = (date - self.cycle.start()).num_days() as usize;
        self.days.get(idx)
    }

    pub fn is_off(&self, date: NaiveDate) -> bool {
        self.get(date).is_some_and(OffDay::is_off)
    }

    pub fn count(&self, reason: OffReason) -> usize {
        self.days.iter().filter(|d| d.reason == reason).count()
    }

    pub fn off_days(&self) -> impl Iterator<Item = &OffDay> {
        self.days.iter().filter(|d| d.is_off())
    }
}
