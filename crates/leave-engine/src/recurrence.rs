//! Weekly-off expansion -- converts a [`WeeklyOff`] rule into the concrete
//! off-dates of a cycle.
//!
//! Rules are rendered as RFC 5545 RRULEs (`FREQ=WEEKLY;BYDAY=SA,SU`,
//! `FREQ=WEEKLY;INTERVAL=2;BYDAY=SA`) and expanded with the `rrule` crate in
//! UTC, which keeps the calendar free of any timezone shifts.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use rrule::RRuleSet;

use crate::calendar::Cycle;
use crate::error::{PlanError, Result};
use crate::leave::WeeklyOff;

/// Two weeks, the period of an alternating rule.
const FORTNIGHT_DAYS: i64 = 14;

/// Expand `rule` into every date of `cycle` it marks as off, in order.
///
/// # Errors
/// Returns `PlanError::InvalidParameter` if the rule fails validation and
/// `PlanError::Recurrence` if the generated RRULE cannot be parsed.
pub fn expand_weekly(rule: &WeeklyOff, cycle: &Cycle) -> Result<Vec<NaiveDate>> {
    rule.validate().into_result()?;

    let last = match cycle.last_day() {
        Some(last) => last,
        None => return Ok(Vec::new()),
    };

    let (rrule, dtstart, weekdays) = match rule {
        WeeklyOff::Fixed { days } => (
            format!("FREQ=WEEKLY;BYDAY={}", byday_list(days)),
            cycle.start(),
            days.clone(),
        ),
        WeeklyOff::Alternating { weekday, anchor } => (
            format!("FREQ=WEEKLY;INTERVAL=2;BYDAY={}", byday(*weekday)),
            align_anchor(*anchor, cycle.start()),
            vec![*weekday],
        ),
    };

    // Upper bound on instances: every day of the cycle plus the lead-in
    // before an aligned anchor.
    let max_count = (cycle.len_days() + FORTNIGHT_DAYS).clamp(1, u16::MAX as i64) as u16;

    let text = format!(
        "DTSTART;TZID=UTC:{}\nRRULE:{};UNTIL={}Z",
        ical_date(dtstart, "000000"),
        rrule,
        ical_date(last, "235959"),
    );

    let rrule_set: RRuleSet = text
        .parse()
        .map_err(|e| PlanError::Recurrence(format!("{}", e)))?;

    let dates = rrule_set
        .all(max_count)
        .dates
        .into_iter()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        // DTSTART itself is emitted even when it is not one of the BYDAYs.
        .filter(|d| cycle.contains(*d) && weekdays.contains(&d.weekday()))
        .collect();

    Ok(dates)
}

/// Move `anchor` back by whole fortnights until it is on or before `start`,
/// so the expansion covers the cycle from its first day.
fn align_anchor(anchor: NaiveDate, start: NaiveDate) -> NaiveDate {
    if anchor <= start {
        return anchor;
    }
    let behind = (anchor - start).num_days();
    let fortnights = (behind + FORTNIGHT_DAYS - 1) / FORTNIGHT_DAYS;
    anchor - Duration::days(fortnights * FORTNIGHT_DAYS)
}

fn ical_date(date: NaiveDate, time: &str) -> String {
    format!("{}T{}", date.format("%Y%m%d"), time)
}

fn byday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn byday_list(days: &[Weekday]) -> String {
    days.iter().map(|d| byday(*d)).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn anchor_is_pulled_back_by_fortnights() {
        let aligned = align_anchor(date(2025, 4, 26), date(2025, 4, 1));
        assert_eq!(aligned, date(2025, 3, 29));
        assert_eq!((date(2025, 4, 26) - aligned).num_days() % 14, 0);
    }

    #[test]
    fn byday_list_joins_codes() {
        assert_eq!(byday_list(&[Weekday::Sat, Weekday::Sun]), "SA,SU");
    }
}
