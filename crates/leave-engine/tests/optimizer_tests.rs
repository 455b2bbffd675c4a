//! Tests for vacation block detection and gap filling.

use chrono::NaiveDate;
use leave_engine::optimizer::{choose_leave, detect_blocks, extend_blocks, find_runs, long_weekends};
use leave_engine::recurrence::expand_weekly;
use leave_engine::{
    BlockQuery, CalendarBuilder, CustomLeave, Cycle, Holiday, Ledger, OffDayCalendar, PlanError,
    UsageLimit, WeeklyOff,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn january() -> Cycle {
    Cycle::new(date(2025, 1, 1), date(2025, 2, 1)).unwrap()
}

/// January 2025 with Saturday/Sunday off and the given holidays.
fn weekend_calendar(holidays: &[u32]) -> OffDayCalendar {
    let cycle = january();
    let mut builder = CalendarBuilder::new(cycle);
    builder.weekly_off(expand_weekly(&WeeklyOff::weekend(), &cycle).unwrap());
    for &d in holidays {
        builder.holiday(&Holiday::new(date(2025, 1, d), "", 0).unwrap());
    }
    builder.build()
}

/// January 2025 with no weekly off; only the given holidays are off.
///
/// With `[5, 6, 8, 9, 15, 18]` and tolerance 2 this gives two blocks:
/// 5..=9 with a one-day gap (7th) and 15..=18 with a two-day gap (16th, 17th).
fn holiday_calendar(holidays: &[u32]) -> OffDayCalendar {
    let mut builder = CalendarBuilder::new(january());
    for &d in holidays {
        builder.holiday(&Holiday::new(date(2025, 1, d), "", 0).unwrap());
    }
    builder.build()
}

fn comp_off(balance: f64) -> CustomLeave {
    CustomLeave::builder("Comp Off")
        .max_balance(10.0)
        .credit((1, 1), balance)
        .build()
        .unwrap()
}

fn ledger_with(leaves: Vec<CustomLeave>) -> Ledger {
    let cycle = january();
    let mut ledger = Ledger::new("asha", cycle, leaves);
    ledger.accrue(&cycle).unwrap();
    ledger
}

fn query(tolerance: i64, min_count: i64) -> BlockQuery {
    BlockQuery::new(tolerance, min_count).unwrap()
}

// ---------------------------------------------------------------------------
// Run detection
// ---------------------------------------------------------------------------

#[test]
fn zero_tolerance_gives_maximal_runs() {
    let runs = find_runs(&weekend_calendar(&[]), 0);
    let spans: Vec<(NaiveDate, NaiveDate)> = runs.iter().map(|r| (r.start, r.end)).collect();
    assert_eq!(
        spans,
        vec![
            (date(2025, 1, 4), date(2025, 1, 5)),
            (date(2025, 1, 11), date(2025, 1, 12)),
            (date(2025, 1, 18), date(2025, 1, 19)),
            (date(2025, 1, 25), date(2025, 1, 26)),
        ]
    );
    assert!(runs.iter().all(|r| r.gaps.is_empty() && r.duration == 2));
}

#[test]
fn wide_tolerance_bridges_whole_weeks() {
    let runs = find_runs(&weekend_calendar(&[]), 5);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].start, date(2025, 1, 4));
    assert_eq!(runs[0].end, date(2025, 1, 26));
    assert_eq!(runs[0].duration, 23);
    assert_eq!(runs[0].gaps.len(), 3);
    assert!(runs[0].gaps.iter().all(|g| g.len() == 5));
}

#[test]
fn leading_and_trailing_work_days_are_not_absorbed() {
    let runs = find_runs(&weekend_calendar(&[]), 5);
    // Jan 1-3 and Jan 27-31 are work-days around the run.
    assert!(runs.iter().all(|r| r.start >= date(2025, 1, 4)));
    assert!(runs.iter().all(|r| r.end <= date(2025, 1, 26)));
}

#[test]
fn blocks_keep_walk_position_numbering() {
    // Friday the 17th joins the third weekend.
    let blocks = detect_blocks(&weekend_calendar(&[17]), query(0, 3));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].position, 3);
    assert_eq!(blocks[0].label(), "VACATION #003");
    assert_eq!(blocks[0].start, date(2025, 1, 17));
    assert_eq!(blocks[0].duration, 3);
    assert_eq!(blocks[0].values, None);
}

#[test]
fn one_day_gap_is_bridged_at_tolerance_one() {
    // Thursday the 9th and the following weekend, Friday in between.
    let blocks = detect_blocks(&weekend_calendar(&[9]), query(1, 3));
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!((block.start, block.end), (date(2025, 1, 9), date(2025, 1, 12)));
    assert_eq!(block.fillable(), vec![date(2025, 1, 10)]);
}

#[test]
fn no_off_days_means_no_blocks() {
    let calendar = holiday_calendar(&[]);
    assert!(find_runs(&calendar, 3).is_empty());
}

#[test]
fn min_count_larger_than_cycle_finds_nothing() {
    assert!(detect_blocks(&weekend_calendar(&[]), query(5, 40)).is_empty());
}

#[test]
fn invalid_query_reports_every_field() {
    let err = BlockQuery::new(-1, 0).unwrap_err();
    match err {
        PlanError::InvalidParameter(errors) => {
            let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
            assert_eq!(fields, vec!["tolerance", "min_count"]);
        }
        other => panic!("expected InvalidParameter, got {other:?}"),
    }
    assert!(long_weekends(&weekend_calendar(&[]), 1, 0).is_err());
}

// ---------------------------------------------------------------------------
// Gap filling
// ---------------------------------------------------------------------------

#[test]
fn smallest_gaps_are_filled_first() {
    let calendar = holiday_calendar(&[5, 6, 8, 9, 15, 18]);
    let mut blocks = detect_blocks(&calendar, query(2, 3));
    assert_eq!(blocks.len(), 2);

    let mut ledger = ledger_with(vec![comp_off(2.0)]);
    let summary = extend_blocks(&mut blocks, &calendar, &mut ledger).unwrap();

    assert_eq!(summary.gaps_filled, 1);
    assert_eq!(summary.gaps_skipped, 1);
    assert_eq!(summary.units_spent, 1.0);
    assert!(blocks[0].fillable().is_empty());
    assert_eq!(blocks[0].filled.get(&date(2025, 1, 7)).map(String::as_str), Some("Comp Off"));
    assert_eq!(blocks[0].values.as_ref().unwrap()["Comp Off"], 1.0);
    assert_eq!(blocks[1].fillable(), vec![date(2025, 1, 16), date(2025, 1, 17)]);
    assert_eq!(blocks[1].values, None);
}

#[test]
fn partially_fundable_gap_is_rolled_back() {
    let calendar = holiday_calendar(&[5, 6, 8, 9, 15, 18]);
    let mut blocks = detect_blocks(&calendar, query(2, 3));
    let mut ledger = ledger_with(vec![comp_off(2.0)]);
    extend_blocks(&mut blocks, &calendar, &mut ledger).unwrap();

    // One unit spent on the 7th; the 16th alone would have been affordable.
    assert_eq!(ledger.available("Comp Off", date(2025, 1, 31)).unwrap(), 1.0);
    assert_eq!(ledger.used_total("Comp Off").unwrap(), 1.0);
}

#[test]
fn enough_balance_fills_every_gap() {
    let calendar = holiday_calendar(&[5, 6, 8, 9, 15, 18]);
    let mut blocks = detect_blocks(&calendar, query(2, 3));
    let mut ledger = ledger_with(vec![comp_off(3.0)]);
    let summary = extend_blocks(&mut blocks, &calendar, &mut ledger).unwrap();

    assert_eq!(summary.gaps_filled, 2);
    assert_eq!(summary.units_spent, 3.0);
    assert!(blocks.iter().all(|b| b.fillable().is_empty()));
    assert_eq!(ledger.available("Comp Off", date(2025, 1, 31)).unwrap(), 0.0);
}

#[test]
fn no_leave_types_leaves_every_gap_fillable() {
    let calendar = holiday_calendar(&[5, 6, 8, 9]);
    let mut blocks = detect_blocks(&calendar, query(1, 3));
    let mut ledger = ledger_with(Vec::new());
    let summary = extend_blocks(&mut blocks, &calendar, &mut ledger).unwrap();
    assert_eq!(summary.gaps_filled, 0);
    assert_eq!(blocks[0].fillable(), vec![date(2025, 1, 7)]);
}

#[test]
fn gap_crossing_an_expiry_is_rejected() {
    let leave = CustomLeave::builder("Comp Off")
        .max_balance(10.0)
        .credit((1, 1), 5.0)
        .expiry((1, 16))
        .build()
        .unwrap();
    let calendar = holiday_calendar(&[15, 18]);
    let mut blocks = detect_blocks(&calendar, query(2, 3));
    let mut ledger = ledger_with(vec![leave]);
    let err = extend_blocks(&mut blocks, &calendar, &mut ledger).unwrap_err();
    assert!(err.to_string().contains("expiry"));
}

#[test]
fn existing_leave_days_count_towards_values() {
    let cycle = january();
    let mut builder = CalendarBuilder::new(cycle);
    builder.holiday(&Holiday::new(date(2025, 1, 5), "", 0).unwrap());
    builder.leave(date(2025, 1, 6), "Comp Off");
    builder.holiday(&Holiday::new(date(2025, 1, 7), "", 0).unwrap());
    let calendar = builder.build();

    let blocks = detect_blocks(&calendar, query(0, 3));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].values.as_ref().unwrap()["Comp Off"], 1.0);
}

// ---------------------------------------------------------------------------
// Leave choice
// ---------------------------------------------------------------------------

#[test]
fn scarcer_allowance_is_spent_first() {
    let paid = CustomLeave::builder("Paid Leave")
        .max_balance(30.0)
        .credit((1, 1), 20.0)
        .build()
        .unwrap();
    let capped = CustomLeave::builder("Comp Off")
        .max_balance(10.0)
        .credit((1, 1), 10.0)
        .per_cycle(UsageLimit::at_most(2.0))
        .build()
        .unwrap();
    let mut ledger = ledger_with(vec![paid, capped]);

    for day in [13, 14] {
        let chosen = choose_leave(&ledger, date(2025, 1, day)).unwrap();
        assert_eq!(chosen, "Comp Off");
        ledger.spend(&chosen, date(2025, 1, day), 1.0).unwrap();
    }
    assert_eq!(choose_leave(&ledger, date(2025, 1, 15)).unwrap(), "Paid Leave");
}

#[test]
fn declaration_order_breaks_ties() {
    let first = CustomLeave::builder("Paid Leave")
        .max_balance(30.0)
        .credit((1, 1), 20.0)
        .build()
        .unwrap();
    let second = CustomLeave::builder("Casual Leave")
        .max_balance(9.0)
        .credit((1, 1), 9.0)
        .build()
        .unwrap();
    let ledger = ledger_with(vec![first, second]);
    assert_eq!(choose_leave(&ledger, date(2025, 1, 13)).unwrap(), "Paid Leave");
}

#[test]
fn nothing_spendable_is_recoverable() {
    let ledger = ledger_with(vec![comp_off(0.0)]);
    let err = choose_leave(&ledger, date(2025, 1, 13)).unwrap_err();
    assert!(err.is_recoverable());
}
