//! Vacation block detection and leave-cost extension.
//!
//! Walks an [`OffDayCalendar`] in date order and merges off-days into runs,
//! letting a run bridge short stretches of work-days ("gaps"). Runs long
//! enough become [`VacationBlock`]s. [`extend_blocks`] then tries to turn the
//! gap days into leave, cheapest gaps first, drawing on the person's
//! [`Ledger`].

use std::cmp::Reverse;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::calendar::{OffDayCalendar, OffReason};
use crate::error::{PlanError, Result, ValidationErrors};
use crate::ledger::Ledger;

/// Units spent to turn one work-day into leave.
const UNITS_PER_DAY: f64 = 1.0;

/// A run of work-days inside a block, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Gap {
    pub fn len(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// A contiguous or gap-bridged run of off-days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VacationBlock {
    /// 1-based position of the run in the full date walk.
    pub position: usize,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Days from `start` to `end`, inclusive.
    pub duration: i64,
    pub gaps: Vec<Gap>,
    /// Gap days already converted to leave, with the leave type used.
    pub filled: BTreeMap<NaiveDate, String>,
    /// Leave units per type needed to realize the block; `None` until leave
    /// is assigned.
    pub values: Option<BTreeMap<String, f64>>,
}

impl VacationBlock {
    fn new(position: usize, start: NaiveDate) -> Self {
        VacationBlock {
            position,
            start,
            end: start,
            duration: 1,
            gaps: Vec::new(),
            filled: BTreeMap::new(),
            values: None,
        }
    }

    pub fn label(&self) -> String {
        format!("VACATION #{:03}", self.position)
    }

    /// Gap days not yet converted to leave.
    pub fn fillable(&self) -> Vec<NaiveDate> {
        self.gaps
            .iter()
            .flat_map(Gap::days)
            .filter(|d| !self.filled.contains_key(d))
            .collect()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    fn extend_to(&mut self, date: NaiveDate) {
        self.end = date;
        self.duration = (self.end - self.start).num_days() + 1;
    }
}

/// Validated arguments of a long-weekend query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockQuery {
    tolerance: usize,
    min_count: usize,
}

impl BlockQuery {
    /// # Errors
    /// `InvalidParameter` when `tolerance < 0` or `min_count < 1`.
    pub fn new(tolerance: i64, min_count: i64) -> Result<Self> {
        let mut errors = ValidationErrors::new();
        if tolerance < 0 {
            errors.push("tolerance", format!("{} must be >= 0", tolerance));
        }
        if min_count < 1 {
            errors.push("min_count", format!("{} must be >= 1", min_count));
        }
        errors.into_result()?;
        Ok(BlockQuery {
            tolerance: tolerance as usize,
            min_count: min_count as usize,
        })
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    pub fn min_count(&self) -> usize {
        self.min_count
    }
}

/// Every run of off-days in the calendar, bridging gaps of at most
/// `tolerance` work-days. Work-days before the first or after the last
/// off-day of a run are never absorbed.
pub fn find_runs(calendar: &OffDayCalendar, tolerance: usize) -> Vec<VacationBlock> {
    let mut runs: Vec<VacationBlock> = Vec::new();
    let mut current: Option<VacationBlock> = None;
    let mut pending: Option<Gap> = None;

    for day in calendar.days() {
        if !day.is_off() {
            if current.is_some() {
                pending = Some(match pending {
                    Some(gap) => Gap {
                        end: day.date,
                        ..gap
                    },
                    None => Gap {
                        start: day.date,
                        end: day.date,
                    },
                });
            }
            continue;
        }

        let gap = pending.take();
        let Some(run) = current.as_mut() else {
            current = Some(VacationBlock::new(runs.len() + 1, day.date));
            continue;
        };
        match gap {
            None => run.extend_to(day.date),
            Some(gap) if gap.len() as usize <= tolerance => {
                run.gaps.push(gap);
                run.extend_to(day.date);
            }
            Some(_) => {
                let next = VacationBlock::new(runs.len() + 2, day.date);
                runs.push(std::mem::replace(run, next));
            }
        }
    }

    runs.extend(current);
    runs
}

/// Runs of at least `min_count` days, numbered by their walk position.
pub fn detect_blocks(calendar: &OffDayCalendar, query: BlockQuery) -> Vec<VacationBlock> {
    let mut blocks: Vec<VacationBlock> = find_runs(calendar, query.tolerance)
        .into_iter()
        .filter(|run| run.duration as usize >= query.min_count)
        .collect();
    for block in &mut blocks {
        block.values = tally(calendar, block);
    }
    blocks
}

/// Validate the query arguments and detect blocks in one go.
pub fn long_weekends(
    calendar: &OffDayCalendar,
    tolerance: i64,
    min_count: i64,
) -> Result<Vec<VacationBlock>> {
    Ok(detect_blocks(calendar, BlockQuery::new(tolerance, min_count)?))
}

/// What [`extend_blocks`] managed to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtensionSummary {
    pub gaps_filled: usize,
    pub gaps_skipped: usize,
    pub units_spent: f64,
}

/// Convert block gaps into leave, smallest gaps first.
///
/// Each gap is filled entirely or not at all. Running out of balance or
/// hitting a usage constraint leaves that gap unfilled; any other error
/// aborts the extension.
///
/// # Errors
/// `InvalidParameter` when a gap straddles an expiry date of one of the
/// ledger's leave types; `CycleClosed` if the ledger refuses a spend because
/// the cycle has already been finalized.
pub fn extend_blocks(
    blocks: &mut [VacationBlock],
    calendar: &OffDayCalendar,
    ledger: &mut Ledger,
) -> Result<ExtensionSummary> {
    let mut order: Vec<(usize, usize)> = blocks
        .iter()
        .enumerate()
        .flat_map(|(b, block)| (0..block.gaps.len()).map(move |g| (b, g)))
        .collect();
    // Fewest units first; among equals, the one unlocking the longer block.
    order.sort_by_key(|&(b, g)| {
        let gap = blocks[b].gaps[g];
        (gap.len(), Reverse(blocks[b].duration), gap.start)
    });

    let mut summary = ExtensionSummary::default();
    for (b, g) in order {
        let gap = blocks[b].gaps[g];
        reject_boundary_crossing(ledger, &gap)?;
        match fill_gap(ledger, &gap) {
            Ok((trial, assigned)) => {
                *ledger = trial;
                summary.gaps_filled += 1;
                summary.units_spent += assigned.len() as f64 * UNITS_PER_DAY;
                blocks[b].filled.extend(assigned);
            }
            Err(e) if e.is_recoverable() => {
                debug!(
                    person = ledger.person(),
                    block = %blocks[b].label(),
                    start = %gap.start,
                    end = %gap.end,
                    error = %e,
                    "gap left unfilled"
                );
                summary.gaps_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for block in blocks.iter_mut() {
        block.values = tally(calendar, block);
    }
    Ok(summary)
}

/// Pick the leave type to spend on `date`: among the types that can cover
/// one unit, the one with the least per-cycle allowance left (unlimited
/// last), then declaration order.
pub fn choose_leave(ledger: &Ledger, date: NaiveDate) -> Result<String> {
    let mut candidates: Vec<(f64, usize, String)> = Vec::new();
    let mut last_err = None;
    for (order, name) in ledger.leave_names().enumerate() {
        match ledger.check_spend(name, date, UNITS_PER_DAY) {
            Ok(()) => {
                let remaining = ledger
                    .remaining_cycle_allowance(name, date)?
                    .unwrap_or(f64::INFINITY);
                candidates.push((remaining, order, name.to_string()));
            }
            Err(e) if e.is_recoverable() => last_err = Some(e),
            Err(e) => return Err(e),
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    match candidates.into_iter().next() {
        Some((_, _, name)) => Ok(name),
        None => Err(last_err.unwrap_or_else(|| PlanError::InsufficientBalance {
            leave: String::new(),
            date,
            requested: UNITS_PER_DAY,
            available: 0.0,
        })),
    }
}

/// Spend one unit per gap day on a copy of the ledger. The copy is only
/// handed back when the whole gap is covered.
fn fill_gap(ledger: &Ledger, gap: &Gap) -> Result<(Ledger, Vec<(NaiveDate, String)>)> {
    let mut trial = ledger.clone();
    let mut assigned = Vec::new();
    for day in gap.days() {
        let leave = choose_leave(&trial, day)?;
        trial.spend(&leave, day, UNITS_PER_DAY)?;
        assigned.push((day, leave));
    }
    Ok((trial, assigned))
}

fn reject_boundary_crossing(ledger: &Ledger, gap: &Gap) -> Result<()> {
    for name in ledger.leave_names() {
        let leave = ledger.leave(name)?;
        if let Some(expiry) = leave.expiries_between(gap.start, gap.end).first() {
            return Err(PlanError::invalid(
                "gap",
                format!(
                    "{}..{} crosses the {} expiry on {}",
                    gap.start, gap.end, name, expiry
                ),
            ));
        }
    }
    Ok(())
}

/// Leave units per type inside the block: days already on leave plus
/// filled gap days.
fn tally(calendar: &OffDayCalendar, block: &VacationBlock) -> Option<BTreeMap<String, f64>> {
    let mut values: BTreeMap<String, f64> = BTreeMap::new();
    let on_leave = calendar
        .days()
        .iter()
        .filter(|d| block.contains(d.date) && d.reason == OffReason::Leave)
        .filter_map(|d| d.label.clone());
    for leave in on_leave.chain(block.filled.values().cloned()) {
        *values.entry(leave).or_default() += UNITS_PER_DAY;
    }
    (!values.is_empty()).then_some(values)
}
