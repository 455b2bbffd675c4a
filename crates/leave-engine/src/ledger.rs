//! Per-person leave balance ledger.
//!
//! Every credit, spend, expiry and carry-forward is an append-only
//! [`LedgerEntry`] in one arena; each leave type keeps a date index into that
//! arena. Balances are never stored: the balance of a leave type on a date is
//! the sum of its entries dated on or before it. Within one date, entries
//! replay in [`EntryKind`] order, so credits land before debits.
//!
//! Each leave type moves through a small state machine per cycle:
//! `Open` → `ExpiredPendingCarry` when an expiry event is applied, and back to
//! `Open` on the next cycle once that cycle's opening credit lands. The
//! previous cycle is then closed and may no longer be modified.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::calendar::Cycle;
use crate::error::{PlanError, Result};
use crate::leave::CustomLeave;
use crate::person::Person;

/// Tolerance for comparing fractional leave units.
const EPSILON: f64 = 1e-9;

/// What an entry records. Declaration order is the same-date replay order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    CarryForward,
    Credit,
    Spend,
    Expiry,
}

impl EntryKind {
    pub fn is_credit(self) -> bool {
        matches!(self, EntryKind::CarryForward | EntryKind::Credit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub leave: String,
    pub date: NaiveDate,
    pub delta: f64,
    pub kind: EntryKind,
}

/// Balance right after one entry, as produced by [`Ledger::replay`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Open,
    ExpiredPendingCarry,
    Closed,
}

/// Outcome of an expiry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollover {
    pub leave: String,
    pub expired_on: NaiveDate,
    /// Balance just before the expiry.
    pub balance: f64,
    /// Units retained into the next cycle.
    pub carried: f64,
    pub forfeited: f64,
    pub next_cycle_start: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    Cycle,
    Lifetime,
}

/// A minimum-usage constraint that was not met. Reported, never enforced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageNotice {
    pub leave: String,
    pub scope: UsageScope,
    pub used: f64,
    pub minimum: f64,
}

#[derive(Debug, Clone)]
struct Account {
    leave: CustomLeave,
    index: BTreeMap<NaiveDate, Vec<usize>>,
    /// The cycle currently open (or pending carry) for this leave type.
    cycle: Cycle,
    state: CycleState,
    expired_on: Option<NaiveDate>,
    /// Last day of the most recently closed cycle.
    closed_through: Option<NaiveDate>,
}

impl Account {
    fn next_start(&self) -> Option<NaiveDate> {
        self.cycle.following().map(|c| c.start())
    }
}

/// The leave ledger of one person.
#[derive(Debug, Clone)]
pub struct Ledger {
    person: String,
    base: Cycle,
    entries: Vec<LedgerEntry>,
    accounts: Vec<Account>,
}

impl Ledger {
    /// An empty ledger whose leave types all open on `cycle`.
    pub fn new<I>(person: impl Into<String>, cycle: Cycle, leaves: I) -> Self
    where
        I: IntoIterator<Item = CustomLeave>,
    {
        let accounts = leaves
            .into_iter()
            .map(|leave| Account {
                leave,
                index: BTreeMap::new(),
                cycle,
                state: CycleState::Open,
                expired_on: None,
                closed_through: None,
            })
            .collect();
        Ledger {
            person: person.into(),
            base: cycle,
            entries: Vec::new(),
            accounts,
        }
    }

    pub fn for_person(person: &Person, cycle: Cycle) -> Self {
        Self::new(person.name(), cycle, person.custom_leaves().cloned())
    }

    pub fn person(&self) -> &str {
        &self.person
    }

    /// Leave type names in declaration order.
    pub fn leave_names(&self) -> impl Iterator<Item = &str> {
        self.accounts.iter().map(|a| a.leave.name())
    }

    pub fn leave(&self, name: &str) -> Result<&CustomLeave> {
        Ok(&self.account(name)?.1.leave)
    }

    /// The whole arena, in append order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Entries of one leave type in replay order.
    pub fn entries_for(&self, leave: &str) -> Result<Vec<&LedgerEntry>> {
        let (_, account) = self.account(leave)?;
        Ok(self.ordered(account).collect())
    }

    /// State of the cycle currently open for `leave`.
    pub fn state(&self, leave: &str) -> Result<CycleState> {
        Ok(self.account(leave)?.1.state)
    }

    /// State of the cycle containing `date`.
    pub fn state_on(&self, leave: &str, date: NaiveDate) -> Result<CycleState> {
        let (_, account) = self.account(leave)?;
        if account.closed_through.is_some_and(|last| date <= last) {
            return Ok(CycleState::Closed);
        }
        Ok(account.state)
    }

    pub fn current_cycle(&self, leave: &str) -> Result<Cycle> {
        Ok(self.account(leave)?.1.cycle)
    }

    /// Balance at the end of `date`.
    pub fn available(&self, leave: &str, date: NaiveDate) -> Result<f64> {
        let (_, account) = self.account(leave)?;
        Ok(self.balance_through(account, date))
    }

    /// The most that can be spent on `date` without driving the balance on
    /// any later ledger date below zero. Never exceeds [`available`](Self::available).
    pub fn spendable(&self, leave: &str, date: NaiveDate) -> Result<f64> {
        let (_, account) = self.account(leave)?;
        let mut running = self.balance_through(account, date);
        let mut lowest = running;
        for ids in account.index.range((Excluded(date), Unbounded)).map(|(_, ids)| ids) {
            running += ids.iter().map(|&i| self.entries[i].delta).sum::<f64>();
            lowest = lowest.min(running);
        }
        Ok(lowest.max(0.0))
    }

    /// Units spent within the yearly cycle instance containing `date`.
    pub fn used_in_cycle(&self, leave: &str, date: NaiveDate) -> Result<f64> {
        let (_, account) = self.account(leave)?;
        match self.base.instance_at(date) {
            Some(cycle) => Ok(self.used_within(account, &cycle)),
            None => Ok(0.0),
        }
    }

    /// Units spent over the ledger's lifetime.
    pub fn used_total(&self, leave: &str) -> Result<f64> {
        let (_, account) = self.account(leave)?;
        Ok(self.spent(account).map(|e| -e.delta).sum())
    }

    /// Per-cycle allowance left for the cycle containing `date`; `None` when
    /// the leave type has no per-cycle maximum.
    pub fn remaining_cycle_allowance(&self, leave: &str, date: NaiveDate) -> Result<Option<f64>> {
        let max = self.leave(leave)?.constraints().avail_limit_per_cycle.max;
        match max {
            Some(max) => Ok(Some((max - self.used_in_cycle(leave, date)?).max(0.0))),
            None => Ok(None),
        }
    }

    /// Apply the credit scheduled on `date`, if any.
    ///
    /// The credited amount is capped so the balance never exceeds the leave's
    /// maximum; the excess is dropped. Returns the amount actually credited,
    /// or `None` when no credit event falls on `date`.
    pub fn credit(&mut self, leave: &str, date: NaiveDate) -> Result<Option<f64>> {
        let (idx, account) = self.account(leave)?;
        guard_closed(account, date)?;
        let scheduled = match account.leave.credit_on(date) {
            Some(amount) => amount,
            None => return Ok(None),
        };

        self.roll_forward(idx, date);

        let account = &self.accounts[idx];
        let room = account.leave.max_balance() - self.peak_balance(account, date);
        let credited = scheduled.min(room).max(0.0);
        if credited > EPSILON {
            self.append(idx, date, credited, EntryKind::Credit);
        }
        debug!(
            person = %self.person,
            leave,
            %date,
            scheduled,
            credited,
            "credit applied"
        );
        Ok(Some(credited))
    }

    /// Apply the expiry scheduled on `date`, if any.
    ///
    /// The balance as of `date` is written off; up to the carry-forward cap of
    /// it is credited back on the first day of the next cycle.
    pub fn expire_and_roll(&mut self, leave: &str, date: NaiveDate) -> Result<Option<Rollover>> {
        let (idx, account) = self.account(leave)?;
        guard_closed(account, date)?;
        if !account.leave.expires_on(date) {
            return Ok(None);
        }
        if account.state == CycleState::ExpiredPendingCarry
            && account.next_start().is_some_and(|next| date >= next)
        {
            self.open_next(idx);
        }

        let account = &self.accounts[idx];
        let cycle = account.cycle.instance_at(date).unwrap_or(account.cycle);
        let next_start = cycle
            .following()
            .map(|c| c.start())
            .ok_or_else(|| PlanError::invalid("date", format!("{} is out of range", date)))?;

        let balance = self.balance_through(account, date).max(0.0);
        let already_carried: f64 = account
            .index
            .get(&next_start)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
            .filter(|e| e.kind == EntryKind::CarryForward)
            .map(|e| e.delta)
            .sum();
        let cap = (account.leave.carry_forward_balance() - already_carried).max(0.0);
        let carried = balance.min(cap);
        let forfeited = balance - carried;

        if balance > EPSILON {
            self.append(idx, date, -balance, EntryKind::Expiry);
        }
        if carried > EPSILON {
            self.append(idx, next_start, carried, EntryKind::CarryForward);
        }

        let account = &mut self.accounts[idx];
        account.cycle = cycle;
        account.state = CycleState::ExpiredPendingCarry;
        account.expired_on = Some(date);

        debug!(
            person = %self.person,
            leave,
            %date,
            balance,
            carried,
            forfeited,
            "expiry applied"
        );
        Ok(Some(Rollover {
            leave: leave.to_string(),
            expired_on: date,
            balance,
            carried,
            forfeited,
            next_cycle_start: next_start,
        }))
    }

    /// Check a spend without applying it.
    ///
    /// # Errors
    /// `InvalidParameter` for non-positive units, `CycleClosed` inside a
    /// finalized period, `InsufficientBalance` beyond [`spendable`](Self::spendable),
    /// `ConstraintViolation` on a blocked weekday or past a usage maximum.
    pub fn check_spend(&self, leave: &str, date: NaiveDate, units: f64) -> Result<()> {
        let (_, account) = self.account(leave)?;
        if !units.is_finite() || units <= 0.0 {
            return Err(PlanError::invalid(
                "units",
                format!("{} must be a positive number", units),
            ));
        }
        guard_closed(account, date)?;
        if account.state == CycleState::ExpiredPendingCarry
            && account.expired_on.is_some_and(|expired| date <= expired)
        {
            return Err(PlanError::CycleClosed {
                leave: leave.to_string(),
                date,
            });
        }

        let spendable = self.spendable(leave, date)?;
        if units > spendable + EPSILON {
            return Err(PlanError::InsufficientBalance {
                leave: leave.to_string(),
                date,
                requested: units,
                available: spendable,
            });
        }

        let constraints = account.leave.constraints();
        if !constraints.allows_weekday(date.weekday()) {
            return Err(PlanError::ConstraintViolation {
                leave: leave.to_string(),
                date,
                reason: format!("leave may not be taken on {}", date.weekday()),
            });
        }
        if let Some(max) = constraints.avail_limit_per_cycle.max {
            let used = self.used_in_cycle(leave, date)?;
            if used + units > max + EPSILON {
                return Err(PlanError::ConstraintViolation {
                    leave: leave.to_string(),
                    date,
                    reason: format!("per-cycle maximum {} reached ({} used)", max, used),
                });
            }
        }
        if let Some(max) = constraints.avail_limit.max {
            let used = self.used_total(leave)?;
            if used + units > max + EPSILON {
                return Err(PlanError::ConstraintViolation {
                    leave: leave.to_string(),
                    date,
                    reason: format!("lifetime maximum {} reached ({} used)", max, used),
                });
            }
        }
        Ok(())
    }

    /// Spend `units` of `leave` on `date` and return the new balance.
    ///
    /// A failed spend leaves the ledger untouched.
    pub fn spend(&mut self, leave: &str, date: NaiveDate, units: f64) -> Result<f64> {
        self.check_spend(leave, date, units)?;
        let (idx, _) = self.account(leave)?;
        self.roll_forward(idx, date);
        self.append(idx, date, -units, EntryKind::Spend);
        debug!(person = %self.person, leave, %date, units, "leave spent");
        self.available(leave, date)
    }

    /// Apply every credit event falling inside the yearly span of `cycle`.
    pub fn accrue(&mut self, cycle: &Cycle) -> Result<()> {
        let names: Vec<String> = self.leave_names().map(str::to_string).collect();
        for date in cycle.span().days() {
            for name in &names {
                self.credit(name, date)?;
            }
        }
        Ok(())
    }

    /// Apply every expiry event falling inside the yearly span of `cycle`.
    pub fn close(&mut self, cycle: &Cycle) -> Result<Vec<Rollover>> {
        let names: Vec<String> = self.leave_names().map(str::to_string).collect();
        let mut rollovers = Vec::new();
        for date in cycle.span().days() {
            for name in &names {
                if let Some(rollover) = self.expire_and_roll(name, date)? {
                    rollovers.push(rollover);
                }
            }
        }
        Ok(rollovers)
    }

    /// Minimum-usage constraints not met within `cycle` (and over the
    /// lifetime). Purely informational.
    pub fn reconcile(&self, cycle: &Cycle) -> Vec<UsageNotice> {
        let mut notices = Vec::new();
        for account in &self.accounts {
            let constraints = account.leave.constraints();
            if let Some(minimum) = constraints.avail_limit_per_cycle.min {
                let used = self.used_within(account, cycle);
                if used + EPSILON < minimum {
                    notices.push(UsageNotice {
                        leave: account.leave.name().to_string(),
                        scope: UsageScope::Cycle,
                        used,
                        minimum,
                    });
                }
            }
            if let Some(minimum) = constraints.avail_limit.min {
                let used: f64 = self.spent(account).map(|e| -e.delta).sum();
                if used + EPSILON < minimum {
                    notices.push(UsageNotice {
                        leave: account.leave.name().to_string(),
                        scope: UsageScope::Lifetime,
                        used,
                        minimum,
                    });
                }
            }
        }
        notices
    }

    /// Running balance after every entry of `leave`, in replay order.
    pub fn replay(&self, leave: &str) -> Result<Vec<BalancePoint>> {
        let (_, account) = self.account(leave)?;
        let mut balance = 0.0;
        Ok(self
            .ordered(account)
            .map(|entry| {
                balance += entry.delta;
                BalancePoint {
                    date: entry.date,
                    kind: entry.kind,
                    balance,
                }
            })
            .collect())
    }

    fn account(&self, name: &str) -> Result<(usize, &Account)> {
        self.accounts
            .iter()
            .enumerate()
            .find(|(_, a)| a.leave.name() == name)
            .ok_or_else(|| PlanError::UnknownLeave(name.to_string()))
    }

    fn append(&mut self, idx: usize, date: NaiveDate, delta: f64, kind: EntryKind) {
        let id = self.entries.len();
        self.entries.push(LedgerEntry {
            leave: self.accounts[idx].leave.name().to_string(),
            date,
            delta,
            kind,
        });
        self.accounts[idx].index.entry(date).or_default().push(id);
    }

    /// Bring the account's open cycle up to `date`. A pending account opens
    /// its next cycle once a mutation lands in it; an open account without
    /// expiries simply moves along.
    fn roll_forward(&mut self, idx: usize, date: NaiveDate) {
        let account = &self.accounts[idx];
        if date < account.cycle.span().end() {
            return;
        }
        match account.state {
            CycleState::ExpiredPendingCarry => {
                if account.next_start().is_some_and(|next| date >= next) {
                    self.open_next(idx);
                }
            }
            CycleState::Open | CycleState::Closed => {
                if let Some(cycle) = account.cycle.instance_at(date) {
                    self.accounts[idx].cycle = cycle;
                }
            }
        }
    }

    fn open_next(&mut self, idx: usize) {
        let account = &mut self.accounts[idx];
        if let Some(next) = account.cycle.following() {
            account.closed_through = next.start().pred_opt();
            account.cycle = next;
            account.state = CycleState::Open;
            account.expired_on = None;
            debug!(
                person = %self.person,
                leave = account.leave.name(),
                opened = %next.start(),
                "cycle opened"
            );
        }
    }

    fn ordered<'a>(&'a self, account: &'a Account) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        account.index.values().flat_map(move |ids| {
            let mut day: Vec<&LedgerEntry> = ids.iter().map(|&i| &self.entries[i]).collect();
            day.sort_by_key(|e| e.kind);
            day
        })
    }

    fn spent<'a>(&'a self, account: &'a Account) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.ordered(account).filter(|e| e.kind == EntryKind::Spend)
    }

    fn used_within(&self, account: &Account, cycle: &Cycle) -> f64 {
        self.spent(account)
            .filter(|e| cycle.span().contains(e.date))
            .map(|e| -e.delta)
            .sum()
    }

    fn balance_through(&self, account: &Account, date: NaiveDate) -> f64 {
        account
            .index
            .range(..=date)
            .flat_map(|(_, ids)| ids)
            .map(|&i| self.entries[i].delta)
            .sum()
    }

    /// Highest balance from `date` onwards: the balance on `date` before its
    /// debits, or any later running balance (e.g. a pending carry-forward).
    fn peak_balance(&self, account: &Account, date: NaiveDate) -> f64 {
        let mut running = self.balance_through(account, date);
        let mut peak = self.balance_before_debits(account, date);
        for ids in account.index.range((Excluded(date), Unbounded)).map(|(_, ids)| ids) {
            running += ids.iter().map(|&i| self.entries[i].delta).sum::<f64>();
            peak = peak.max(running);
        }
        peak
    }

    /// Balance on `date` after that day's credits but before its debits.
    fn balance_before_debits(&self, account: &Account, date: NaiveDate) -> f64 {
        let before: f64 = account
            .index
            .range(..date)
            .flat_map(|(_, ids)| ids)
            .map(|&i| self.entries[i].delta)
            .sum();
        let credits_today: f64 = account
            .index
            .get(&date)
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
            .filter(|e| e.kind.is_credit())
            .map(|e| e.delta)
            .sum();
        before + credits_today
    }
}

fn guard_closed(account: &Account, date: NaiveDate) -> Result<()> {
    if account.closed_through.is_some_and(|last| date <= last) {
        return Err(PlanError::CycleClosed {
            leave: account.leave.name().to_string(),
            date,
        });
    }
    Ok(())
}
