use crate::schema::{BudgetEntry, RecurrenceStep, Schedule};
use crate::utils::{months_between, shift_months};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

/// Planned amount of `entry` falling inside `[period_start, period_end)`.
///
/// One-off entries count when their anchor date is in the window, irregular
/// entries sum their dated amounts in the window, and recurring entries
/// multiply the amount by the number of occurrences in the window. There is
/// no proration: an occurrence is either in a window or not, which makes the
/// result additive over any partition of a window.
pub fn amount_for_period(entry: &BudgetEntry, period_start: NaiveDate, period_end: NaiveDate) -> Decimal {
    match &entry.schedule {
        Schedule::OneOff { date } => {
            if in_window(*date, period_start, period_end) {
                entry.amount
            } else {
                Decimal::ZERO
            }
        }
        Schedule::Irregular { payments } => payments
            .iter()
            .filter(|p| in_window(p.date, period_start, period_end))
            .map(|p| p.amount)
            .sum(),
        Schedule::Recurring {
            frequency,
            start_date,
            end_date,
        } => {
            let count = occurrence_count(
                frequency.step(),
                *start_date,
                *end_date,
                period_start,
                period_end,
            );
            entry.amount * Decimal::from(count)
        }
    }
}

/// Dated amounts of `entry` inside `[period_start, period_end)`, in date order.
pub fn occurrences_in_period(
    entry: &BudgetEntry,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Vec<(NaiveDate, Decimal)> {
    match &entry.schedule {
        Schedule::OneOff { date } => {
            if in_window(*date, period_start, period_end) {
                vec![(*date, entry.amount)]
            } else {
                Vec::new()
            }
        }
        Schedule::Irregular { payments } => {
            let mut dated: Vec<(NaiveDate, Decimal)> = payments
                .iter()
                .filter(|p| in_window(p.date, period_start, period_end))
                .map(|p| (p.date, p.amount))
                .collect();
            dated.sort_by_key(|(date, _)| *date);
            dated
        }
        Schedule::Recurring {
            frequency,
            start_date,
            end_date,
        } => {
            let step = frequency.step();
            let Some((lo, hi)) = clip(*start_date, *end_date, period_start, period_end) else {
                return Vec::new();
            };
            let mut dates = Vec::new();
            let mut k = first_at_or_after(step, *start_date, lo);
            loop {
                let date = occurrence(step, *start_date, k);
                if date >= hi {
                    break;
                }
                dates.push((date, entry.amount));
                k += 1;
            }
            dates
        }
    }
}

fn in_window(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date < end
}

/// Intersection of the entry's active range with the window, if non-empty.
fn clip(
    anchor: NaiveDate,
    end_date: Option<NaiveDate>,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let lo = anchor.max(period_start);
    let hi = end_date.map_or(period_end, |end| end.min(period_end));
    (lo < hi).then_some((lo, hi))
}

fn occurrence_count(
    step: RecurrenceStep,
    anchor: NaiveDate,
    end_date: Option<NaiveDate>,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> i64 {
    match clip(anchor, end_date, period_start, period_end) {
        Some((lo, hi)) => first_at_or_after(step, anchor, hi) - first_at_or_after(step, anchor, lo),
        None => 0,
    }
}

/// The k-th occurrence, always computed from the anchor so month-end
/// clamping never drifts (Jan 31, Feb 29, Mar 31, ...).
fn occurrence(step: RecurrenceStep, anchor: NaiveDate, k: i64) -> NaiveDate {
    match step {
        RecurrenceStep::Days(days) => anchor + Duration::days(days * k),
        RecurrenceStep::Months(months) => shift_months(anchor, months as i64 * k),
    }
}

/// Smallest k >= 0 whose occurrence is on or after `bound`.
fn first_at_or_after(step: RecurrenceStep, anchor: NaiveDate, bound: NaiveDate) -> i64 {
    if bound <= anchor {
        return 0;
    }
    match step {
        RecurrenceStep::Days(days) => {
            let elapsed = (bound - anchor).num_days();
            (elapsed + days - 1) / days
        }
        RecurrenceStep::Months(months) => {
            let months = months as i64;
            let mut k = months_between(anchor, bound).div_euclid(months).max(0);
            while occurrence(step, anchor, k) < bound {
                k += 1;
            }
            while k > 0 && occurrence(step, anchor, k - 1) >= bound {
                k -= 1;
            }
            k
        }
    }
}
