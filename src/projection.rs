use crate::actuals::{net_paid_before, net_unsettled};
use crate::allocation::amount_for_period;
use crate::grouping::GroupedBudget;
use crate::period::{today_index, Period};
use crate::schema::{ActualKind, ActualTransaction, CashAccount, FlowType, TreasurySnapshot};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodPosition {
    pub opening: Decimal,
    pub closing: Decimal,
    /// Net unsettled amount folded into `opening` before this period. Only
    /// the first projected period carries a non-zero value.
    #[serde(default)]
    pub adjustment: Decimal,
}

/// Net flows of one period under both readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodFlow {
    pub actual: Decimal,
    pub budget: Decimal,
}

/// Left-to-right fold of per-period net flows into balances.
///
/// Periods up to and including `today_index` move the balance by their
/// realized net flow. If any period remains after that, `unsettled_adjustment`
/// is added once and every remaining period moves the balance by its
/// budgeted net flow. `None` means no period is realized, so the
/// adjustment lands before the first period.
pub fn compute_balance_series(
    starting_balance: Decimal,
    flows: &[PeriodFlow],
    today_index: Option<usize>,
    unsettled_adjustment: Decimal,
) -> Vec<PeriodPosition> {
    let realized = today_index.map_or(0, |i| i + 1);
    let mut balance = starting_balance;

    flows
        .iter()
        .enumerate()
        .map(|(i, flow)| {
            let mut adjustment = Decimal::ZERO;
            let net = if i < realized {
                flow.actual
            } else {
                if i == realized {
                    adjustment = unsettled_adjustment;
                    balance += adjustment;
                }
                flow.budget
            };
            let opening = balance;
            balance = opening + net;
            PeriodPosition {
                opening,
                closing: balance,
                adjustment,
            }
        })
        .collect()
}

/// Sum of the accounts' initial balances plus every payment dated before
/// the horizon starts.
pub fn starting_balance(accounts: &[CashAccount], actuals: &[ActualTransaction], first_period_start: NaiveDate) -> Decimal {
    let initial: Decimal = accounts.iter().map(|a| a.initial_balance).sum();
    initial + net_paid_before(actuals, first_period_start)
}

/// Opening and closing cash position per period from grouped totals.
pub fn project_positions(
    periods: &[Period],
    accounts: &[CashAccount],
    actuals: &[ActualTransaction],
    grouped: &GroupedBudget,
    today: NaiveDate,
) -> Vec<PeriodPosition> {
    let Some(first) = periods.first() else {
        return Vec::new();
    };

    let start = starting_balance(accounts, actuals, first.start_date);
    let index = today_index(periods, today);
    let adjustment = net_unsettled(actuals, today);
    let flows: Vec<PeriodFlow> = grouped
        .net
        .iter()
        .map(|t| PeriodFlow {
            actual: t.actual,
            budget: t.budget,
        })
        .collect();

    debug!(
        "Projecting {} periods from {} (today index {:?}, unsettled {})",
        periods.len(),
        start,
        index,
        adjustment
    );

    compute_balance_series(start, &flows, index, adjustment)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartBar {
    pub value: Decimal,
    pub is_future: bool,
}

/// Chart-ready parallel series, one slot per period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowChart {
    pub labels: Vec<String>,
    /// Realized inflow up to today, budgeted inflow afterwards.
    pub inflows: Vec<ChartBar>,
    pub outflows: Vec<ChartBar>,
    pub budgeted_inflows: Vec<Decimal>,
    pub budgeted_outflows: Vec<Decimal>,
    /// Defined for indices up to and including `today_index`.
    pub actual_balance: Vec<Option<Decimal>>,
    /// Defined for indices from `today_index` onwards.
    pub projected_balance: Vec<Option<Decimal>>,
    pub today_index: Option<usize>,
}

impl CashflowChart {
    pub fn empty() -> Self {
        Self {
            labels: Vec::new(),
            inflows: Vec::new(),
            outflows: Vec::new(),
            budgeted_inflows: Vec::new(),
            budgeted_outflows: Vec::new(),
            actual_balance: Vec::new(),
            projected_balance: Vec::new(),
            today_index: None,
        }
    }

    /// The balance shown at each index, whichever line defines it.
    pub fn balances(&self) -> Vec<Decimal> {
        self.actual_balance
            .iter()
            .zip(&self.projected_balance)
            .map(|(actual, projected)| actual.or(*projected).unwrap_or_default())
            .collect()
    }
}

/// Builds the chart series from flat sums: every payment in a period for
/// the realized side, every entry's allocation for the budgeted side.
pub fn build_cashflow_chart(periods: &[Period], snapshot: &TreasurySnapshot, today: NaiveDate) -> CashflowChart {
    let Some(first) = periods.first() else {
        return CashflowChart::empty();
    };

    let index = today_index(periods, today);
    let is_future = |i: usize| index.map_or(true, |t| i > t);

    let mut chart = CashflowChart::empty();
    let mut flows = Vec::with_capacity(periods.len());

    for (i, period) in periods.iter().enumerate() {
        let realized_in = realized_for(&snapshot.actuals, ActualKind::Receivable, period);
        let realized_out = realized_for(&snapshot.actuals, ActualKind::Payable, period);
        let budgeted_in = budgeted_for(snapshot, FlowType::Inflow, period);
        let budgeted_out = budgeted_for(snapshot, FlowType::Outflow, period);
        let future = is_future(i);

        chart.labels.push(period.label.clone());
        chart.inflows.push(ChartBar {
            value: if future { budgeted_in } else { realized_in },
            is_future: future,
        });
        chart.outflows.push(ChartBar {
            value: if future { budgeted_out } else { realized_out },
            is_future: future,
        });
        chart.budgeted_inflows.push(budgeted_in);
        chart.budgeted_outflows.push(budgeted_out);
        flows.push(PeriodFlow {
            actual: realized_in - realized_out,
            budget: budgeted_in - budgeted_out,
        });
    }

    let start = starting_balance(&snapshot.accounts, &snapshot.actuals, first.start_date);
    let adjustment = net_unsettled(&snapshot.actuals, today);
    let positions = compute_balance_series(start, &flows, index, adjustment);

    for (i, position) in positions.iter().enumerate() {
        let realized = index.is_some_and(|t| i <= t);
        let projected = index.map_or(true, |t| i >= t);
        chart.actual_balance.push(realized.then_some(position.closing));
        chart.projected_balance.push(projected.then_some(position.closing));
    }
    chart.today_index = index;
    chart
}

fn realized_for(actuals: &[ActualTransaction], kind: ActualKind, period: &Period) -> Decimal {
    actuals
        .iter()
        .filter(|a| a.kind == kind)
        .flat_map(|a| a.payments.iter())
        .filter(|p| period.contains(p.payment_date))
        .map(|p| p.paid_amount)
        .sum()
}

fn budgeted_for(snapshot: &TreasurySnapshot, flow_type: FlowType, period: &Period) -> Decimal {
    snapshot
        .entries
        .iter()
        .filter(|e| e.flow_type == flow_type)
        .map(|e| amount_for_period(e, period.start_date, period.end_date))
        .sum()
}
