//! # Treasury Engine
//!
//! Period bucketing, budget allocation and cash-position projection for
//! multi-project treasury planning.
//!
//! ## Core Concepts
//!
//! - **Budget entries**: planned inflows and outflows on a one-off, irregular or recurring schedule
//! - **Actual transactions**: receivables and payables, settled by one or more dated payments
//! - **Periods**: a contiguous horizon of day, week, month, quarter or year buckets around today
//! - **Cash position**: opening and closing balance per period, realized up to today and budgeted after
//!
//! ## Example
//!
//! ```rust,ignore
//! use treasury_engine::*;
//! use chrono::NaiveDate;
//!
//! let snapshot = TreasurySnapshot::from_json(&std::fs::read_to_string("store.json")?)?;
//! let config = PeriodConfig::new(TimeUnit::Month, 6, -1);
//! let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
//!
//! let report = process_treasury(&snapshot, &config, today)?;
//! for (period, position) in report.periods.iter().zip(&report.positions) {
//!     println!("{}: {} -> {}", period.label, position.opening, position.closing);
//! }
//! ```

pub mod actuals;
pub mod allocation;
pub mod analysis;
pub mod error;
pub mod grouping;
pub mod ingestion;
pub mod period;
pub mod projection;
pub mod schema;
pub mod state;
pub mod taxonomy;
pub mod utils;
pub mod verification;

pub use actuals::{
    actual_amount_for_period, derive_actuals, derive_status, net_unsettled, paid_in_window,
    record_payment, write_off, OverpaymentPolicy, PaymentOutcome,
};
pub use allocation::{amount_for_period, occurrences_in_period};
pub use analysis::{AnalysisRow, AnalysisWindow, Analyzer, Breakdown, Drilldown, Measure, ValueRow};
pub use error::{DataIntegrityWarning, Result, TreasuryError};
pub use grouping::{
    filter_entries, group_budget, BudgetGrouper, CategoryGroup, EntryFilter, FlowGroup,
    GroupedBudget, OffBudgetGroup, PeriodTotals,
};
pub use ingestion::*;
pub use period::{generate_periods, today_index, Period, PeriodConfig, QuickSelect, TimeUnit};
pub use projection::{
    build_cashflow_chart, compute_balance_series, project_positions, CashflowChart, PeriodFlow,
    PeriodPosition,
};
pub use schema::*;
pub use state::{reduce, Action, AppState, Scope, Settings};
pub use taxonomy::CategoryIndex;
pub use utils::*;
pub use verification::{verify_chart_agreement, verify_positions};

use chrono::NaiveDate;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Everything a budget screen needs for one scope and horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryReport {
    pub periods: Vec<Period>,
    pub today_index: Option<usize>,
    pub grouped: GroupedBudget,
    pub positions: Vec<PeriodPosition>,
    pub chart: CashflowChart,
    /// Anomalies met while grouping. They never abort processing.
    pub warnings: Vec<DataIntegrityWarning>,
}

pub struct TreasuryProcessor;

impl TreasuryProcessor {
    pub fn process(snapshot: &TreasurySnapshot, config: &PeriodConfig, today: NaiveDate) -> Result<TreasuryReport> {
        info!(
            "Processing treasury report: {} {} periods at offset {} from {}",
            config.horizon_length, config.time_unit, config.period_offset, today
        );
        debug!(
            "Snapshot contains {} projects, {} entries, {} actuals and {} accounts",
            snapshot.projects.len(),
            snapshot.entries.len(),
            snapshot.actuals.len(),
            snapshot.accounts.len()
        );

        let periods = generate_periods(config, today)?;
        let today_index = today_index(&periods, today);

        let (grouped, warnings) = group_budget(snapshot, &periods);
        let positions = project_positions(&periods, &snapshot.accounts, &snapshot.actuals, &grouped, today);
        let chart = build_cashflow_chart(&periods, snapshot, today);

        if !warnings.is_empty() {
            debug!("Grouping produced {} data integrity warnings", warnings.len());
        }

        Ok(TreasuryReport {
            periods,
            today_index,
            grouped,
            positions,
            chart,
            warnings,
        })
    }

    /// Processes and then checks balance continuity and that the grouped
    /// projection and the chart agree within `tolerance`.
    pub fn process_with_verification(
        snapshot: &TreasurySnapshot,
        config: &PeriodConfig,
        today: NaiveDate,
        tolerance: Decimal,
    ) -> Result<TreasuryReport> {
        let report = Self::process(snapshot, config, today)?;

        verify_positions(&report.positions)?;
        verify_chart_agreement(&report.positions, &report.chart, tolerance)?;

        Ok(report)
    }

    /// Report for whatever scope and horizon the application state selects.
    pub fn process_state(state: &AppState, today: NaiveDate) -> Result<TreasuryReport> {
        let snapshot = state.snapshot()?;
        Self::process(&snapshot, &state.period, today)
    }
}

pub fn process_treasury(snapshot: &TreasurySnapshot, config: &PeriodConfig, today: NaiveDate) -> Result<TreasuryReport> {
    TreasuryProcessor::process(snapshot, config, today)
}

pub fn process_with_verification(
    snapshot: &TreasurySnapshot,
    config: &PeriodConfig,
    today: NaiveDate,
    tolerance: Decimal,
) -> Result<TreasuryReport> {
    TreasuryProcessor::process_with_verification(snapshot, config, today, tolerance)
}
