use crate::actuals::{actual_amount_for_period, paid_in_window};
use crate::allocation::amount_for_period;
use crate::error::DataIntegrityWarning;
use crate::period::Period;
use crate::schema::{
    ActualId, ActualTransaction, BudgetEntry, CategoryId, EntryId, FlowType, Project, TreasurySnapshot,
};
use crate::taxonomy::CategoryIndex;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::ops::AddAssign;

/// Budgeted and realized amounts for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub budget: Decimal,
    pub actual: Decimal,
}

impl PeriodTotals {
    pub fn remaining(&self) -> Decimal {
        self.budget - self.actual
    }

    pub fn is_zero(&self) -> bool {
        self.budget.is_zero() && self.actual.is_zero()
    }
}

impl AddAssign for PeriodTotals {
    fn add_assign(&mut self, other: Self) {
        self.budget += other.budget;
        self.actual += other.actual;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRow {
    pub entry: BudgetEntry,
    pub cells: Vec<PeriodTotals>,
}

/// A realized transaction with no budget entry behind it, attributed to a
/// category by its own category reference. Only `actual` is ever non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualRow {
    pub actual_id: ActualId,
    pub category: String,
    pub counterparty: String,
    pub cells: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub id: CategoryId,
    pub name: String,
    pub entries: Vec<EntryRow>,
    pub unlinked: Vec<ActualRow>,
    pub totals: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffBudgetGroup {
    pub entries: Vec<EntryRow>,
    pub unlinked: Vec<ActualRow>,
    pub totals: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGroup {
    pub flow_type: FlowType,
    pub categories: Vec<CategoryGroup>,
    /// Present only when some off-budget row of this flow is visible.
    pub off_budget: Option<OffBudgetGroup>,
    /// Category totals plus the off-budget bucket, per period.
    pub totals: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedBudget {
    pub inflow: FlowGroup,
    pub outflow: FlowGroup,
    /// Inflow totals minus outflow totals, per period.
    pub net: Vec<PeriodTotals>,
}

impl GroupedBudget {
    pub fn flow(&self, flow_type: FlowType) -> &FlowGroup {
        match flow_type {
            FlowType::Inflow => &self.inflow,
            FlowType::Outflow => &self.outflow,
        }
    }

    pub fn net_actual_flows(&self) -> Vec<Decimal> {
        self.net.iter().map(|t| t.actual).collect()
    }

    pub fn net_budget_flows(&self) -> Vec<Decimal> {
        self.net.iter().map(|t| t.budget).collect()
    }
}

pub struct BudgetGrouper<'a> {
    snapshot: &'a TreasurySnapshot,
    periods: &'a [Period],
    entry_ids: HashSet<EntryId>,
}

impl<'a> BudgetGrouper<'a> {
    pub fn new(snapshot: &'a TreasurySnapshot, periods: &'a [Period]) -> Self {
        let entry_ids = snapshot.entries.iter().map(|e| e.id).collect();
        Self {
            snapshot,
            periods,
            entry_ids,
        }
    }

    pub fn entry_cells(&self, entry: &BudgetEntry) -> Vec<PeriodTotals> {
        self.periods
            .iter()
            .map(|p| PeriodTotals {
                budget: amount_for_period(entry, p.start_date, p.end_date),
                actual: actual_amount_for_period(entry, &self.snapshot.actuals, p.start_date, p.end_date),
            })
            .collect()
    }

    fn actual_cells(&self, actual: &ActualTransaction) -> Vec<PeriodTotals> {
        self.periods
            .iter()
            .map(|p| PeriodTotals {
                budget: Decimal::ZERO,
                actual: paid_in_window(actual, p.start_date, p.end_date),
            })
            .collect()
    }

    /// An entry is visible when any period of the horizon holds a non-zero
    /// budget or actual amount for it.
    pub fn is_visible(&self, entry: &BudgetEntry) -> bool {
        self.entry_cells(entry).iter().any(|c| !c.is_zero())
    }

    /// Actuals with no link, or with a link to an entry outside the input.
    fn unlinked_actuals(&self, warnings: &mut Vec<DataIntegrityWarning>) -> Vec<&'a ActualTransaction> {
        let mut unlinked = Vec::new();
        for actual in &self.snapshot.actuals {
            match actual.budget_id {
                None => unlinked.push(actual),
                Some(budget) if !self.entry_ids.contains(&budget) => {
                    warnings.push(DataIntegrityWarning::DanglingBudgetLink {
                        actual: actual.id,
                        budget,
                    });
                    unlinked.push(actual);
                }
                Some(_) => {}
            }
        }
        unlinked
    }

    pub fn group(&self) -> (GroupedBudget, Vec<DataIntegrityWarning>) {
        let mut warnings = Vec::new();
        let unlinked = self.unlinked_actuals(&mut warnings);

        let inflow = self.group_flow(FlowType::Inflow, &unlinked, &mut warnings);
        let outflow = self.group_flow(FlowType::Outflow, &unlinked, &mut warnings);

        let net = inflow
            .totals
            .iter()
            .zip(&outflow.totals)
            .map(|(i, o)| PeriodTotals {
                budget: i.budget - o.budget,
                actual: i.actual - o.actual,
            })
            .collect();

        for warning in &warnings {
            warn!("{}", warning);
        }
        debug!(
            "Grouped {} inflow and {} outflow categories over {} periods",
            inflow.categories.len(),
            outflow.categories.len(),
            self.periods.len()
        );

        (GroupedBudget { inflow, outflow, net }, warnings)
    }

    fn group_flow(
        &self,
        flow_type: FlowType,
        unlinked: &[&ActualTransaction],
        warnings: &mut Vec<DataIntegrityWarning>,
    ) -> FlowGroup {
        let index = CategoryIndex::new(&self.snapshot.taxonomy, flow_type);
        let mut entries_by_main: HashMap<usize, Vec<EntryRow>> = HashMap::new();
        let mut actuals_by_main: HashMap<usize, Vec<ActualRow>> = HashMap::new();
        let mut off_budget = OffBudgetGroup::default();

        for entry in self.snapshot.entries.iter().filter(|e| e.flow_type == flow_type) {
            let cells = self.entry_cells(entry);
            if cells.iter().all(PeriodTotals::is_zero) {
                continue;
            }
            let row = EntryRow {
                entry: entry.clone(),
                cells,
            };
            if entry.off_budget {
                off_budget.entries.push(row);
                continue;
            }
            match index.position(entry.category_id, &entry.category) {
                Some(pos) => entries_by_main.entry(pos).or_default().push(row),
                None => warnings.push(DataIntegrityWarning::UncategorizedEntry {
                    entry: entry.id,
                    category: entry.category.clone(),
                }),
            }
        }

        for actual in unlinked.iter().filter(|a| a.kind.flow_type() == flow_type) {
            let cells = self.actual_cells(actual);
            if cells.iter().all(PeriodTotals::is_zero) {
                continue;
            }
            let row = ActualRow {
                actual_id: actual.id,
                category: actual.category.clone(),
                counterparty: actual.counterparty.clone(),
                cells,
            };
            if actual.off_budget {
                off_budget.unlinked.push(row);
                continue;
            }
            match index.position(actual.category_id, &actual.category) {
                Some(pos) => actuals_by_main.entry(pos).or_default().push(row),
                None => warnings.push(DataIntegrityWarning::UncategorizedActual {
                    actual: actual.id,
                    category: actual.category.clone(),
                }),
            }
        }

        let mut totals = vec![PeriodTotals::default(); self.periods.len()];
        let mut categories = Vec::new();

        for (pos, main) in index.mains().iter().enumerate() {
            let entries = entries_by_main.remove(&pos).unwrap_or_default();
            let unlinked = actuals_by_main.remove(&pos).unwrap_or_default();
            if entries.is_empty() && unlinked.is_empty() {
                continue;
            }
            let group_totals = sum_rows(self.periods.len(), &entries, &unlinked);
            accumulate(&mut totals, &group_totals);
            categories.push(CategoryGroup {
                id: main.id,
                name: main.name.clone(),
                entries,
                unlinked,
                totals: group_totals,
            });
        }

        let off_budget = if off_budget.entries.is_empty() && off_budget.unlinked.is_empty() {
            None
        } else {
            off_budget.totals = sum_rows(self.periods.len(), &off_budget.entries, &off_budget.unlinked);
            accumulate(&mut totals, &off_budget.totals);
            Some(off_budget)
        };

        FlowGroup {
            flow_type,
            categories,
            off_budget,
            totals,
        }
    }
}

fn sum_rows(len: usize, entries: &[EntryRow], unlinked: &[ActualRow]) -> Vec<PeriodTotals> {
    let mut totals = vec![PeriodTotals::default(); len];
    for cells in entries.iter().map(|r| &r.cells).chain(unlinked.iter().map(|r| &r.cells)) {
        accumulate(&mut totals, cells);
    }
    totals
}

fn accumulate(totals: &mut [PeriodTotals], cells: &[PeriodTotals]) {
    for (total, cell) in totals.iter_mut().zip(cells) {
        *total += *cell;
    }
}

pub fn group_budget(
    snapshot: &TreasurySnapshot,
    periods: &[Period],
) -> (GroupedBudget, Vec<DataIntegrityWarning>) {
    BudgetGrouper::new(snapshot, periods).group()
}

/// Search terms applied to the entry list before grouping. Empty terms
/// match everything; matching is a case-insensitive substring test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    #[serde(default)]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
}

pub fn filter_entries(entries: &[BudgetEntry], projects: &[Project], filter: &EntryFilter) -> Vec<BudgetEntry> {
    let needle = |term: &Option<String>| {
        term.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    };
    let counterparty = needle(&filter.counterparty);
    let project_name = needle(&filter.project_name);

    entries
        .iter()
        .filter(|entry| {
            counterparty
                .as_ref()
                .map_or(true, |term| entry.counterparty.to_lowercase().contains(term))
        })
        .filter(|entry| {
            project_name.as_ref().map_or(true, |term| {
                projects
                    .iter()
                    .find(|p| p.id == entry.project_id)
                    .is_some_and(|p| p.name.to_lowercase().contains(term))
            })
        })
        .cloned()
        .collect()
}
