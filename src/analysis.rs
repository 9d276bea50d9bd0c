//! Budget-versus-actual breakdowns over a single analysis window.

use crate::actuals::paid_in_window;
use crate::allocation::amount_for_period;
use crate::error::Result;
use crate::period::{generate_periods, Period, PeriodConfig};
use crate::schema::{ActualTransaction, BudgetEntry, CategoryId, FlowType, SubCategory, TreasurySnapshot};
use crate::taxonomy::{references, CategoryIndex};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TOP_COUNTERPARTIES: usize = 10;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AnalysisWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The single period the configuration's unit and offset select.
    pub fn from_config(config: &PeriodConfig, today: NaiveDate) -> Result<Self> {
        let single = PeriodConfig {
            horizon_length: 1,
            ..*config
        };
        let periods = generate_periods(&single, today)?;
        Ok(periods
            .first()
            .map(Self::from)
            .unwrap_or(Self::new(today, today)))
    }
}

impl From<&Period> for AnalysisWindow {
    fn from(period: &Period) -> Self {
        Self::new(period.start_date, period.end_date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Budget,
    Actual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub name: String,
    pub budget: Decimal,
    pub actual: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub rows: Vec<AnalysisRow>,
    pub total_budget: Decimal,
    pub total_actual: Decimal,
}

impl Breakdown {
    fn from_rows(rows: Vec<AnalysisRow>) -> Self {
        let total_budget = rows.iter().map(|r| r.budget).sum();
        let total_actual = rows.iter().map(|r| r.actual).sum();
        Self {
            rows,
            total_budget,
            total_actual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueRow {
    pub name: String,
    pub value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drilldown {
    pub rows: Vec<ValueRow>,
    pub total: Decimal,
}

impl Drilldown {
    fn from_values(values: impl IntoIterator<Item = (String, Decimal)>) -> Self {
        let mut rows: Vec<ValueRow> = values
            .into_iter()
            .filter(|(_, value)| *value > Decimal::ZERO)
            .map(|(name, value)| ValueRow { name, value })
            .collect();
        rows.sort_by(|a, b| b.value.cmp(&a.value));
        let total = rows.iter().map(|r| r.value).sum();
        Self { rows, total }
    }
}

pub struct Analyzer<'a> {
    snapshot: &'a TreasurySnapshot,
    window: AnalysisWindow,
    flow_type: FlowType,
}

impl<'a> Analyzer<'a> {
    pub fn new(snapshot: &'a TreasurySnapshot, window: AnalysisWindow, flow_type: FlowType) -> Self {
        Self {
            snapshot,
            window,
            flow_type,
        }
    }

    fn entries(&self) -> impl Iterator<Item = &'a BudgetEntry> + '_ {
        self.snapshot
            .entries
            .iter()
            .filter(move |e| e.flow_type == self.flow_type)
    }

    /// Transactions of the analysed direction with a payment in the window.
    fn actuals(&self) -> impl Iterator<Item = &'a ActualTransaction> + '_ {
        self.snapshot
            .actuals
            .iter()
            .filter(move |a| a.kind.flow_type() == self.flow_type && !self.paid(a).is_zero())
    }

    fn budget(&self, entry: &BudgetEntry) -> Decimal {
        amount_for_period(entry, self.window.start, self.window.end)
    }

    fn paid(&self, actual: &ActualTransaction) -> Decimal {
        paid_in_window(actual, self.window.start, self.window.end)
    }

    /// Main categories with budget or actual in the window, largest actual first.
    pub fn by_category(&self) -> Breakdown {
        let index = CategoryIndex::new(&self.snapshot.taxonomy, self.flow_type);
        let mut budget = vec![Decimal::ZERO; index.mains().len()];
        let mut actual = vec![Decimal::ZERO; index.mains().len()];

        for entry in self.entries() {
            if let Some(pos) = index.position(entry.category_id, &entry.category) {
                budget[pos] += self.budget(entry);
            }
        }
        for tx in self.actuals() {
            if let Some(pos) = index.position(tx.category_id, &tx.category) {
                actual[pos] += self.paid(tx);
            }
        }

        let mut rows: Vec<AnalysisRow> = index
            .mains()
            .iter()
            .enumerate()
            .map(|(pos, main)| AnalysisRow {
                name: main.name.clone(),
                budget: budget[pos],
                actual: actual[pos],
            })
            .filter(|row| row.budget > Decimal::ZERO || row.actual > Decimal::ZERO)
            .collect();
        rows.sort_by(|a, b| b.actual.cmp(&a.actual));
        Breakdown::from_rows(rows)
    }

    /// Sub-categories of one main category.
    pub fn sub_categories(&self, main_id: CategoryId, measure: Measure) -> Drilldown {
        let Some(main) = self
            .snapshot
            .taxonomy
            .for_flow(self.flow_type)
            .iter()
            .find(|m| m.id == main_id)
        else {
            return Drilldown::default();
        };

        Drilldown::from_values(
            main.sub_categories
                .iter()
                .map(|sub| (sub.name.clone(), self.sub_category_value(sub, measure))),
        )
    }

    fn sub_category_value(&self, sub: &SubCategory, measure: Measure) -> Decimal {
        match measure {
            Measure::Budget => self
                .entries()
                .filter(|e| references(sub, e.category_id, &e.category))
                .map(|e| self.budget(e))
                .sum(),
            Measure::Actual => self
                .actuals()
                .filter(|a| references(sub, a.category_id, &a.category))
                .map(|a| self.paid(a))
                .sum(),
        }
    }

    /// Counterparties within one sub-category.
    pub fn counterparties(&self, sub: &SubCategory, measure: Measure) -> Drilldown {
        let mut values: BTreeMap<String, Decimal> = BTreeMap::new();
        match measure {
            Measure::Budget => {
                for entry in self.entries().filter(|e| references(sub, e.category_id, &e.category)) {
                    *values.entry(entry.counterparty.clone()).or_default() += self.budget(entry);
                }
            }
            Measure::Actual => {
                for tx in self.actuals().filter(|a| references(sub, a.category_id, &a.category)) {
                    *values.entry(tx.counterparty.clone()).or_default() += self.paid(tx);
                }
            }
        }
        Drilldown::from_values(values)
    }

    /// The ten counterparties with the largest actual amount.
    pub fn by_counterparty(&self) -> Breakdown {
        let mut totals: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        for entry in self.entries() {
            let amount = self.budget(entry);
            if amount > Decimal::ZERO {
                totals.entry(entry.counterparty.clone()).or_default().0 += amount;
            }
        }
        for tx in self.actuals() {
            totals.entry(tx.counterparty.clone()).or_default().1 += self.paid(tx);
        }

        let mut rows: Vec<AnalysisRow> = totals
            .into_iter()
            .map(|(name, (budget, actual))| AnalysisRow {
                name,
                budget,
                actual,
            })
            .collect();
        rows.sort_by(|a, b| b.actual.cmp(&a.actual));
        rows.truncate(TOP_COUNTERPARTIES);
        Breakdown::from_rows(rows)
    }

    /// One row per non-archived project, for consolidated scopes.
    pub fn by_project(&self) -> Breakdown {
        let mut rows: Vec<AnalysisRow> = self
            .snapshot
            .projects
            .iter()
            .filter(|p| !p.is_archived)
            .map(|project| AnalysisRow {
                name: project.name.clone(),
                budget: self
                    .entries()
                    .filter(|e| e.project_id == project.id)
                    .map(|e| self.budget(e))
                    .sum(),
                actual: self
                    .actuals()
                    .filter(|a| a.project_id == project.id)
                    .map(|a| self.paid(a))
                    .sum(),
            })
            .filter(|row| row.budget > Decimal::ZERO || row.actual > Decimal::ZERO)
            .collect();
        rows.sort_by(|a, b| b.actual.cmp(&a.actual));
        Breakdown::from_rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::TimeUnit;
    use crate::schema::{
        ActualId, ActualKind, ActualStatus, CategoryTaxonomy, EntryId, MainCategory, Payment,
        PaymentId, Project, ProjectId, Schedule,
    };
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(name: &str) -> SubCategory {
        SubCategory {
            id: CategoryId::new(),
            name: name.to_string(),
        }
    }

    fn taxonomy() -> CategoryTaxonomy {
        CategoryTaxonomy {
            revenue: Vec::new(),
            expense: vec![
                MainCategory {
                    id: CategoryId::new(),
                    name: "Premises".to_string(),
                    sub_categories: vec![sub("Rent"), sub("Utilities")],
                },
                MainCategory {
                    id: CategoryId::new(),
                    name: "Staff".to_string(),
                    sub_categories: vec![sub("Salaries")],
                },
                MainCategory {
                    id: CategoryId::new(),
                    name: "Travel".to_string(),
                    sub_categories: vec![sub("Flights")],
                },
            ],
        }
    }

    fn one_off(project_id: ProjectId, category: &str, counterparty: &str, amount: Decimal) -> BudgetEntry {
        BudgetEntry {
            id: EntryId::new(),
            project_id,
            flow_type: FlowType::Outflow,
            category: category.to_string(),
            category_id: None,
            counterparty: counterparty.to_string(),
            amount,
            schedule: Schedule::OneOff { date: date(2024, 6, 10) },
            off_budget: false,
            description: None,
        }
    }

    fn paid(project_id: ProjectId, category: &str, counterparty: &str, amount: Decimal, on: NaiveDate) -> ActualTransaction {
        ActualTransaction {
            id: ActualId::new(),
            project_id,
            budget_id: None,
            kind: ActualKind::Payable,
            category: category.to_string(),
            category_id: None,
            counterparty: counterparty.to_string(),
            description: None,
            date: on,
            amount,
            status: ActualStatus::Paid,
            off_budget: false,
            payments: vec![Payment {
                id: PaymentId::new(),
                payment_date: on,
                paid_amount: amount,
                cash_account: None,
            }],
        }
    }

    fn snapshot() -> TreasurySnapshot {
        let hq = Project {
            id: ProjectId::new(),
            name: "HQ".to_string(),
            is_archived: false,
        };
        let shop = Project {
            id: ProjectId::new(),
            name: "Shop".to_string(),
            is_archived: false,
        };
        let old = Project {
            id: ProjectId::new(),
            name: "Old".to_string(),
            is_archived: true,
        };
        TreasurySnapshot {
            taxonomy: taxonomy(),
            entries: vec![
                one_off(hq.id, "Rent", "Landlord", dec!(1000)),
                one_off(hq.id, "Utilities", "Power Co", dec!(200)),
                one_off(shop.id, "Salaries", "Payroll", dec!(3000)),
            ],
            actuals: vec![
                paid(hq.id, "Rent", "Landlord", dec!(1000), date(2024, 6, 3)),
                paid(shop.id, "Salaries", "Payroll", dec!(2500), date(2024, 6, 28)),
                paid(shop.id, "Utilities", "Water Co", dec!(80), date(2024, 6, 12)),
                paid(old.id, "Rent", "Landlord", dec!(50), date(2024, 6, 5)),
                paid(hq.id, "Salaries", "Payroll", dec!(999), date(2024, 7, 1)),
            ],
            projects: vec![hq, shop, old],
            accounts: Vec::new(),
        }
    }

    fn june() -> AnalysisWindow {
        AnalysisWindow::new(date(2024, 6, 1), date(2024, 7, 1))
    }

    #[test]
    fn test_window_from_config() {
        let config = PeriodConfig::new(TimeUnit::Quarterly, 4, -1);
        let window = AnalysisWindow::from_config(&config, date(2024, 6, 15)).unwrap();
        assert_eq!(window, AnalysisWindow::new(date(2024, 1, 1), date(2024, 4, 1)));
    }

    #[test]
    fn test_by_category_sorted_by_actual() {
        let snapshot = snapshot();
        let breakdown = Analyzer::new(&snapshot, june(), FlowType::Outflow).by_category();

        let names: Vec<&str> = breakdown.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Staff", "Premises"]);
        assert_eq!(breakdown.rows[1].budget, dec!(1200));
        assert_eq!(breakdown.rows[1].actual, dec!(1130));
        assert_eq!(breakdown.total_budget, dec!(4200));
        assert_eq!(breakdown.total_actual, dec!(3630));
    }

    #[test]
    fn test_sub_category_drilldown() {
        let snapshot = snapshot();
        let premises = snapshot.taxonomy.expense[0].id;
        let analyzer = Analyzer::new(&snapshot, june(), FlowType::Outflow);

        let actual = analyzer.sub_categories(premises, Measure::Actual);
        assert_eq!(actual.rows[0], ValueRow { name: "Rent".to_string(), value: dec!(1050) });
        assert_eq!(actual.total, dec!(1130));

        let budget = analyzer.sub_categories(premises, Measure::Budget);
        assert_eq!(budget.total, dec!(1200));
        assert!(analyzer.sub_categories(CategoryId::new(), Measure::Budget).rows.is_empty());
    }

    #[test]
    fn test_counterparty_drilldown() {
        let snapshot = snapshot();
        let utilities = snapshot.taxonomy.expense[0].sub_categories[1].clone();
        let analyzer = Analyzer::new(&snapshot, june(), FlowType::Outflow);

        let actual = analyzer.counterparties(&utilities, Measure::Actual);
        assert_eq!(actual.rows, vec![ValueRow { name: "Water Co".to_string(), value: dec!(80) }]);
        let budget = analyzer.counterparties(&utilities, Measure::Budget);
        assert_eq!(budget.rows, vec![ValueRow { name: "Power Co".to_string(), value: dec!(200) }]);
    }

    #[test]
    fn test_by_counterparty_keeps_top_ten() {
        let mut snapshot = snapshot();
        let project = snapshot.projects[0].id;
        for i in 0..12 {
            snapshot.actuals.push(paid(
                project,
                "Flights",
                &format!("Airline {:02}", i),
                Decimal::from(100 + i),
                date(2024, 6, 20),
            ));
        }

        let breakdown = Analyzer::new(&snapshot, june(), FlowType::Outflow).by_counterparty();
        assert_eq!(breakdown.rows.len(), 10);
        assert_eq!(breakdown.rows[0].name, "Payroll");
        assert_eq!(breakdown.rows[0].budget, dec!(3000));
        assert!(breakdown.rows.iter().all(|r| r.name != "Airline 00"));
    }

    #[test]
    fn test_by_project_skips_archived() {
        let snapshot = snapshot();
        let breakdown = Analyzer::new(&snapshot, june(), FlowType::Outflow).by_project();

        let names: Vec<&str> = breakdown.rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Shop", "HQ"]);
        assert_eq!(breakdown.rows[0].actual, dec!(2580));
        assert_eq!(breakdown.rows[1].budget, dec!(1200));
        assert!(Analyzer::new(&snapshot, june(), FlowType::Inflow).by_project().rows.is_empty());
    }
}
