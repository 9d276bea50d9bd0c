use crate::actuals::{derive_actuals, record_payment, write_off, OverpaymentPolicy};
use crate::error::{Result, TreasuryError};
use crate::period::{PeriodConfig, QuickSelect};
use crate::schema::{
    AccountId, ActualId, ActualTransaction, BudgetEntry, CashAccount, CategoryTaxonomy,
    ConsolidatedView, EntryId, Payment, Project, ProjectId, TreasurySnapshot, ViewId,
};
use crate::utils::today_in_timezone;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[schemars(description = "Offset from UTC, in hours, used to decide the local calendar date")]
    #[serde(default)]
    pub timezone_offset_hours: i32,

    #[serde(default)]
    pub overpayment_policy: OverpaymentPolicy,
}

/// Which projects the computations read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Project(ProjectId),
    View(ViewId),
    /// Every non-archived project.
    #[default]
    All,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct AppState {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub views: Vec<ConsolidatedView>,
    #[serde(default)]
    pub taxonomy: CategoryTaxonomy,
    #[serde(default)]
    pub entries: Vec<BudgetEntry>,
    #[serde(default)]
    pub actuals: Vec<ActualTransaction>,
    #[serde(default)]
    pub accounts: Vec<CashAccount>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub period: PeriodConfig,
    #[serde(default)]
    pub quick_select: Option<QuickSelect>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetPeriodOffset { offset: i64 },

    /// Moves the horizon by `direction` units (negative goes back).
    ShiftPeriod { direction: i64 },

    SetPeriodConfig { config: PeriodConfig },

    SetQuickPeriod { select: QuickSelect, today: NaiveDate },

    SetActiveScope { scope: Scope },

    /// Creates or replaces an entry. Unsettled transactions linked to it are
    /// dropped; with `derive_until`, one pending transaction per occurrence
    /// before that date is generated in their place.
    SaveEntry {
        entry: BudgetEntry,
        #[serde(default)]
        derive_until: Option<NaiveDate>,
    },

    /// Removes an entry and its unsettled transactions. Settled ones stay.
    DeleteEntry { entry_id: EntryId },

    SaveActual { actual: ActualTransaction },

    DeleteActual { actual_id: ActualId },

    RecordPayment {
        actual_id: ActualId,
        payment: Payment,
        #[serde(default)]
        is_final: bool,
    },

    WriteOffActual { actual_id: ActualId, date: NaiveDate },

    AddCashAccount { account: CashAccount },

    UpdateCashAccount { account: CashAccount },

    DeleteCashAccount { account_id: AccountId },

    CloseCashAccount { account_id: AccountId, closure_date: NaiveDate },

    ReopenCashAccount { account_id: AccountId },

    SaveConsolidatedView { view: ConsolidatedView },

    DeleteConsolidatedView { view_id: ViewId },

    UpdateSettings { settings: Settings },
}

impl AppState {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_consolidated(&self) -> bool {
        !matches!(self.scope, Scope::Project(_))
    }

    /// Local calendar date for a UTC instant under the stored offset.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        today_in_timezone(now, self.settings.timezone_offset_hours)
    }

    /// Projects the active scope reads from.
    pub fn scope_projects(&self) -> Result<Vec<ProjectId>> {
        match self.scope {
            Scope::Project(id) => {
                self.project(id)?;
                Ok(vec![id])
            }
            Scope::View(id) => Ok(self.view(id)?.project_ids.clone()),
            Scope::All => Ok(self
                .projects
                .iter()
                .filter(|p| !p.is_archived)
                .map(|p| p.id)
                .collect()),
        }
    }

    pub fn project_snapshot(&self, project_id: ProjectId) -> TreasurySnapshot {
        TreasurySnapshot {
            taxonomy: self.taxonomy.clone(),
            projects: self.projects.iter().filter(|p| p.id == project_id).cloned().collect(),
            entries: self.entries.iter().filter(|e| e.project_id == project_id).cloned().collect(),
            actuals: self.actuals.iter().filter(|a| a.project_id == project_id).cloned().collect(),
            accounts: self.accounts.iter().filter(|a| a.project_id == project_id).cloned().collect(),
        }
    }

    /// Flattens the active scope into one snapshot.
    pub fn snapshot(&self) -> Result<TreasurySnapshot> {
        let mut seen = HashSet::new();
        let parts: Vec<TreasurySnapshot> = self
            .scope_projects()?
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|id| self.project_snapshot(id))
            .collect();

        let mut snapshot = TreasurySnapshot::union(&parts);
        snapshot.taxonomy = self.taxonomy.clone();
        Ok(snapshot)
    }

    fn project(&self, id: ProjectId) -> Result<&Project> {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| TreasuryError::ProjectNotFound(id.to_string()))
    }

    fn view(&self, id: ViewId) -> Result<&ConsolidatedView> {
        self.views
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| TreasuryError::ViewNotFound(id.to_string()))
    }

    fn actual_mut(&mut self, id: ActualId) -> Result<&mut ActualTransaction> {
        self.actuals
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| TreasuryError::TransactionNotFound(id.to_string()))
    }

    fn account_mut(&mut self, id: AccountId) -> Result<&mut CashAccount> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| TreasuryError::AccountNotFound(id.to_string()))
    }
}

/// Applies one action and returns the next state. The input state is never
/// modified, so a failed action leaves the caller with the previous state.
pub fn reduce(state: &AppState, action: Action) -> Result<AppState> {
    let mut next = state.clone();

    match action {
        Action::SetPeriodOffset { offset } => {
            next.period.period_offset = offset;
            next.quick_select = None;
        }

        Action::ShiftPeriod { direction } => {
            next.period = next.period.shifted(direction);
            next.quick_select = None;
        }

        Action::SetPeriodConfig { config } => {
            config.validate()?;
            next.period = config;
            next.quick_select = None;
        }

        Action::SetQuickPeriod { select, today } => {
            next.period = select.to_config(today);
            next.quick_select = Some(select);
        }

        Action::SetActiveScope { scope } => {
            match scope {
                Scope::Project(id) => {
                    next.project(id)?;
                }
                Scope::View(id) => {
                    next.view(id)?;
                }
                Scope::All => {}
            }
            next.scope = scope;
        }

        Action::SaveEntry {
            entry,
            derive_until,
        } => {
            next.project(entry.project_id)?;
            let entry_id = entry.id;

            // 1. Unsettled realizations of the old version go away
            next.actuals
                .retain(|a| a.budget_id != Some(entry_id) || !a.status.is_unsettled());

            // 2. Regenerate pending ones, skipping dates already settled
            if let Some(until) = derive_until {
                let settled: HashSet<NaiveDate> = next
                    .actuals
                    .iter()
                    .filter(|a| a.budget_id == Some(entry_id))
                    .map(|a| a.date)
                    .collect();
                let derived: Vec<ActualTransaction> = derive_actuals(&entry, NaiveDate::MIN, until)
                    .into_iter()
                    .filter(|a| !settled.contains(&a.date))
                    .collect();
                debug!("Derived {} pending transactions for entry {}", derived.len(), entry_id);
                next.actuals.extend(derived);
            }

            // 3. Replace or insert the entry itself
            match next.entries.iter_mut().find(|e| e.id == entry_id) {
                Some(existing) => *existing = entry,
                None => next.entries.push(entry),
            }
        }

        Action::DeleteEntry { entry_id } => {
            let before = next.entries.len();
            next.entries.retain(|e| e.id != entry_id);
            if next.entries.len() == before {
                return Err(TreasuryError::EntryNotFound(entry_id.to_string()));
            }
            next.actuals
                .retain(|a| a.budget_id != Some(entry_id) || !a.status.is_unsettled());
        }

        Action::SaveActual { mut actual } => {
            next.project(actual.project_id)?;
            match next.actuals.iter_mut().find(|a| a.id == actual.id) {
                Some(existing) => {
                    // Edits from a form carry no payments; keep the recorded ones
                    if actual.payments.is_empty() {
                        actual.payments = std::mem::take(&mut existing.payments);
                    }
                    *existing = actual;
                }
                None => next.actuals.push(actual),
            }
        }

        Action::DeleteActual { actual_id } => {
            let before = next.actuals.len();
            next.actuals.retain(|a| a.id != actual_id);
            if next.actuals.len() == before {
                return Err(TreasuryError::TransactionNotFound(actual_id.to_string()));
            }
        }

        Action::RecordPayment {
            actual_id,
            payment,
            is_final,
        } => {
            let policy = next.settings.overpayment_policy;
            let actual = next.actual_mut(actual_id)?;
            let outcome = record_payment(actual, payment, is_final, policy)?;
            *actual = outcome.transaction;
        }

        Action::WriteOffActual { actual_id, date } => {
            let actual = next.actual_mut(actual_id)?;
            *actual = write_off(actual, date)?;
        }

        Action::AddCashAccount { account } => {
            next.project(account.project_id)?;
            next.accounts.push(account);
        }

        Action::UpdateCashAccount { account } => {
            let existing = next.account_mut(account.id)?;
            *existing = account;
        }

        Action::DeleteCashAccount { account_id } => {
            next.account_mut(account_id)?;
            next.accounts.retain(|a| a.id != account_id);
        }

        Action::CloseCashAccount {
            account_id,
            closure_date,
        } => {
            let account = next.account_mut(account_id)?;
            account.is_closed = true;
            account.closure_date = Some(closure_date);
        }

        Action::ReopenCashAccount { account_id } => {
            let account = next.account_mut(account_id)?;
            account.is_closed = false;
            account.closure_date = None;
        }

        Action::SaveConsolidatedView { view } => {
            for project_id in &view.project_ids {
                next.project(*project_id)?;
            }
            match next.views.iter_mut().find(|v| v.id == view.id) {
                Some(existing) => *existing = view,
                None => next.views.push(view),
            }
        }

        Action::DeleteConsolidatedView { view_id } => {
            next.view(view_id)?;
            next.views.retain(|v| v.id != view_id);
            if next.scope == Scope::View(view_id) {
                next.scope = Scope::All;
            }
        }

        Action::UpdateSettings { settings } => {
            next.settings = settings;
        }
    }

    Ok(next)
}
