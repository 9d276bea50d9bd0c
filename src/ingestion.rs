use crate::actuals::total_paid;
use crate::error::{DataIntegrityWarning, Result, TreasuryError};
use crate::schema::{
    AccountId, ActualId, ActualStatus, ActualTransaction, BudgetEntry, CashAccount, CategoryId,
    CategoryTaxonomy, EntryId, FlowType, Payment, PaymentId, Project, ProjectId,
    RecurrenceFrequency, Schedule, ScheduledPayment, TreasurySnapshot,
};
use chrono::NaiveDate;
use log::{info, warn};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// A budget entry as the data store keeps it: a free-form frequency name
/// and every date field optional. The store's own codes are accepted as
/// written: `revenu` / `depense` for the type, `ponctuel` / `irregulier`
/// for the non-recurring frequencies.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntryRecord {
    pub id: EntryId,
    pub project_id: ProjectId,
    #[serde(rename = "type")]
    pub flow_type: FlowType,
    pub category: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(alias = "supplier")]
    pub counterparty: String,
    #[schemars(description = "one-off (ponctuel), irregular (irregulier), daily, weekly, biweekly, monthly, bimonthly, quarterly, semiannual or annual")]
    pub frequency: String,
    pub amount: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub payments: Vec<ScheduledPayment>,
    #[serde(default)]
    pub off_budget: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// The shape a frequency name selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyKind {
    OneOff,
    Irregular,
    Recurring(RecurrenceFrequency),
}

impl FromStr for FrequencyKind {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        let kind = match normalized.as_str() {
            "one_off" | "once" | "oneoff" | "ponctuel" => FrequencyKind::OneOff,
            "irregular" | "irregulier" | "irrégulier" => FrequencyKind::Irregular,
            other => FrequencyKind::Recurring(other.parse()?),
        };
        Ok(kind)
    }
}

impl FromStr for RecurrenceFrequency {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(RecurrenceFrequency::Daily),
            "weekly" => Ok(RecurrenceFrequency::Weekly),
            "biweekly" => Ok(RecurrenceFrequency::Biweekly),
            "monthly" => Ok(RecurrenceFrequency::Monthly),
            "bimonthly" => Ok(RecurrenceFrequency::Bimonthly),
            "quarterly" => Ok(RecurrenceFrequency::Quarterly),
            "semiannual" | "semiannually" => Ok(RecurrenceFrequency::Semiannual),
            "annual" | "annually" => Ok(RecurrenceFrequency::Annual),
            _ => Err(TreasuryError::UnknownFrequency(s.to_string())),
        }
    }
}

impl EntryRecord {
    fn invalid(&self, details: &str) -> TreasuryError {
        TreasuryError::InvalidEntry {
            entry: self.id.to_string(),
            details: details.to_string(),
        }
    }

    /// Picks the authoritative schedule fields for the record's frequency.
    pub fn into_entry(self) -> Result<BudgetEntry> {
        if self.amount < Decimal::ZERO {
            return Err(self.invalid("amount must not be negative"));
        }

        let schedule = match self.frequency.parse::<FrequencyKind>()? {
            FrequencyKind::OneOff => Schedule::OneOff {
                date: self.date.ok_or_else(|| self.invalid("one-off entry has no date"))?,
            },
            FrequencyKind::Irregular => {
                if self.payments.iter().any(|p| p.amount < Decimal::ZERO) {
                    return Err(self.invalid("irregular amounts must not be negative"));
                }
                Schedule::Irregular {
                    payments: self.payments.clone(),
                }
            }
            FrequencyKind::Recurring(frequency) => {
                let start_date = self
                    .start_date
                    .ok_or_else(|| self.invalid("recurring entry has no start date"))?;
                if let Some(end) = self.end_date {
                    if end < start_date {
                        return Err(self.invalid("end date precedes start date"));
                    }
                }
                Schedule::Recurring {
                    frequency,
                    start_date,
                    end_date: self.end_date,
                }
            }
        };

        Ok(BudgetEntry {
            id: self.id,
            project_id: self.project_id,
            flow_type: self.flow_type,
            category: self.category,
            category_id: self.category_id,
            counterparty: self.counterparty,
            amount: self.amount,
            schedule,
            off_budget: self.off_budget,
            description: self.description,
        })
    }
}

/// Converts every record it can; the rest become warnings.
pub fn ingest_entries(records: Vec<EntryRecord>) -> (Vec<BudgetEntry>, Vec<DataIntegrityWarning>) {
    let mut entries = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for record in records {
        let id = record.id;
        match record.into_entry() {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                let warning = DataIntegrityWarning::MalformedEntry {
                    entry: id.to_string(),
                    reason: err.to_string(),
                };
                warn!("{}", warning);
                warnings.push(warning);
            }
        }
    }

    (entries, warnings)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub actual_id: ActualId,
    pub payment_date: NaiveDate,
    pub paid_amount: Decimal,
    #[serde(default)]
    pub cash_account: Option<AccountId>,
}

/// Attaches payment records to their parent transactions in date order.
/// Orphans are dropped and reported, as are transactions paid beyond their
/// amount without being written off.
pub fn attach_payments(
    mut actuals: Vec<ActualTransaction>,
    payments: Vec<PaymentRecord>,
) -> (Vec<ActualTransaction>, Vec<DataIntegrityWarning>) {
    let mut warnings = Vec::new();
    let positions: HashMap<ActualId, usize> = actuals.iter().enumerate().map(|(i, a)| (a.id, i)).collect();

    for record in payments {
        match positions.get(&record.actual_id) {
            Some(&pos) => actuals[pos].payments.push(Payment {
                id: record.id,
                payment_date: record.payment_date,
                paid_amount: record.paid_amount,
                cash_account: record.cash_account,
            }),
            None => warnings.push(DataIntegrityWarning::OrphanPayment {
                payment: record.id,
                actual: record.actual_id,
            }),
        }
    }

    for actual in &mut actuals {
        actual.payments.sort_by_key(|p| p.payment_date);
        let paid = total_paid(actual);
        if actual.status != ActualStatus::WrittenOff && paid > actual.amount {
            warnings.push(DataIntegrityWarning::Overpaid {
                actual: actual.id,
                amount: actual.amount,
                paid,
            });
        }
    }

    for warning in &warnings {
        warn!("{}", warning);
    }

    (actuals, warnings)
}

/// Everything the data store returns for one scope, before typing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StoreRecords {
    #[serde(default)]
    pub taxonomy: CategoryTaxonomy,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
    #[serde(default)]
    pub actuals: Vec<ActualTransaction>,
    #[serde(default)]
    pub payments: Vec<PaymentRecord>,
    #[serde(default)]
    pub accounts: Vec<CashAccount>,
}

impl StoreRecords {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub fn build_snapshot(records: StoreRecords) -> (TreasurySnapshot, Vec<DataIntegrityWarning>) {
    let (entries, mut warnings) = ingest_entries(records.entries);
    let (actuals, payment_warnings) = attach_payments(records.actuals, records.payments);
    warnings.extend(payment_warnings);

    info!(
        "Ingested {} entries, {} actuals, {} accounts ({} warnings)",
        entries.len(),
        actuals.len(),
        records.accounts.len(),
        warnings.len()
    );

    let snapshot = TreasurySnapshot {
        taxonomy: records.taxonomy,
        projects: records.projects,
        entries,
        actuals,
        accounts: records.accounts,
    };
    (snapshot, warnings)
}
