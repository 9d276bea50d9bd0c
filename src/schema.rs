use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, &self.0.to_string()[..8])
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix($display_prefix).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(EntryId, "ent-");
define_id!(ActualId, "act-");
define_id!(PaymentId, "pay-");
define_id!(ProjectId, "prj-");
define_id!(CategoryId, "cat-");
define_id!(AccountId, "acc-");
define_id!(ViewId, "view-");

/// Direction of a planned cash movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    #[serde(alias = "revenu")]
    Inflow,
    #[serde(alias = "depense")]
    Outflow,
}

impl FlowType {
    /// The kind of realized transaction that settles an entry of this type.
    pub fn actual_kind(self) -> ActualKind {
        match self {
            FlowType::Inflow => ActualKind::Receivable,
            FlowType::Outflow => ActualKind::Payable,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActualKind {
    Receivable,
    Payable,
}

impl ActualKind {
    pub fn flow_type(self) -> FlowType {
        match self {
            ActualKind::Receivable => FlowType::Inflow,
            ActualKind::Payable => FlowType::Outflow,
        }
    }

    /// Sign applied to amounts of this kind when they move the cash balance.
    pub fn apply_sign(self, amount: Decimal) -> Decimal {
        match self {
            ActualKind::Receivable => amount,
            ActualKind::Payable => -amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActualStatus {
    Pending,
    PartiallyPaid,
    PartiallyReceived,
    Paid,
    Received,
    WrittenOff,
}

impl ActualStatus {
    /// Statuses whose remaining balance still counts as overdue cash.
    pub fn is_unsettled(self) -> bool {
        matches!(
            self,
            ActualStatus::Pending | ActualStatus::PartiallyPaid | ActualStatus::PartiallyReceived
        )
    }

    pub fn settled_for(kind: ActualKind) -> Self {
        match kind {
            ActualKind::Payable => ActualStatus::Paid,
            ActualKind::Receivable => ActualStatus::Received,
        }
    }

    pub fn partial_for(kind: ActualKind) -> Self {
        match kind {
            ActualKind::Payable => ActualStatus::PartiallyPaid,
            ActualKind::Receivable => ActualStatus::PartiallyReceived,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

/// Fixed distance between two consecutive occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceStep {
    Days(i64),
    Months(u32),
}

impl RecurrenceFrequency {
    pub fn step(self) -> RecurrenceStep {
        match self {
            RecurrenceFrequency::Daily => RecurrenceStep::Days(1),
            RecurrenceFrequency::Weekly => RecurrenceStep::Days(7),
            RecurrenceFrequency::Biweekly => RecurrenceStep::Days(14),
            RecurrenceFrequency::Monthly => RecurrenceStep::Months(1),
            RecurrenceFrequency::Bimonthly => RecurrenceStep::Months(2),
            RecurrenceFrequency::Quarterly => RecurrenceStep::Months(3),
            RecurrenceFrequency::Semiannual => RecurrenceStep::Months(6),
            RecurrenceFrequency::Annual => RecurrenceStep::Months(12),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScheduledPayment {
    pub date: NaiveDate,
    pub amount: Decimal,
}

/// When a budget entry moves cash. Exactly one of these shapes is
/// authoritative for an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    #[schemars(description = "A single movement of the entry amount on the anchor date")]
    OneOff { date: NaiveDate },

    #[schemars(description = "An explicit list of dated amounts; the entry amount is ignored")]
    Irregular { payments: Vec<ScheduledPayment> },

    #[schemars(
        description = "The entry amount repeated from start_date at a fixed frequency. end_date is exclusive; no end_date recurs indefinitely."
    )]
    Recurring {
        frequency: RecurrenceFrequency,
        start_date: NaiveDate,
        #[serde(default)]
        end_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetEntry {
    pub id: EntryId,

    pub project_id: ProjectId,

    #[serde(rename = "type")]
    pub flow_type: FlowType,

    #[schemars(description = "Sub-category label, kept for display and as a fallback join key")]
    pub category: String,

    #[serde(default)]
    #[schemars(description = "Stable sub-category identifier; preferred over the label when present")]
    pub category_id: Option<CategoryId>,

    #[schemars(description = "Supplier or client name")]
    pub counterparty: String,

    pub amount: Decimal,

    pub schedule: Schedule,

    #[serde(default)]
    #[schemars(
        description = "Excluded from the main category rollups and reported in a separate off-budget bucket"
    )]
    pub off_budget: bool,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_date: NaiveDate,
    pub paid_amount: Decimal,
    #[serde(default)]
    pub cash_account: Option<AccountId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActualTransaction {
    pub id: ActualId,

    pub project_id: ProjectId,

    #[serde(default)]
    #[schemars(description = "The budget entry this transaction realizes, if any")]
    pub budget_id: Option<EntryId>,

    #[serde(rename = "type")]
    pub kind: ActualKind,

    pub category: String,

    #[serde(default)]
    pub category_id: Option<CategoryId>,

    pub counterparty: String,

    #[serde(default)]
    pub description: Option<String>,

    pub date: NaiveDate,

    pub amount: Decimal,

    pub status: ActualStatus,

    #[serde(default)]
    pub off_budget: bool,

    #[serde(default)]
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashAccount {
    pub id: AccountId,
    pub project_id: ProjectId,
    pub name: String,
    pub initial_balance: Decimal,
    pub initial_balance_date: NaiveDate,
    #[serde(default)]
    pub is_closed: bool,
    #[serde(default)]
    pub closure_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SubCategory {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MainCategory {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub sub_categories: Vec<SubCategory>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTaxonomy {
    #[schemars(description = "Main categories used for inflow entries")]
    #[serde(default)]
    pub revenue: Vec<MainCategory>,

    #[schemars(description = "Main categories used for outflow entries")]
    #[serde(default)]
    pub expense: Vec<MainCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub is_archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedView {
    pub id: ViewId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub project_ids: Vec<ProjectId>,
}

/// A fully materialized set of inputs for one scope (a single project or
/// the union of several). Every computation in the crate reads from one of
/// these and never mutates it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TreasurySnapshot {
    #[serde(default)]
    pub taxonomy: CategoryTaxonomy,

    #[serde(default)]
    pub projects: Vec<Project>,

    #[serde(default)]
    pub entries: Vec<BudgetEntry>,

    #[serde(default)]
    pub actuals: Vec<ActualTransaction>,

    #[serde(default)]
    pub accounts: Vec<CashAccount>,
}

impl TreasurySnapshot {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(TreasurySnapshot)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn from_json(json: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Concatenates the inputs of several snapshots, as a consolidated view
    /// does. The taxonomy of the first snapshot wins.
    pub fn union<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a TreasurySnapshot>,
    {
        let mut merged: Option<TreasurySnapshot> = None;
        for snapshot in snapshots {
            match merged.as_mut() {
                None => merged = Some(snapshot.clone()),
                Some(acc) => {
                    acc.projects.extend(snapshot.projects.iter().cloned());
                    acc.entries.extend(snapshot.entries.iter().cloned());
                    acc.actuals.extend(snapshot.actuals.iter().cloned());
                    acc.accounts.extend(snapshot.accounts.iter().cloned());
                }
            }
        }
        merged.unwrap_or_default()
    }
}
