use crate::allocation::occurrences_in_period;
use crate::error::{Result, TreasuryError};
use crate::schema::{ActualId, ActualKind, ActualStatus, ActualTransaction, BudgetEntry, Payment};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Amount actually settled for `entry` inside `[period_start, period_end)`:
/// every payment on a transaction linked to the entry, dated in the window.
pub fn actual_amount_for_period(
    entry: &BudgetEntry,
    actuals: &[ActualTransaction],
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Decimal {
    actuals
        .iter()
        .filter(|a| a.budget_id == Some(entry.id))
        .map(|a| paid_in_window(a, period_start, period_end))
        .sum()
}

/// Sum of the payments on one transaction dated inside the window.
pub fn paid_in_window(actual: &ActualTransaction, period_start: NaiveDate, period_end: NaiveDate) -> Decimal {
    actual
        .payments
        .iter()
        .filter(|p| p.payment_date >= period_start && p.payment_date < period_end)
        .map(|p| p.paid_amount)
        .sum()
}

pub fn total_paid(actual: &ActualTransaction) -> Decimal {
    actual.payments.iter().map(|p| p.paid_amount).sum()
}

pub fn remaining(actual: &ActualTransaction) -> Decimal {
    actual.amount - total_paid(actual)
}

pub fn is_unsettled(actual: &ActualTransaction) -> bool {
    actual.status.is_unsettled()
}

/// Status implied by the amount paid so far.
pub fn derive_status(kind: ActualKind, amount: Decimal, paid: Decimal, is_final: bool) -> ActualStatus {
    if is_final || paid >= amount {
        ActualStatus::settled_for(kind)
    } else if paid > Decimal::ZERO {
        ActualStatus::partial_for(kind)
    } else {
        ActualStatus::Pending
    }
}

/// What to do with a payment that exceeds the remaining balance of a
/// transaction when the caller has not flagged it as the final payment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentPolicy {
    /// Record the full amount and report the excess.
    Allow,
    /// Record only what remains; fails when nothing remains.
    Clamp,
    #[default]
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOutcome {
    pub transaction: ActualTransaction,
    /// Amount actually recorded, after any clamping.
    pub recorded: Decimal,
    /// Amount recorded beyond the transaction total (only under `Allow`).
    pub excess: Decimal,
}

/// Records a payment against a transaction and returns the updated copy.
/// The input transaction is left untouched.
pub fn record_payment(
    actual: &ActualTransaction,
    mut payment: Payment,
    is_final: bool,
    policy: OverpaymentPolicy,
) -> Result<PaymentOutcome> {
    if actual.status == ActualStatus::WrittenOff {
        return Err(TreasuryError::TransactionWrittenOff(actual.id.to_string()));
    }
    if payment.paid_amount <= Decimal::ZERO {
        return Err(TreasuryError::NonPositivePayment(payment.paid_amount));
    }

    let outstanding = remaining(actual);
    let mut excess = Decimal::ZERO;

    if payment.paid_amount > outstanding && !is_final {
        match policy {
            OverpaymentPolicy::Allow => {
                excess = payment.paid_amount - outstanding.max(Decimal::ZERO);
            }
            OverpaymentPolicy::Clamp if outstanding > Decimal::ZERO => {
                payment.paid_amount = outstanding;
            }
            OverpaymentPolicy::Clamp | OverpaymentPolicy::Reject => {
                return Err(TreasuryError::Overpayment {
                    actual: actual.id.to_string(),
                    attempted: payment.paid_amount,
                    remaining: outstanding,
                });
            }
        }
    }

    let recorded = payment.paid_amount;
    let mut updated = actual.clone();
    updated.payments.push(payment);
    let paid = total_paid(&updated);
    updated.status = derive_status(updated.kind, updated.amount, paid, is_final);

    debug!(
        "Recorded {} on {} (paid {} of {}, now {:?})",
        recorded, updated.id, paid, updated.amount, updated.status
    );

    Ok(PaymentOutcome {
        transaction: updated,
        recorded,
        excess,
    })
}

/// Marks the remaining balance of a transaction as permanently
/// uncollectible. Settled and already written-off transactions are refused.
pub fn write_off(actual: &ActualTransaction, date: NaiveDate) -> Result<ActualTransaction> {
    match actual.status {
        ActualStatus::WrittenOff => {
            return Err(TreasuryError::TransactionWrittenOff(actual.id.to_string()))
        }
        ActualStatus::Paid | ActualStatus::Received => {
            return Err(TreasuryError::AlreadySettled(actual.id.to_string()))
        }
        _ => {}
    }

    let note = format!("(Write-off) {}", date.format("%Y-%m-%d"));
    let mut updated = actual.clone();
    updated.status = ActualStatus::WrittenOff;
    updated.description = Some(match &actual.description {
        Some(existing) if !existing.is_empty() => format!("{} {}", note, existing),
        _ => note,
    });
    Ok(updated)
}

/// Net signed remaining balance of every unsettled transaction dated
/// strictly before `today`. Receivables add, payables subtract.
pub fn net_unsettled(actuals: &[ActualTransaction], today: NaiveDate) -> Decimal {
    actuals
        .iter()
        .filter(|a| a.date < today && is_unsettled(a))
        .map(|a| a.kind.apply_sign(remaining(a)))
        .sum()
}

/// Net signed sum of every payment dated strictly before `date`.
pub fn net_paid_before(actuals: &[ActualTransaction], date: NaiveDate) -> Decimal {
    actuals
        .iter()
        .map(|a| {
            let paid: Decimal = a
                .payments
                .iter()
                .filter(|p| p.payment_date < date)
                .map(|p| p.paid_amount)
                .sum();
            a.kind.apply_sign(paid)
        })
        .sum()
}

/// One pending transaction per occurrence of `entry` in `[from, until)`,
/// each linked back to the entry.
pub fn derive_actuals(entry: &BudgetEntry, from: NaiveDate, until: NaiveDate) -> Vec<ActualTransaction> {
    occurrences_in_period(entry, from, until)
        .into_iter()
        .map(|(date, amount)| ActualTransaction {
            id: ActualId::new(),
            project_id: entry.project_id,
            budget_id: Some(entry.id),
            kind: entry.flow_type.actual_kind(),
            category: entry.category.clone(),
            category_id: entry.category_id,
            counterparty: entry.counterparty.clone(),
            description: entry.description.clone(),
            date,
            amount,
            status: ActualStatus::Pending,
            off_budget: entry.off_budget,
            payments: Vec::new(),
        })
        .collect()
}
