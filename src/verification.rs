use crate::error::{Result, TreasuryError};
use crate::projection::{CashflowChart, PeriodPosition};
use rust_decimal::Decimal;

/// Checks that every period opens where the previous one closed, allowing
/// only for the unsettled adjustment recorded on the first projected period.
pub fn verify_positions(positions: &[PeriodPosition]) -> Result<()> {
    for (index, pair) in positions.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.opening != previous.closing + current.adjustment {
            return Err(TreasuryError::BalanceDiscontinuity {
                index: index + 1,
                opening: current.opening,
                previous_closing: previous.closing,
            });
        }
    }

    // The adjustment is applied once; a second one is a gap.
    let second_adjustment = positions
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.adjustment.is_zero())
        .map(|(i, _)| i)
        .nth(1);
    if let Some(index) = second_adjustment {
        return Err(TreasuryError::BalanceDiscontinuity {
            index,
            opening: positions[index].opening,
            previous_closing: positions[index - 1].closing,
        });
    }

    Ok(())
}

/// Checks that the grouped projector and the flat chart land on the same
/// balance for every period.
pub fn verify_chart_agreement(positions: &[PeriodPosition], chart: &CashflowChart, tolerance: Decimal) -> Result<()> {
    let balances = chart.balances();

    for (index, position) in positions.iter().enumerate() {
        let chart_balance = balances.get(index).copied().unwrap_or_default();
        let difference = (position.closing - chart_balance).abs();

        if difference > tolerance {
            return Err(TreasuryError::ProjectionMismatch {
                index,
                grouped: position.closing,
                chart: chart_balance,
                difference,
            });
        }
    }

    if balances.len() > positions.len() {
        let index = positions.len();
        return Err(TreasuryError::ProjectionMismatch {
            index,
            grouped: Decimal::ZERO,
            chart: balances[index],
            difference: balances[index].abs(),
        });
    }

    Ok(())
}
