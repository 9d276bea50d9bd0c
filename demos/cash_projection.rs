use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use treasury_engine::*;

fn date(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).with_context(|| format!("invalid date {}-{}-{}", y, m, d))
}

fn sub(name: &str) -> SubCategory {
    SubCategory {
        id: CategoryId::new(),
        name: name.to_string(),
    }
}

fn main() -> Result<()> {
    let today = date(2024, 6, 15)?;

    println!("💰 Treasury Projection Demonstration");
    println!("═══════════════════════════════════════════════════════════════\n");

    // 1. Seed a project with a taxonomy and a bank account
    let project = Project {
        id: ProjectId::new(),
        name: "Coffee Roastery".to_string(),
        is_archived: false,
    };
    let taxonomy = CategoryTaxonomy {
        revenue: vec![MainCategory {
            id: CategoryId::new(),
            name: "Sales".to_string(),
            sub_categories: vec![sub("Wholesale"), sub("Retail")],
        }],
        expense: vec![
            MainCategory {
                id: CategoryId::new(),
                name: "Premises".to_string(),
                sub_categories: vec![sub("Rent"), sub("Utilities")],
            },
            MainCategory {
                id: CategoryId::new(),
                name: "Cost of Goods".to_string(),
                sub_categories: vec![sub("Green Beans")],
            },
        ],
    };

    let mut state = AppState {
        projects: vec![project.clone()],
        taxonomy,
        period: PeriodConfig::new(TimeUnit::Month, 6, -2),
        ..AppState::default()
    };

    state = reduce(
        &state,
        Action::AddCashAccount {
            account: CashAccount {
                id: AccountId::new(),
                project_id: project.id,
                name: "Operating Account".to_string(),
                initial_balance: dec!(25000),
                initial_balance_date: date(2024, 1, 1)?,
                is_closed: false,
                closure_date: None,
            },
        },
    )?;

    // 2. Budget entries, with pending transactions derived up to today
    let entries = vec![
        BudgetEntry {
            id: EntryId::new(),
            project_id: project.id,
            flow_type: FlowType::Outflow,
            category: "Rent".to_string(),
            category_id: None,
            counterparty: "Harbour Properties".to_string(),
            amount: dec!(3200),
            schedule: Schedule::Recurring {
                frequency: RecurrenceFrequency::Monthly,
                start_date: date(2024, 1, 1)?,
                end_date: None,
            },
            off_budget: false,
            description: None,
        },
        BudgetEntry {
            id: EntryId::new(),
            project_id: project.id,
            flow_type: FlowType::Inflow,
            category: "Wholesale".to_string(),
            category_id: None,
            counterparty: "Café Group".to_string(),
            amount: dec!(4800),
            schedule: Schedule::Recurring {
                frequency: RecurrenceFrequency::Biweekly,
                start_date: date(2024, 1, 5)?,
                end_date: None,
            },
            off_budget: false,
            description: None,
        },
        BudgetEntry {
            id: EntryId::new(),
            project_id: project.id,
            flow_type: FlowType::Outflow,
            category: "Green Beans".to_string(),
            category_id: None,
            counterparty: "Importers Ltd".to_string(),
            amount: dec!(0),
            schedule: Schedule::Irregular {
                payments: vec![
                    ScheduledPayment {
                        date: date(2024, 5, 20)?,
                        amount: dec!(9000),
                    },
                    ScheduledPayment {
                        date: date(2024, 8, 20)?,
                        amount: dec!(11000),
                    },
                ],
            },
            off_budget: false,
            description: None,
        },
    ];

    for entry in entries {
        state = reduce(
            &state,
            Action::SaveEntry {
                entry,
                derive_until: Some(today),
            },
        )?;
    }
    println!(
        "📋 {} entries, {} derived transactions\n",
        state.entries.len(),
        state.actuals.len()
    );

    // 3. Settle everything dated before June, leave June open
    let june = date(2024, 6, 1)?;
    let due: Vec<(ActualId, NaiveDate, rust_decimal::Decimal)> = state
        .actuals
        .iter()
        .filter(|a| a.date < june)
        .map(|a| (a.id, a.date, a.amount))
        .collect();
    for (actual_id, on, amount) in due {
        state = reduce(
            &state,
            Action::RecordPayment {
                actual_id,
                payment: Payment {
                    id: PaymentId::new(),
                    payment_date: on,
                    paid_amount: amount,
                    cash_account: None,
                },
                is_final: true,
            },
        )?;
    }

    // 4. Project the cash position
    let snapshot = state.snapshot()?;
    let report = process_with_verification(&snapshot, &state.period, today, dec!(0.01))?;

    println!("═══════════════════════════════════════════════════════════════");
    println!("📈 Cash Position ({})", state.period.offset_label());
    println!("═══════════════════════════════════════════════════════════════\n");
    println!("{:<10} {:>12} {:>12} {:>12}", "Period", "Opening", "Net", "Closing");
    for (i, (period, position)) in report.periods.iter().zip(&report.positions).enumerate() {
        let marker = if Some(i) == report.today_index { "◀ today" } else { "" };
        println!(
            "{:<10} {:>12} {:>12} {:>12} {}",
            period.label,
            position.opening.round_dp(2),
            (position.closing - position.opening).round_dp(2),
            position.closing.round_dp(2),
            marker
        );
    }
    println!();

    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }

    // 5. Budget versus actual for the current month
    let window = AnalysisWindow::from_config(&PeriodConfig::new(TimeUnit::Month, 1, 0), today)?;
    let breakdown = Analyzer::new(&snapshot, window, FlowType::Outflow).by_category();

    println!("═══════════════════════════════════════════════════════════════");
    println!("🔍 Outflows by category, {} to {}", window.start, window.end);
    println!("═══════════════════════════════════════════════════════════════\n");
    for row in &breakdown.rows {
        println!("   • {:<16} budget {:>10} actual {:>10}", row.name, row.budget, row.actual);
    }
    println!(
        "   = {:<16} budget {:>10} actual {:>10}\n",
        "Total", breakdown.total_budget, breakdown.total_actual
    );

    println!("🗂️  Taxonomy\n{}", state.taxonomy.to_csv());

    Ok(())
}
