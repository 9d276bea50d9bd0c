use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use treasury_engine::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 6, 15)
}

fn project(name: &str) -> Project {
    Project {
        id: ProjectId::new(),
        name: name.to_string(),
        is_archived: false,
    }
}

fn taxonomy() -> CategoryTaxonomy {
    CategoryTaxonomy {
        revenue: vec![MainCategory {
            id: CategoryId::new(),
            name: "Income".to_string(),
            sub_categories: vec![SubCategory {
                id: CategoryId::new(),
                name: "Sales".to_string(),
            }],
        }],
        expense: vec![MainCategory {
            id: CategoryId::new(),
            name: "Operations".to_string(),
            sub_categories: vec![
                SubCategory {
                    id: CategoryId::new(),
                    name: "Rent".to_string(),
                },
                SubCategory {
                    id: CategoryId::new(),
                    name: "Supplies".to_string(),
                },
            ],
        }],
    }
}

fn entry(project_id: ProjectId, flow_type: FlowType, category: &str, amount: Decimal, schedule: Schedule) -> BudgetEntry {
    BudgetEntry {
        id: EntryId::new(),
        project_id,
        flow_type,
        category: category.to_string(),
        category_id: None,
        counterparty: "Counterparty".to_string(),
        amount,
        schedule,
        off_budget: false,
        description: None,
    }
}

fn monthly_from(start: NaiveDate) -> Schedule {
    Schedule::Recurring {
        frequency: RecurrenceFrequency::Monthly,
        start_date: start,
        end_date: None,
    }
}

fn actual(project_id: ProjectId, kind: ActualKind, category: &str, amount: Decimal, on: NaiveDate) -> ActualTransaction {
    ActualTransaction {
        id: ActualId::new(),
        project_id,
        budget_id: None,
        kind,
        category: category.to_string(),
        category_id: None,
        counterparty: "Counterparty".to_string(),
        description: None,
        date: on,
        amount,
        status: ActualStatus::Pending,
        off_budget: false,
        payments: Vec::new(),
    }
}

fn payment(on: NaiveDate, amount: Decimal) -> Payment {
    Payment {
        id: PaymentId::new(),
        payment_date: on,
        paid_amount: amount,
        cash_account: None,
    }
}

fn settled(mut tx: ActualTransaction, on: NaiveDate) -> ActualTransaction {
    tx.payments.push(payment(on, tx.amount));
    tx.status = ActualStatus::settled_for(tx.kind);
    tx
}

fn account(project_id: ProjectId, balance: Decimal) -> CashAccount {
    CashAccount {
        id: AccountId::new(),
        project_id,
        name: "Current account".to_string(),
        initial_balance: balance,
        initial_balance_date: date(2024, 1, 1),
        is_closed: false,
        closure_date: None,
    }
}

fn snapshot_for(project: &Project) -> TreasurySnapshot {
    TreasurySnapshot {
        taxonomy: taxonomy(),
        projects: vec![project.clone()],
        ..Default::default()
    }
}

fn months(horizon: i64, offset: i64) -> PeriodConfig {
    PeriodConfig::new(TimeUnit::Month, horizon, offset)
}

#[test]
fn test_monthly_inflow_across_horizon() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot
        .entries
        .push(entry(p.id, FlowType::Inflow, "Sales", dec!(1000), monthly_from(date(2024, 1, 1))));

    let report = process_with_verification(&snapshot, &months(3, 0), today(), Decimal::ZERO).unwrap();

    let labels: Vec<&str> = report.periods.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["Jun '24", "Jul '24", "Aug '24"]);
    for period in &report.periods {
        assert_eq!(amount_for_period(&snapshot.entries[0], period.start_date, period.end_date), dec!(1000));
    }

    let inflow = report.grouped.flow(FlowType::Inflow);
    assert!(inflow.totals.iter().all(|t| t.budget == dec!(1000)));

    // June is the current period and has no realized receipts yet.
    let closings: Vec<Decimal> = report.positions.iter().map(|p| p.closing).collect();
    assert_eq!(closings, vec![dec!(0), dec!(1000), dec!(2000)]);
}

#[test]
fn test_one_off_lands_in_its_period_only() {
    let p = project("Main");
    let rent = entry(
        p.id,
        FlowType::Outflow,
        "Rent",
        dec!(500),
        Schedule::OneOff { date: date(2024, 7, 10) },
    );

    let periods = generate_periods(&months(3, 0), today()).unwrap();
    let amounts: Vec<Decimal> = periods
        .iter()
        .map(|p| amount_for_period(&rent, p.start_date, p.end_date))
        .collect();
    assert_eq!(amounts, vec![dec!(0), dec!(500), dec!(0)]);
}

#[test]
fn test_final_payment_settles_and_blocks_overpayment() {
    let p = project("Main");
    let tx = actual(p.id, ActualKind::Payable, "Supplies", dec!(300), date(2024, 6, 1));

    let outcome = record_payment(&tx, payment(date(2024, 6, 3), dec!(300)), true, OverpaymentPolicy::Reject).unwrap();
    assert_eq!(outcome.transaction.status, ActualStatus::Paid);
    assert_eq!(tx.status, ActualStatus::Pending);

    let second = record_payment(
        &outcome.transaction,
        payment(date(2024, 6, 4), dec!(10)),
        false,
        OverpaymentPolicy::Reject,
    );
    assert!(matches!(second, Err(TreasuryError::Overpayment { .. })));

    let allowed = record_payment(
        &outcome.transaction,
        payment(date(2024, 6, 4), dec!(10)),
        false,
        OverpaymentPolicy::Allow,
    )
    .unwrap();
    assert_eq!(allowed.excess, dec!(10));
}

#[test]
fn test_starting_balance_includes_earlier_payments() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot.accounts.push(account(p.id, dec!(1000)));
    snapshot.actuals.push(settled(
        actual(p.id, ActualKind::Payable, "Rent", dec!(200), date(2024, 5, 20)),
        date(2024, 5, 20),
    ));

    let report = process_with_verification(&snapshot, &months(3, 0), today(), Decimal::ZERO).unwrap();
    assert_eq!(report.positions[0].opening, dec!(800));
    assert_eq!(report.chart.balances()[0], dec!(800));
}

#[test]
fn test_overdue_receivable_applied_once_at_the_seam() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot.accounts.push(account(p.id, dec!(1000)));
    snapshot
        .actuals
        .push(actual(p.id, ActualKind::Receivable, "Sales", dec!(150), date(2024, 6, 1)));

    let report = process_with_verification(&snapshot, &months(3, 0), today(), Decimal::ZERO).unwrap();
    let positions = &report.positions;

    assert_eq!(report.today_index, Some(0));
    assert_eq!(positions[1].opening, positions[0].closing + dec!(150));
    assert_eq!(positions[1].adjustment, dec!(150));
    assert_eq!(positions[2].opening, positions[1].closing);
    assert_eq!(positions.iter().filter(|p| !p.adjustment.is_zero()).count(), 1);
}

#[test]
fn test_written_off_receivable_is_not_projected() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    let overdue = actual(p.id, ActualKind::Receivable, "Sales", dec!(150), date(2024, 6, 1));
    snapshot.actuals.push(write_off(&overdue, date(2024, 6, 10)).unwrap());

    assert_eq!(net_unsettled(&snapshot.actuals, today()), Decimal::ZERO);
    let report = process_treasury(&snapshot, &months(3, 0), today()).unwrap();
    assert!(report.positions.iter().all(|p| p.adjustment.is_zero()));
    assert_eq!(report.positions[2].closing, Decimal::ZERO);
}

#[test]
fn test_periods_are_contiguous_for_every_unit() {
    for unit in TimeUnit::ALL {
        let config = PeriodConfig::new(unit, 8, -3);
        let periods = generate_periods(&config, today()).unwrap();

        assert_eq!(periods.len(), 8, "{}", unit);
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end_date, pair[1].start_date, "{} gap after {}", unit, pair[0].label);
            assert!(pair[0].start_date < pair[0].end_date);
        }
        assert_eq!(today_index(&periods, today()), Some(3), "{}", unit);
    }
}

#[test]
fn test_allocation_is_additive_over_a_partition() {
    let p = project("Main");
    let schedules = vec![
        Schedule::Recurring {
            frequency: RecurrenceFrequency::Weekly,
            start_date: date(2024, 1, 3),
            end_date: Some(date(2024, 11, 20)),
        },
        Schedule::Recurring {
            frequency: RecurrenceFrequency::Biweekly,
            start_date: date(2023, 12, 29),
            end_date: None,
        },
        monthly_from(date(2024, 1, 31)),
        Schedule::Irregular {
            payments: vec![
                ScheduledPayment { date: date(2024, 2, 29), amount: dec!(40) },
                ScheduledPayment { date: date(2024, 9, 1), amount: dec!(60) },
            ],
        },
    ];

    let config = PeriodConfig::new(TimeUnit::Fortnightly, 24, -11);
    let periods = generate_periods(&config, today()).unwrap();
    let whole_start = periods[0].start_date;
    let whole_end = periods[periods.len() - 1].end_date;

    for schedule in schedules {
        let e = entry(p.id, FlowType::Outflow, "Supplies", dec!(25), schedule);
        let parts: Decimal = periods
            .iter()
            .map(|period| amount_for_period(&e, period.start_date, period.end_date))
            .sum();
        assert_eq!(parts, amount_for_period(&e, whole_start, whole_end), "{:?}", e.schedule);
    }
}

#[test]
fn test_processing_is_idempotent() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot.accounts.push(account(p.id, dec!(250)));
    snapshot
        .entries
        .push(entry(p.id, FlowType::Outflow, "Rent", dec!(90), monthly_from(date(2024, 2, 10))));
    snapshot.actuals.push(settled(
        actual(p.id, ActualKind::Receivable, "Sales", dec!(400), date(2024, 5, 2)),
        date(2024, 5, 4),
    ));

    let first = serde_json::to_value(process_treasury(&snapshot, &months(6, -2), today()).unwrap()).unwrap();
    let second = serde_json::to_value(process_treasury(&snapshot, &months(6, -2), today()).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_payment_on_period_boundary_counts_once() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot.actuals.push(settled(
        actual(p.id, ActualKind::Receivable, "Sales", dec!(75), date(2024, 5, 31)),
        date(2024, 6, 1),
    ));

    let report = process_treasury(&snapshot, &months(2, -1), today()).unwrap();
    let inflow = report.grouped.flow(FlowType::Inflow);
    assert_eq!(inflow.totals[0].actual, Decimal::ZERO);
    assert_eq!(inflow.totals[1].actual, dec!(75));
}

#[test]
fn test_projector_and_chart_agree_with_mixed_activity() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot.accounts.push(account(p.id, dec!(5000)));

    let rent = entry(p.id, FlowType::Outflow, "Rent", dec!(1200), monthly_from(date(2024, 1, 1)));
    let mut paid_rent = settled(
        actual(p.id, ActualKind::Payable, "Rent", dec!(1200), date(2024, 5, 1)),
        date(2024, 5, 2),
    );
    paid_rent.budget_id = Some(rent.id);
    snapshot.entries.push(rent);
    snapshot.entries.push(entry(
        p.id,
        FlowType::Inflow,
        "Sales",
        dec!(3000),
        Schedule::OneOff { date: date(2024, 8, 20) },
    ));
    snapshot.actuals.push(paid_rent);
    snapshot.actuals.push(settled(
        actual(p.id, ActualKind::Receivable, "Sales", dec!(640), date(2024, 6, 3)),
        date(2024, 6, 5),
    ));
    snapshot
        .actuals
        .push(actual(p.id, ActualKind::Payable, "Supplies", dec!(80), date(2024, 6, 2)));

    let report = process_with_verification(&snapshot, &months(5, -2), today(), dec!(0.01)).unwrap();
    assert_eq!(report.today_index, Some(2));
    assert!(report.warnings.is_empty());
    assert_eq!(report.positions[3].adjustment, dec!(-80));
}

#[test]
fn test_whole_horizon_in_the_past_is_realized() {
    let p = project("Main");
    let mut snapshot = snapshot_for(&p);
    snapshot
        .entries
        .push(entry(p.id, FlowType::Inflow, "Sales", dec!(100), monthly_from(date(2024, 1, 1))));

    let report = process_treasury(&snapshot, &months(3, -6), today()).unwrap();
    assert_eq!(report.today_index, Some(2));
    assert!(report.positions.iter().all(|p| p.closing.is_zero()));
    assert!(report.chart.projected_balance[..2].iter().all(Option::is_none));
}

#[test]
fn test_consolidated_scope_unions_projects() {
    let north = project("North");
    let south = project("South");
    let mut archived = project("Legacy");
    archived.is_archived = true;

    let view = ConsolidatedView {
        id: ViewId::new(),
        name: "North only".to_string(),
        description: None,
        project_ids: vec![north.id],
    };
    let mut state = AppState {
        taxonomy: taxonomy(),
        accounts: vec![
            account(north.id, dec!(100)),
            account(south.id, dec!(200)),
            account(archived.id, dec!(1000)),
        ],
        projects: vec![north.clone(), south.clone(), archived],
        period: months(1, 0),
        ..AppState::default()
    };

    let all = TreasuryProcessor::process_state(&state, today()).unwrap();
    assert_eq!(all.positions[0].opening, dec!(300));

    state = reduce(&state, Action::SaveConsolidatedView { view: view.clone() }).unwrap();
    state = reduce(&state, Action::SetActiveScope { scope: Scope::View(view.id) }).unwrap();
    assert!(state.is_consolidated());
    let north_only = TreasuryProcessor::process_state(&state, today()).unwrap();
    assert_eq!(north_only.positions[0].opening, dec!(100));

    state = reduce(&state, Action::SetActiveScope { scope: Scope::Project(south.id) }).unwrap();
    assert!(!state.is_consolidated());
    let south_only = TreasuryProcessor::process_state(&state, today()).unwrap();
    assert_eq!(south_only.positions[0].opening, dec!(200));
}

#[test]
fn test_reducer_cascade_keeps_settled_history() {
    let p = project("Main");
    let state = AppState {
        taxonomy: taxonomy(),
        projects: vec![p.clone()],
        accounts: vec![account(p.id, dec!(1000))],
        period: months(3, 0),
        ..AppState::default()
    };
    let rent = entry(p.id, FlowType::Outflow, "Rent", dec!(300), monthly_from(date(2024, 4, 1)));

    let state = reduce(
        &state,
        Action::SaveEntry {
            entry: rent.clone(),
            derive_until: Some(date(2024, 7, 1)),
        },
    )
    .unwrap();
    assert_eq!(state.actuals.len(), 3);
    assert!(state.actuals.iter().all(|a| a.budget_id == Some(rent.id)));

    let april = state
        .actuals
        .iter()
        .find(|a| a.date == date(2024, 4, 1))
        .map(|a| a.id)
        .unwrap();
    let state = reduce(
        &state,
        Action::RecordPayment {
            actual_id: april,
            payment: payment(date(2024, 4, 2), dec!(300)),
            is_final: false,
        },
    )
    .unwrap();

    // May and June are overdue: -600 lands on the first projected period.
    let report = TreasuryProcessor::process_state(&state, today()).unwrap();
    assert_eq!(report.positions[0].opening, dec!(700));
    assert_eq!(report.positions[1].adjustment, dec!(-600));

    let state = reduce(&state, Action::DeleteEntry { entry_id: rent.id }).unwrap();
    assert!(state.entries.is_empty());
    assert_eq!(state.actuals.len(), 1);
    assert_eq!(state.actuals[0].status, ActualStatus::Paid);
}

#[test]
fn test_store_records_to_report() {
    let json = r#"{
        "projects": [
            { "id": "0b7f3c1e-8a55-4f2a-b8d4-3c9e1f7a6d21", "name": "Main" }
        ],
        "entries": [
            {
                "id": "6f1c4a9e-2b0d-4a36-9d7e-9a1f5c3b2e10",
                "project_id": "0b7f3c1e-8a55-4f2a-b8d4-3c9e1f7a6d21",
                "type": "outflow",
                "category": "Rent",
                "supplier": "Landlord",
                "frequency": "monthly",
                "amount": "450",
                "start_date": "2024-01-01"
            },
            {
                "id": "1d2e3f40-5a6b-4c7d-8e9f-0a1b2c3d4e5f",
                "project_id": "0b7f3c1e-8a55-4f2a-b8d4-3c9e1f7a6d21",
                "type": "inflow",
                "category": "Sales",
                "counterparty": "Client",
                "frequency": "fortnightly",
                "amount": "100",
                "start_date": "2024-01-01"
            }
        ],
        "actuals": [
            {
                "id": "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d",
                "project_id": "0b7f3c1e-8a55-4f2a-b8d4-3c9e1f7a6d21",
                "type": "payable",
                "category": "Rent",
                "counterparty": "Landlord",
                "date": "2024-06-01",
                "amount": "450",
                "status": "paid"
            }
        ],
        "payments": [
            {
                "id": "3c4d5e6f-7a8b-4c9d-8e0f-1a2b3c4d5e6f",
                "actual_id": "9a8b7c6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d",
                "payment_date": "2024-06-03",
                "paid_amount": "450"
            }
        ],
        "accounts": [
            {
                "id": "7e8f9a0b-1c2d-4e3f-8a4b-5c6d7e8f9a0b",
                "project_id": "0b7f3c1e-8a55-4f2a-b8d4-3c9e1f7a6d21",
                "name": "Bank",
                "initial_balance": "2000",
                "initial_balance_date": "2024-01-01"
            }
        ]
    }"#;

    let records = StoreRecords::from_json(json).unwrap();
    let (mut snapshot, warnings) = build_snapshot(records);
    snapshot.taxonomy = taxonomy();

    assert_eq!(snapshot.entries.len(), 1);
    assert!(matches!(warnings.as_slice(), [DataIntegrityWarning::MalformedEntry { .. }]));
    assert_eq!(snapshot.actuals[0].payments.len(), 1);

    let report = process_with_verification(&snapshot, &months(2, 0), today(), Decimal::ZERO).unwrap();
    assert_eq!(report.positions[0].closing, dec!(1550));
    assert_eq!(report.positions[1].closing, dec!(1100));

    let round_trip = TreasurySnapshot::from_json(&serde_json::to_string(&snapshot).unwrap()).unwrap();
    assert_eq!(
        serde_json::to_value(&round_trip).unwrap(),
        serde_json::to_value(&snapshot).unwrap()
    );
}
