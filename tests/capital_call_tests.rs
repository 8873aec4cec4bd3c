//! Capital-call accounting against a real SQLite database
//!
//! Covers percentage derivation, response snapshots, payment status
//! transitions, idempotence and LP statements.

mod ledger_helpers;

use anyhow::Result;
use fundbook::capital_calls::{
    create_capital_call, fund_capital_summary, generate_lp_statement, get_capital_call,
    list_call_responses, record_payment_as_of, recompute_call_status_as_of,
    sweep_call_statuses, NewCapitalCall, Payment,
};
use fundbook::db::{self, CallStatus, LimitedPartnerChanges, ResponseStatus};
use fundbook::error::LedgerError;
use ledger_helpers::{add_lp, create_fund, create_test_db, date};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn new_call(fund_id: i64, amount: Decimal, percentage: Option<Decimal>) -> NewCapitalCall {
    NewCapitalCall {
        fund_id,
        amount,
        call_date: date(2024, 1, 15),
        due_date: date(2024, 2, 15),
        percentage,
        description: Some("Initial drawdown".to_string()),
    }
}

fn pay(
    conn: &Connection,
    call_id: i64,
    lp_id: i64,
    amount: Decimal,
) -> fundbook::error::Result<db::CapitalCallResponse> {
    record_payment_as_of(
        conn,
        &Payment {
            capital_call_id: call_id,
            lp_id,
            amount_paid: amount,
            date_paid: date(2024, 2, 1),
            notes: None,
        },
        date(2024, 2, 1),
    )
}

/// Fund with two LPs committing $10M and $1M, and a 10% call of $1.1M
fn ten_percent_call() -> Result<(tempfile::TempDir, Connection, i64, i64, i64)> {
    let (dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let lp1 = add_lp(&conn, fund_id, "Pension Plan", dec!(10000000))?;
    let lp2 = add_lp(&conn, fund_id, "Family Office", dec!(1000000))?;
    let call = create_capital_call(&conn, &new_call(fund_id, dec!(1100000), Some(dec!(10))))?;
    Ok((dir, conn, call.id, lp1.id, lp2.id))
}

#[test]
fn test_percentage_derived_from_commitments() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    add_lp(&conn, fund_id, "A", dec!(3000000))?;
    add_lp(&conn, fund_id, "B", dec!(5000000))?;
    add_lp(&conn, fund_id, "C", dec!(2000000))?;

    let call = create_capital_call(&conn, &new_call(fund_id, dec!(2500000), None))?;

    assert_eq!(call.percentage, dec!(25));
    assert_eq!(call.status, CallStatus::Pending);
    let responses = list_call_responses(&conn, call.id)?;
    assert_eq!(responses.len(), 3);
    assert!(responses
        .iter()
        .all(|r| r.amount_paid == Decimal::ZERO && r.status == ResponseStatus::Pending));
    Ok(())
}

#[test]
fn test_non_terminating_percentage_within_tolerance() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    add_lp(&conn, fund_id, "A", dec!(3000000))?;

    let call = create_capital_call(&conn, &new_call(fund_id, dec!(1000000), None))?;

    let implied = dec!(3000000) * call.percentage / dec!(100);
    assert!((implied - dec!(1000000)).abs() < dec!(0.01));
    Ok(())
}

#[test]
fn test_exact_payment_on_derived_percentage_is_paid() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let lp = add_lp(&conn, fund_id, "A", dec!(3000000))?;

    // 2M / 3M leaves a non-terminating percentage
    let call = create_capital_call(&conn, &new_call(fund_id, dec!(2000000), None))?;
    let response = pay(&conn, call.id, lp.id, dec!(2000000))?;
    assert_eq!(response.status, ResponseStatus::Paid);

    let detail = get_capital_call(&conn, call.id, date(2024, 2, 1))?;
    assert_eq!(detail.call.status, CallStatus::FullyPaid);
    assert_eq!(detail.responses[0].expected_amount, dec!(2000000));

    let statement = generate_lp_statement(&conn, lp.id, fund_id)?;
    assert_eq!(statement.total_called, dec!(2000000));
    assert_eq!(statement.outstanding_balance, Decimal::ZERO);
    assert_eq!(statement.remaining_commitment, dec!(1000000));
    Ok(())
}

#[test]
fn test_rounded_shares_settle_the_call() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let lps = [
        add_lp(&conn, fund_id, "A", dec!(1000000))?,
        add_lp(&conn, fund_id, "B", dec!(1000000))?,
        add_lp(&conn, fund_id, "C", dec!(1000000))?,
    ];

    let call = create_capital_call(&conn, &new_call(fund_id, dec!(1000000), None))?;
    for lp in &lps {
        let response = pay(&conn, call.id, lp.id, dec!(333333.33))?;
        assert_eq!(response.status, ResponseStatus::Paid);
    }

    // Shares sum to 999,999.99 but every LP paid what it owed
    let status = recompute_call_status_as_of(&conn, call.id, date(2024, 3, 1))?;
    assert_eq!(status, CallStatus::FullyPaid);
    Ok(())
}

#[test]
fn test_call_larger_than_commitments_rejected() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    add_lp(&conn, fund_id, "A", dec!(1000000))?;

    let err = create_capital_call(&conn, &new_call(fund_id, dec!(1500000), None)).unwrap_err();
    assert_eq!(err.kind(), "validation");
    assert_eq!(err.field(), Some("amount"));

    // Calling the whole commitment is allowed
    let call = create_capital_call(&conn, &new_call(fund_id, dec!(1000000), None))?;
    assert_eq!(call.percentage, dec!(100));
    Ok(())
}

#[test]
fn test_no_commitments_without_percentage() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Empty Fund")?;

    let err = create_capital_call(&conn, &new_call(fund_id, dec!(1000), None)).unwrap_err();
    assert!(matches!(err, LedgerError::NoCommitments { .. }));

    // An explicit percentage still works, with no responses to create
    let call = create_capital_call(&conn, &new_call(fund_id, dec!(1000), Some(dec!(5))))?;
    assert!(list_call_responses(&conn, call.id)?.is_empty());
    Ok(())
}

#[test]
fn test_amount_and_percentage_must_agree() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    add_lp(&conn, fund_id, "A", dec!(10000000))?;

    let err = create_capital_call(&conn, &new_call(fund_id, dec!(2000000), Some(dec!(10))))
        .unwrap_err();
    assert_eq!(err.kind(), "arithmetic_ambiguity");

    // Nothing was written
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM capital_calls", [], |r| r.get(0))?;
    assert_eq!(count, 0);
    Ok(())
}

#[test]
fn test_unknown_fund_and_bad_amount() -> Result<()> {
    let (_dir, conn) = create_test_db()?;

    let err = create_capital_call(&conn, &new_call(999, dec!(1000), Some(dec!(1)))).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "fund", id: 999 }));

    let fund_id = create_fund(&conn, "Fund I")?;
    let err = create_capital_call(&conn, &new_call(fund_id, dec!(0), Some(dec!(1)))).unwrap_err();
    assert_eq!(err.field(), Some("amount"));
    Ok(())
}

#[test]
fn test_full_payment_scenario() -> Result<()> {
    let (_dir, conn, call_id, lp1, lp2) = ten_percent_call()?;

    let detail = get_capital_call(&conn, call_id, date(2024, 1, 20))?;
    let expected: Vec<Decimal> = detail.responses.iter().map(|r| r.expected_amount).collect();
    assert_eq!(expected, vec![dec!(1000000), dec!(100000)]);

    let r1 = pay(&conn, call_id, lp1, dec!(1000000))?;
    assert_eq!(r1.status, ResponseStatus::Paid);
    let r2 = pay(&conn, call_id, lp2, dec!(100000))?;
    assert_eq!(r2.status, ResponseStatus::Paid);

    let call = fundbook::capital_calls::get_call_record(&conn, call_id)?;
    assert_eq!(call.status, CallStatus::FullyPaid);
    Ok(())
}

#[test]
fn test_partial_payment_scenario() -> Result<()> {
    let (_dir, conn, call_id, lp1, _lp2) = ten_percent_call()?;

    let response = pay(&conn, call_id, lp1, dec!(500000))?;
    assert_eq!(response.status, ResponseStatus::PartiallyPaid);

    let call = fundbook::capital_calls::get_call_record(&conn, call_id)?;
    assert_eq!(call.status, CallStatus::PartiallyPaid);
    Ok(())
}

#[test]
fn test_payment_is_idempotent() -> Result<()> {
    let (_dir, conn, call_id, lp1, _lp2) = ten_percent_call()?;

    let first = pay(&conn, call_id, lp1, dec!(500000))?;
    let second = pay(&conn, call_id, lp1, dec!(500000))?;
    assert_eq!(first.amount_paid, second.amount_paid);
    assert_eq!(first.status, second.status);

    let today = date(2024, 2, 1);
    let s1 = recompute_call_status_as_of(&conn, call_id, today)?;
    let s2 = recompute_call_status_as_of(&conn, call_id, today)?;
    assert_eq!(s1, s2);
    assert_eq!(s1, CallStatus::PartiallyPaid);
    Ok(())
}

#[test]
fn test_overdue_and_pending_statuses() -> Result<()> {
    let (_dir, conn, call_id, _lp1, _lp2) = ten_percent_call()?;

    assert_eq!(
        recompute_call_status_as_of(&conn, call_id, date(2024, 2, 15))?,
        CallStatus::Pending
    );
    assert_eq!(
        recompute_call_status_as_of(&conn, call_id, date(2024, 2, 16))?,
        CallStatus::Overdue
    );
    Ok(())
}

#[test]
fn test_reads_derive_overdue_and_sweep_persists_it() -> Result<()> {
    let (_dir, conn, call_id, _lp1, _lp2) = ten_percent_call()?;
    let later = date(2024, 3, 1);

    let detail = get_capital_call(&conn, call_id, later)?;
    assert_eq!(detail.call.status, CallStatus::Overdue);
    let stored = fundbook::capital_calls::get_call_record(&conn, call_id)?;
    assert_eq!(stored.status, CallStatus::Pending);

    let changed = sweep_call_statuses(&conn, None, later)?;
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].status, CallStatus::Overdue);

    assert!(sweep_call_statuses(&conn, None, later)?.is_empty());
    Ok(())
}

#[test]
fn test_lp_added_after_call_has_no_response() -> Result<()> {
    let (_dir, conn, call_id, _lp1, _lp2) = ten_percent_call()?;
    let fund_id = fundbook::capital_calls::get_call_record(&conn, call_id)?.fund_id;
    let late = add_lp(&conn, fund_id, "Late Joiner", dec!(500000))?;

    let err = pay(&conn, call_id, late.id, dec!(50000)).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::ResponseNotFound { capital_call_id, lp_id }
            if capital_call_id == call_id && lp_id == late.id
    ));
    Ok(())
}

#[test]
fn test_payment_validation() -> Result<()> {
    let (_dir, conn, call_id, lp1, _lp2) = ten_percent_call()?;

    let err = pay(&conn, call_id, lp1, dec!(0)).unwrap_err();
    assert_eq!(err.field(), Some("amount_paid"));

    let err = pay(&conn, 4242, lp1, dec!(10)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "capital call", .. }));

    let err = pay(&conn, call_id, 4242, dec!(10)).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "limited partner", .. }));
    Ok(())
}

#[test]
fn test_commitment_frozen_after_call() -> Result<()> {
    let (_dir, conn, _call_id, lp1, _lp2) = ten_percent_call()?;

    let err = db::update_limited_partner(
        &conn,
        lp1,
        &LimitedPartnerChanges {
            commitment: Some(dec!(20000000)),
            ..Default::default()
        },
    )
    .unwrap_err();
    assert_eq!(err.field(), Some("commitment"));

    let renamed = db::update_limited_partner(
        &conn,
        lp1,
        &LimitedPartnerChanges {
            name: Some("State Pension Plan".to_string()),
            ..Default::default()
        },
    )?;
    assert_eq!(renamed.name, "State Pension Plan");
    assert_eq!(renamed.commitment, dec!(10000000));
    Ok(())
}

#[test]
fn test_lp_statement() -> Result<()> {
    let (_dir, conn, call_id, lp1, lp2) = ten_percent_call()?;
    pay(&conn, call_id, lp1, dec!(600000))?;
    let fund_id = fundbook::capital_calls::get_call_record(&conn, call_id)?.fund_id;

    let statement = generate_lp_statement(&conn, lp1, fund_id)?;
    assert_eq!(statement.commitment, dec!(10000000));
    assert_eq!(statement.total_called, dec!(1000000));
    assert_eq!(statement.total_paid, dec!(600000));
    assert_eq!(statement.outstanding_balance, dec!(400000));
    assert_eq!(statement.remaining_commitment, dec!(9000000));
    assert_eq!(statement.call_history.len(), 1);
    assert_eq!(statement.call_history[0].status, ResponseStatus::PartiallyPaid);

    let untouched = generate_lp_statement(&conn, lp2, fund_id)?;
    assert_eq!(untouched.total_called, dec!(100000));
    assert_eq!(untouched.total_paid, Decimal::ZERO);
    Ok(())
}

#[test]
fn test_lp_statement_requires_membership() -> Result<()> {
    let (_dir, conn, _call_id, lp1, _lp2) = ten_percent_call()?;
    let other_fund = create_fund(&conn, "Fund II")?;

    let err = generate_lp_statement(&conn, lp1, other_fund).unwrap_err();
    assert_eq!(err.kind(), "not_found");
    Ok(())
}

#[test]
fn test_statement_history_oldest_first() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let lp = add_lp(&conn, fund_id, "A", dec!(1000000))?;

    let mut later = new_call(fund_id, dec!(200000), Some(dec!(20)));
    later.call_date = date(2024, 6, 1);
    later.due_date = date(2024, 7, 1);
    create_capital_call(&conn, &later)?;
    create_capital_call(&conn, &new_call(fund_id, dec!(100000), Some(dec!(10))))?;

    let statement = generate_lp_statement(&conn, lp.id, fund_id)?;
    let dates: Vec<_> = statement.call_history.iter().map(|l| l.call_date).collect();
    assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 6, 1)]);
    assert_eq!(statement.total_called, dec!(300000));
    Ok(())
}

#[test]
fn test_fund_capital_summary() -> Result<()> {
    let (_dir, conn, call_id, lp1, lp2) = ten_percent_call()?;
    pay(&conn, call_id, lp1, dec!(1000000))?;
    pay(&conn, call_id, lp2, dec!(100000))?;
    let fund_id = fundbook::capital_calls::get_call_record(&conn, call_id)?.fund_id;

    let summary = fund_capital_summary(&conn, fund_id)?;
    assert_eq!(summary.lp_count, 2);
    assert_eq!(summary.total_commitments, dec!(11000000));
    assert_eq!(summary.total_called, dec!(1100000));
    assert_eq!(summary.total_paid, dec!(1100000));
    assert_eq!(summary.outstanding, Decimal::ZERO);
    assert_eq!(summary.uncalled_commitment, dec!(9900000));
    assert_eq!(summary.open_calls, 0);
    assert!(summary.latest_nav.is_none());
    Ok(())
}
