mod ledger_helpers;

use anyhow::Result;
use fundbook::db::{NavHolding, ValuationMethod};
use fundbook::nav::{
    calculate_nav, get_company_valuation, get_historical_nav, get_latest_nav, list_calculations,
};
use ledger_helpers::{add_company, create_fund, create_test_db, date};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn holding(company_id: i64, value: Decimal, method: ValuationMethod) -> NavHolding {
    NavHolding {
        company_id,
        value,
        method,
        notes: None,
    }
}

#[test]
fn test_nav_total_is_sum_of_holdings() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let a = add_company(&conn, "Acme Robotics")?;
    let b = add_company(&conn, "Beta Bio")?;

    let empty = calculate_nav(&conn, fund_id, date(2024, 1, 15), &[], "USD")?;
    assert_eq!(empty.total_value, Decimal::ZERO);

    let nav = calculate_nav(
        &conn,
        fund_id,
        date(2024, 1, 15),
        &[
            holding(a, dec!(1000000), ValuationMethod::LastRound),
            holding(b, dec!(2000000), ValuationMethod::Dcf),
        ],
        "USD",
    )?;
    assert_eq!(nav.total_value, dec!(3000000));
    assert_eq!(nav.holdings.len(), 2);
    assert_eq!(nav.holdings[1].method, ValuationMethod::Dcf);
    Ok(())
}

#[test]
fn test_latest_nav_ignores_insertion_order() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let first = create_fund(&conn, "Fund I")?;
    let second = create_fund(&conn, "Fund II")?;

    calculate_nav(&conn, first, date(2024, 1, 15), &[], "USD")?;
    calculate_nav(&conn, first, date(2024, 1, 20), &[], "USD")?;

    calculate_nav(&conn, second, date(2024, 1, 20), &[], "USD")?;
    calculate_nav(&conn, second, date(2024, 1, 15), &[], "USD")?;

    for fund_id in [first, second] {
        let latest = get_latest_nav(&conn, fund_id)?.expect("latest NAV");
        assert_eq!(latest.date, date(2024, 1, 20));
    }
    Ok(())
}

#[test]
fn test_latest_nav_empty_fund() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    assert!(get_latest_nav(&conn, fund_id)?.is_none());
    Ok(())
}

#[test]
fn test_historical_nav_is_inclusive_range() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    for day in [15, 20, 25] {
        calculate_nav(&conn, fund_id, date(2024, 1, day), &[], "USD")?;
    }

    let history = get_historical_nav(&conn, fund_id, date(2024, 1, 16), date(2024, 1, 22))?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, date(2024, 1, 20));

    let bounds = get_historical_nav(&conn, fund_id, date(2024, 1, 15), date(2024, 1, 25))?;
    assert_eq!(bounds.len(), 3);

    let err = get_historical_nav(&conn, fund_id, date(2024, 1, 22), date(2024, 1, 16)).unwrap_err();
    assert_eq!(err.field(), Some("start"));
    Ok(())
}

#[test]
fn test_same_date_calculations_are_kept() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let company = add_company(&conn, "Acme Robotics")?;

    calculate_nav(
        &conn,
        fund_id,
        date(2024, 3, 31),
        &[holding(company, dec!(100), ValuationMethod::Cost)],
        "USD",
    )?;
    let restated = calculate_nav(
        &conn,
        fund_id,
        date(2024, 3, 31),
        &[holding(company, dec!(150), ValuationMethod::Market)],
        "USD",
    )?;

    assert_eq!(list_calculations(&conn, fund_id)?.len(), 2);
    let latest = get_latest_nav(&conn, fund_id)?.expect("latest NAV");
    assert_eq!(latest.id, restated.id);
    Ok(())
}

#[test]
fn test_company_valuation_as_of() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let company = add_company(&conn, "Acme Robotics")?;
    let other = add_company(&conn, "Beta Bio")?;

    calculate_nav(
        &conn,
        fund_id,
        date(2024, 1, 31),
        &[holding(company, dec!(1000000), ValuationMethod::Cost)],
        "USD",
    )?;
    calculate_nav(
        &conn,
        fund_id,
        date(2024, 6, 30),
        &[
            holding(other, dec!(50), ValuationMethod::Cost),
            holding(company, dec!(1500000), ValuationMethod::LastRound),
        ],
        "USD",
    )?;

    let current = get_company_valuation(&conn, company, None)?.expect("valuation");
    assert_eq!(current.holding.value, dec!(1500000));
    assert_eq!(current.date, date(2024, 6, 30));

    let earlier = get_company_valuation(&conn, company, Some(date(2024, 3, 1)))?.expect("valuation");
    assert_eq!(earlier.holding.value, dec!(1000000));

    assert!(get_company_valuation(&conn, company, Some(date(2023, 12, 31)))?.is_none());
    Ok(())
}
