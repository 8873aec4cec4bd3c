mod ledger_helpers;

use anyhow::Result;
use fundbook::db::{Metric, NewInvestment};
use fundbook::portfolio::{
    add_investment, add_metrics_to_update, create_update, get_latest_metrics,
    get_metric_history, get_ownership, get_total_invested, list_companies, list_investments,
    list_updates, NewUpdate,
};
use ledger_helpers::{add_company, create_fund, create_test_db, date};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn invest(
    conn: &Connection,
    fund_id: i64,
    company_id: i64,
    amount: Decimal,
    currency: &str,
    ownership: Option<Decimal>,
) -> Result<()> {
    add_investment(
        conn,
        &NewInvestment {
            fund_id,
            company_id,
            amount,
            currency: currency.to_string(),
            date: date(2024, 3, 1),
            round: Some("Seed".to_string()),
            valuation: None,
            ownership,
            notes: None,
        },
    )?;
    Ok(())
}

fn metric(name: &str, value: Decimal) -> Metric {
    Metric {
        name: name.to_string(),
        value,
        unit: None,
    }
}

fn update(company_id: i64, d: chrono::NaiveDate, title: &str, metrics: Vec<Metric>) -> NewUpdate {
    NewUpdate {
        company_id,
        date: d,
        title: title.to_string(),
        notes: None,
        metrics,
    }
}

#[test]
fn test_totals_are_kept_per_currency() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let acme = add_company(&conn, "Acme Robotics")?;
    let beta = add_company(&conn, "Beta Bio")?;

    invest(&conn, fund_id, acme, dec!(500000), "USD", Some(dec!(5)))?;
    invest(&conn, fund_id, acme, dec!(250000), "usd", Some(dec!(2.5)))?;
    invest(&conn, fund_id, beta, dec!(300000), "EUR", None)?;

    let all = get_total_invested(&conn, None)?;
    assert_eq!(all.len(), 2);
    assert_eq!(all["USD"], dec!(750000));
    assert_eq!(all["EUR"], dec!(300000));

    let acme_only = get_total_invested(&conn, Some(acme))?;
    assert_eq!(acme_only.len(), 1);
    assert_eq!(get_ownership(&conn, acme)?, dec!(7.5));
    Ok(())
}

#[test]
fn test_investment_links_company_to_fund() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let other_fund = create_fund(&conn, "Fund II")?;
    let acme = add_company(&conn, "Acme Robotics")?;
    add_company(&conn, "Unfunded Co")?;

    invest(&conn, fund_id, acme, dec!(100), "USD", None)?;
    invest(&conn, fund_id, acme, dec!(100), "USD", None)?;

    let portfolio = list_companies(&conn, Some(fund_id))?;
    assert_eq!(portfolio.len(), 1);
    assert_eq!(portfolio[0].id, acme);
    assert!(list_companies(&conn, Some(other_fund))?.is_empty());
    assert_eq!(list_companies(&conn, None)?.len(), 2);
    assert_eq!(list_investments(&conn, None, Some(fund_id))?.len(), 2);
    Ok(())
}

#[test]
fn test_investment_validation() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let fund_id = create_fund(&conn, "Fund I")?;
    let acme = add_company(&conn, "Acme Robotics")?;

    let err = invest(&conn, fund_id, acme, dec!(100), "USD", Some(dec!(120))).unwrap_err();
    let ledger = err.downcast_ref::<fundbook::error::LedgerError>().expect("ledger error");
    assert_eq!(ledger.field(), Some("ownership"));

    let err = invest(&conn, fund_id, acme, dec!(100), "DOLLARS", None).unwrap_err();
    let ledger = err.downcast_ref::<fundbook::error::LedgerError>().expect("ledger error");
    assert_eq!(ledger.field(), Some("currency"));
    Ok(())
}

#[test]
fn test_updates_newest_first_history_oldest_first() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let acme = add_company(&conn, "Acme Robotics")?;

    create_update(
        &conn,
        &update(acme, date(2024, 4, 1), "Q1", vec![metric("ARR", dec!(1000000))]),
    )?;
    create_update(
        &conn,
        &update(acme, date(2024, 10, 1), "Q3", vec![metric("ARR", dec!(1800000))]),
    )?;
    create_update(
        &conn,
        &update(acme, date(2024, 7, 1), "Q2", vec![metric("ARR", dec!(1400000))]),
    )?;

    let titles: Vec<_> = list_updates(&conn, acme, None, None)?
        .into_iter()
        .map(|u| u.title)
        .collect();
    assert_eq!(titles, vec!["Q3", "Q2", "Q1"]);

    let values: Vec<_> = get_metric_history(&conn, acme, Some("ARR"), None, None)?
        .into_iter()
        .map(|p| p.value)
        .collect();
    assert_eq!(values, vec![dec!(1000000), dec!(1400000), dec!(1800000)]);

    let ranged = list_updates(&conn, acme, Some(date(2024, 5, 1)), Some(date(2024, 8, 1)))?;
    assert_eq!(ranged.len(), 1);
    assert_eq!(ranged[0].title, "Q2");
    Ok(())
}

#[test]
fn test_latest_metrics_take_most_recent_update() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let acme = add_company(&conn, "Acme Robotics")?;

    create_update(
        &conn,
        &update(
            acme,
            date(2024, 4, 1),
            "Q1",
            vec![metric("headcount", dec!(12)), metric("ARR", dec!(1000000))],
        ),
    )?;
    create_update(
        &conn,
        &update(acme, date(2024, 7, 1), "Q2", vec![metric("ARR", dec!(1400000))]),
    )?;

    let latest = get_latest_metrics(&conn, acme)?;
    let names: Vec<_> = latest.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["ARR", "headcount"]);
    assert_eq!(latest[0].value, dec!(1400000));
    assert_eq!(latest[0].date, date(2024, 7, 1));
    assert_eq!(latest[1].value, dec!(12));
    assert_eq!(latest[1].date, date(2024, 4, 1));
    Ok(())
}

#[test]
fn test_add_metrics_rejects_duplicates() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let acme = add_company(&conn, "Acme Robotics")?;
    let created = create_update(
        &conn,
        &update(acme, date(2024, 4, 1), "Q1", vec![metric("ARR", dec!(1000000))]),
    )?;

    let updated = add_metrics_to_update(&conn, created.id, &[metric("burn", dec!(80000))])?;
    assert_eq!(updated.metrics.len(), 2);

    let err = add_metrics_to_update(&conn, created.id, &[metric("ARR", dec!(1))]).unwrap_err();
    assert_eq!(err.field(), Some("metrics"));

    let err = create_update(
        &conn,
        &update(
            acme,
            date(2024, 5, 1),
            "Dup",
            vec![metric("x", dec!(1)), metric("x", dec!(2))],
        ),
    )
    .unwrap_err();
    assert_eq!(err.field(), Some("metrics"));
    assert_eq!(list_updates(&conn, acme, None, None)?.len(), 1);
    Ok(())
}

#[test]
fn test_update_for_unknown_company() -> Result<()> {
    let (_dir, conn) = create_test_db()?;
    let err = create_update(&conn, &update(77, date(2024, 1, 1), "Ghost", vec![])).unwrap_err();
    assert_eq!(err.kind(), "not_found");
    Ok(())
}
