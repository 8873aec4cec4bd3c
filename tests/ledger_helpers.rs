#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use fundbook::db::{
    self, FundStatus, LimitedPartner, LpType, NewCompany, NewFund, NewLimitedPartner,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Create a temporary database with the schema applied
pub fn create_test_db() -> Result<(TempDir, Connection)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    db::init_database(Some(db_path.clone()))?;
    let conn = db::open_db(Some(db_path))?;
    Ok((temp_dir, conn))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn create_fund(conn: &Connection, name: &str) -> Result<i64> {
    let fund = db::create_fund(
        conn,
        &NewFund {
            name: name.to_string(),
            target_size: Decimal::from(100_000_000),
            vintage_year: Some(2024),
            status: FundStatus::Investing,
            currency: "USD".to_string(),
            owner_id: None,
        },
    )?;
    Ok(fund.id)
}

pub fn add_lp(
    conn: &Connection,
    fund_id: i64,
    name: &str,
    commitment: Decimal,
) -> Result<LimitedPartner> {
    Ok(db::add_limited_partner(
        conn,
        &NewLimitedPartner {
            fund_id,
            name: name.to_string(),
            email: None,
            phone: None,
            lp_type: LpType::Institution,
            commitment,
        },
    )?)
}

pub fn add_company(conn: &Connection, name: &str) -> Result<i64> {
    let company = fundbook::portfolio::add_company(
        conn,
        &NewCompany {
            name: name.to_string(),
            ..Default::default()
        },
    )?;
    Ok(company.id)
}
