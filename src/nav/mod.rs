//! Net asset value calculations
//!
//! Every calculation is an immutable, append-only record: the total is the
//! exact decimal sum of its holdings, and history is never merged even when
//! two calculations share a fund and date.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::{self, get_decimal_value, get_enum_value, NavCalculation, NavHolding};
use crate::error::{LedgerError, Result};
use crate::utils;

/// Value of one company taken from the most recent matching calculation
#[derive(Debug, Clone, Serialize)]
pub struct CompanyValuation {
    pub company_id: i64,
    pub nav_id: i64,
    pub fund_id: i64,
    pub date: NaiveDate,
    pub currency: String,
    #[serde(flatten)]
    pub holding: NavHolding,
}

/// Record a NAV calculation for a fund
pub fn calculate_nav(
    conn: &Connection,
    fund_id: i64,
    date: NaiveDate,
    holdings: &[NavHolding],
    currency: &str,
) -> Result<NavCalculation> {
    let currency = utils::normalize_currency(currency)?;
    for holding in holdings {
        if holding.value < Decimal::ZERO {
            return Err(LedgerError::validation(
                "value",
                format!("holding for company {} cannot be negative", holding.company_id),
            ));
        }
    }

    let tx = db::begin_write(conn)?;

    db::get_fund(&tx, fund_id)?;
    for holding in holdings {
        crate::portfolio::get_company(&tx, holding.company_id)?;
    }

    let total_value: Decimal = holdings.iter().map(|h| h.value).sum();

    tx.execute(
        "INSERT INTO nav_calculations (fund_id, nav_date, total_value, currency)
         VALUES (?1, ?2, ?3, ?4)",
        params![fund_id, date, total_value.to_string(), currency],
    )?;
    let nav_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO nav_holdings (nav_id, company_id, value, method, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for holding in holdings {
            stmt.execute(params![
                nav_id,
                holding.company_id,
                holding.value.to_string(),
                holding.method.as_str(),
                holding.notes,
            ])?;
        }
    }

    let calculation = load_calculation(&tx, nav_id)?;
    tx.commit()?;

    info!(
        "Recorded NAV {} for fund {} on {}: {} {} over {} holdings",
        nav_id,
        fund_id,
        date,
        total_value,
        calculation.currency,
        holdings.len()
    );
    Ok(calculation)
}

struct CalculationHeader {
    id: i64,
    fund_id: i64,
    date: NaiveDate,
    total_value: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
}

const NAV_COLUMNS: &str = "id, fund_id, nav_date, total_value, currency, created_at";

fn header_from_row(row: &Row) -> rusqlite::Result<CalculationHeader> {
    Ok(CalculationHeader {
        id: row.get(0)?,
        fund_id: row.get(1)?,
        date: row.get(2)?,
        total_value: get_decimal_value(row, 3)?,
        currency: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn load_holdings(conn: &Connection, nav_id: i64) -> Result<Vec<NavHolding>> {
    let mut stmt = conn.prepare(
        "SELECT company_id, value, method, notes FROM nav_holdings WHERE nav_id = ?1 ORDER BY id",
    )?;
    let holdings = stmt
        .query_map([nav_id], |row| {
            Ok(NavHolding {
                company_id: row.get(0)?,
                value: get_decimal_value(row, 1)?,
                method: get_enum_value(row, 2)?,
                notes: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(holdings)
}

fn attach_holdings(conn: &Connection, header: CalculationHeader) -> Result<NavCalculation> {
    Ok(NavCalculation {
        holdings: load_holdings(conn, header.id)?,
        id: header.id,
        fund_id: header.fund_id,
        date: header.date,
        total_value: header.total_value,
        currency: header.currency,
        created_at: header.created_at,
    })
}

fn load_calculation(conn: &Connection, nav_id: i64) -> Result<NavCalculation> {
    let header = conn.query_row(
        &format!("SELECT {} FROM nav_calculations WHERE id = ?1", NAV_COLUMNS),
        [nav_id],
        header_from_row,
    )?;
    attach_holdings(conn, header)
}

/// All calculations for a fund, newest date first
pub fn list_calculations(conn: &Connection, fund_id: i64) -> Result<Vec<NavCalculation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM nav_calculations WHERE fund_id = ?1 ORDER BY nav_date DESC, id DESC",
        NAV_COLUMNS
    ))?;
    let headers = stmt
        .query_map([fund_id], header_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    headers
        .into_iter()
        .map(|h| attach_holdings(conn, h))
        .collect()
}

pub fn get_latest_nav(conn: &Connection, fund_id: i64) -> Result<Option<NavCalculation>> {
    Ok(list_calculations(conn, fund_id)?.into_iter().next())
}

/// Calculations dated within `[start, end]`, newest first
pub fn get_historical_nav(
    conn: &Connection,
    fund_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NavCalculation>> {
    if start > end {
        return Err(LedgerError::validation(
            "start",
            format!("{} is after the end date {}", start, end),
        ));
    }

    Ok(list_calculations(conn, fund_id)?
        .into_iter()
        .filter(|c| c.date >= start && c.date <= end)
        .collect())
}

/// Most recent recorded value of a company across all funds' calculations,
/// optionally as of a date
pub fn get_company_valuation(
    conn: &Connection,
    company_id: i64,
    as_of: Option<NaiveDate>,
) -> Result<Option<CompanyValuation>> {
    if company_id <= 0 {
        return Err(LedgerError::validation(
            "company_id",
            format!("{} is not a valid company id", company_id),
        ));
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM nav_calculations
         WHERE id IN (SELECT nav_id FROM nav_holdings WHERE company_id = ?1)
         ORDER BY nav_date DESC, id DESC",
        NAV_COLUMNS
    ))?;
    let headers = stmt
        .query_map([company_id], header_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for header in headers {
        if as_of.is_some_and(|cutoff| header.date > cutoff) {
            continue;
        }
        let holding = load_holdings(conn, header.id)?
            .into_iter()
            .find(|h| h.company_id == company_id);
        if let Some(holding) = holding {
            debug!(
                "Company {} valued at {} in NAV {}",
                company_id, holding.value, header.id
            );
            return Ok(Some(CompanyValuation {
                company_id,
                nav_id: header.id,
                fund_id: header.fund_id,
                date: header.date,
                currency: header.currency,
                holding,
            }));
        }
    }

    Ok(None)
}
