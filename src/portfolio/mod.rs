// Portfolio module - company roster, investments and their aggregates

pub mod metrics;

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::info;

use crate::db::{
    self, get_decimal_value, get_enum_value, get_optional_decimal_value, CompanyChanges,
    CompanyStatus, Investment, NewCompany, NewInvestment, PortfolioCompany,
};
use crate::error::{LedgerError, Result};
use crate::utils;

pub use metrics::{
    add_metrics_to_update, create_update, get_latest_metrics, get_metric_history, list_updates,
    LatestMetric, MetricPoint, NewUpdate,
};

const COMPANY_COLUMNS: &str =
    "id, name, sector, stage, website, description, status, created_at, updated_at";

fn company_from_row(row: &Row) -> rusqlite::Result<PortfolioCompany> {
    Ok(PortfolioCompany {
        id: row.get(0)?,
        name: row.get(1)?,
        sector: row.get(2)?,
        stage: row.get(3)?,
        website: row.get(4)?,
        description: row.get(5)?,
        status: get_enum_value(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::validation("name", "must not be empty"));
    }
    Ok(())
}

/// Add a company to the roster
pub fn add_company(conn: &Connection, company: &NewCompany) -> Result<PortfolioCompany> {
    validate_name(&company.name)?;

    conn.execute(
        "INSERT INTO portfolio_companies (name, sector, stage, website, description, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            company.name.trim(),
            company.sector,
            company.stage,
            company.website,
            company.description,
            CompanyStatus::Active.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!("Added company {} '{}'", id, company.name.trim());

    get_company(conn, id)
}

pub fn get_company(conn: &Connection, id: i64) -> Result<PortfolioCompany> {
    conn.query_row(
        &format!("SELECT {} FROM portfolio_companies WHERE id = ?1", COMPANY_COLUMNS),
        [id],
        company_from_row,
    )
    .optional()?
    .ok_or_else(|| LedgerError::not_found("company", id))
}

/// Companies ordered by name, optionally only those linked to a fund
pub fn list_companies(conn: &Connection, fund_id: Option<i64>) -> Result<Vec<PortfolioCompany>> {
    let companies = match fund_id {
        Some(fund_id) => {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.name, c.sector, c.stage, c.website, c.description, c.status,
                        c.created_at, c.updated_at
                 FROM portfolio_companies c
                 JOIN fund_companies fc ON fc.company_id = c.id
                 WHERE fc.fund_id = ?1
                 ORDER BY c.name COLLATE NOCASE, c.id",
            )?;
            let rows = stmt
                .query_map([fund_id], company_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM portfolio_companies ORDER BY name COLLATE NOCASE, id",
                COMPANY_COLUMNS
            ))?;
            let rows = stmt
                .query_map([], company_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(companies)
}

pub fn update_company(
    conn: &Connection,
    id: i64,
    changes: &CompanyChanges,
) -> Result<PortfolioCompany> {
    let mut company = get_company(conn, id)?;

    if let Some(name) = &changes.name {
        validate_name(name)?;
        company.name = name.trim().to_string();
    }
    if changes.sector.is_some() {
        company.sector = changes.sector.clone();
    }
    if changes.stage.is_some() {
        company.stage = changes.stage.clone();
    }
    if changes.website.is_some() {
        company.website = changes.website.clone();
    }
    if changes.description.is_some() {
        company.description = changes.description.clone();
    }
    if let Some(status) = changes.status {
        company.status = status;
    }

    conn.execute(
        "UPDATE portfolio_companies
         SET name = ?1, sector = ?2, stage = ?3, website = ?4, description = ?5, status = ?6,
             updated_at = datetime('now')
         WHERE id = ?7",
        params![
            company.name,
            company.sector,
            company.stage,
            company.website,
            company.description,
            company.status.as_str(),
            id,
        ],
    )?;
    info!("Updated company {}", id);

    get_company(conn, id)
}

/// Remove a company that has no investments or NAV holdings
pub fn delete_company(conn: &Connection, id: i64) -> Result<()> {
    get_company(conn, id)?;

    let references: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM investments WHERE company_id = ?1)
              + (SELECT COUNT(*) FROM nav_holdings WHERE company_id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    if references > 0 {
        return Err(LedgerError::validation(
            "company_id",
            format!(
                "company {} is referenced by investments or NAV holdings and cannot be deleted",
                id
            ),
        ));
    }

    conn.execute("DELETE FROM portfolio_companies WHERE id = ?1", [id])?;
    info!("Deleted company {}", id);
    Ok(())
}

/// Associate a company with a fund; linking twice is a no-op
pub fn link_company_to_fund(conn: &Connection, fund_id: i64, company_id: i64) -> Result<()> {
    db::get_fund(conn, fund_id)?;
    get_company(conn, company_id)?;
    conn.execute(
        "INSERT OR IGNORE INTO fund_companies (fund_id, company_id) VALUES (?1, ?2)",
        params![fund_id, company_id],
    )?;
    Ok(())
}

const INVESTMENT_COLUMNS: &str = "id, fund_id, company_id, amount, currency, investment_date, \
     round, valuation, ownership, notes, created_at";

fn investment_from_row(row: &Row) -> rusqlite::Result<Investment> {
    Ok(Investment {
        id: row.get(0)?,
        fund_id: row.get(1)?,
        company_id: row.get(2)?,
        amount: get_decimal_value(row, 3)?,
        currency: row.get(4)?,
        date: row.get(5)?,
        round: row.get(6)?,
        valuation: get_optional_decimal_value(row, 7)?,
        ownership: get_optional_decimal_value(row, 8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Record an investment and link the company to the investing fund
pub fn add_investment(conn: &Connection, investment: &NewInvestment) -> Result<Investment> {
    if investment.amount <= Decimal::ZERO {
        return Err(LedgerError::validation("amount", "must be greater than zero"));
    }
    if let Some(ownership) = investment.ownership {
        if ownership < Decimal::ZERO || ownership > Decimal::ONE_HUNDRED {
            return Err(LedgerError::validation(
                "ownership",
                "must be a percentage between 0 and 100",
            ));
        }
    }
    if investment.valuation.is_some_and(|v| v < Decimal::ZERO) {
        return Err(LedgerError::validation("valuation", "cannot be negative"));
    }
    let currency = utils::normalize_currency(&investment.currency)?;

    let tx = db::begin_write(conn)?;
    get_company(&tx, investment.company_id)?;
    db::get_fund(&tx, investment.fund_id)?;

    tx.execute(
        "INSERT INTO investments (
            fund_id, company_id, amount, currency, investment_date, round, valuation, ownership, notes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            investment.fund_id,
            investment.company_id,
            investment.amount.to_string(),
            currency,
            investment.date,
            investment.round,
            investment.valuation.as_ref().map(|d| d.to_string()),
            investment.ownership.as_ref().map(|d| d.to_string()),
            investment.notes,
        ],
    )?;
    let id = tx.last_insert_rowid();
    link_company_to_fund(&tx, investment.fund_id, investment.company_id)?;

    let stored = tx.query_row(
        &format!("SELECT {} FROM investments WHERE id = ?1", INVESTMENT_COLUMNS),
        [id],
        investment_from_row,
    )?;
    tx.commit()?;

    info!(
        "Recorded investment {} of {} {} from fund {} into company {}",
        id, stored.amount, stored.currency, stored.fund_id, stored.company_id
    );
    Ok(stored)
}

/// Investments, newest first, filtered by company and/or fund
pub fn list_investments(
    conn: &Connection,
    company_id: Option<i64>,
    fund_id: Option<i64>,
) -> Result<Vec<Investment>> {
    let mut sql = format!("SELECT {} FROM investments WHERE 1=1", INVESTMENT_COLUMNS);
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(c) = company_id {
        sql.push_str(" AND company_id = ?");
        params.push(Box::new(c));
    }
    if let Some(f) = fund_id {
        sql.push_str(" AND fund_id = ?");
        params.push(Box::new(f));
    }
    sql.push_str(" ORDER BY investment_date DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let investments = stmt
        .query_map(param_refs.as_slice(), investment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(investments)
}

/// Total invested per currency, for one company or the whole portfolio.
///
/// Amounts in different currencies are never added together.
pub fn get_total_invested(
    conn: &Connection,
    company_id: Option<i64>,
) -> Result<BTreeMap<String, Decimal>> {
    if let Some(id) = company_id {
        get_company(conn, id)?;
    }

    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for investment in list_investments(conn, company_id, None)? {
        *totals.entry(investment.currency).or_insert(Decimal::ZERO) += investment.amount;
    }
    Ok(totals)
}

/// Sum of recorded ownership percentages across a company's investments.
///
/// A display aggregate: rounds are added as-is, without dilution.
pub fn get_ownership(conn: &Connection, company_id: i64) -> Result<Decimal> {
    get_company(conn, company_id)?;
    Ok(list_investments(conn, Some(company_id), None)?
        .iter()
        .filter_map(|i| i.ownership)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FundStatus, NewFund};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        db::init_database(Some(db_path.clone())).unwrap();
        let conn = db::open_db(Some(db_path)).unwrap();
        let fund = db::create_fund(
            &conn,
            &NewFund {
                name: "Fund I".to_string(),
                target_size: dec!(100000000),
                vintage_year: None,
                status: FundStatus::Investing,
                currency: "USD".to_string(),
                owner_id: None,
            },
        )
        .unwrap();
        (temp_dir, conn, fund.id)
    }

    fn investment(fund_id: i64, company_id: i64, amount: Decimal, currency: &str) -> NewInvestment {
        NewInvestment {
            fund_id,
            company_id,
            amount,
            currency: currency.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            round: Some("Seed".to_string()),
            valuation: Some(dec!(10000000)),
            ownership: Some(dec!(5)),
            notes: None,
        }
    }

    #[test]
    fn test_add_investment_requires_company() {
        let (_dir, conn, fund_id) = setup();
        let err = add_investment(&conn, &investment(fund_id, 42, dec!(100), "USD")).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: "company",
                id: 42
            }
        ));
    }

    #[test]
    fn test_investment_links_company_to_fund() {
        let (_dir, conn, fund_id) = setup();
        let company = add_company(
            &conn,
            &NewCompany {
                name: "Beta Labs".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(list_companies(&conn, Some(fund_id)).unwrap().is_empty());

        add_investment(&conn, &investment(fund_id, company.id, dec!(500000), "usd")).unwrap();
        let linked = list_companies(&conn, Some(fund_id)).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "Beta Labs");
    }

    #[test]
    fn test_delete_company_with_investments_refused() {
        let (_dir, conn, fund_id) = setup();
        let company = add_company(
            &conn,
            &NewCompany {
                name: "Gamma".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        add_investment(&conn, &investment(fund_id, company.id, dec!(1), "USD")).unwrap();

        let err = delete_company(&conn, company.id).unwrap_err();
        assert_eq!(err.field(), Some("company_id"));
        assert!(get_company(&conn, company.id).is_ok());
    }

    #[test]
    fn test_update_company_keeps_unchanged_fields() {
        let (_dir, conn, _) = setup();
        let company = add_company(
            &conn,
            &NewCompany {
                name: "Delta".to_string(),
                sector: Some("Fintech".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = update_company(
            &conn,
            company.id,
            &CompanyChanges {
                status: Some(CompanyStatus::Exited),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.status, CompanyStatus::Exited);
        assert_eq!(updated.sector.as_deref(), Some("Fintech"));
    }
}
